//! Top-level math and randomness builtins.

use rand::Rng as _;

use crate::{
    error::{NovaError, RunResult},
    interp::Interpreter,
    types::CallArgs,
    value::Value,
};

fn arg(args: &CallArgs, index: usize, name: &str) -> RunResult<Value> {
    args.positional
        .get(index)
        .cloned()
        .ok_or_else(|| NovaError::type_error(format!("{name}: missing argument {index}")))
}

fn num(args: &CallArgs, index: usize, name: &str) -> RunResult<f64> {
    arg(args, index, name)?.as_double()
}

pub(super) fn install(interp: &mut Interpreter) {
    interp.register_native("abs", Some(1), |_, args| {
        match arg(&args, 0, "abs")? {
            Value::Int(v) => Ok(Value::Int(v.wrapping_abs())),
            Value::Long(v) => Ok(Value::Long(v.wrapping_abs())),
            Value::Float(v) => Ok(Value::Float(v.abs())),
            other => Ok(Value::Double(other.as_double()?.abs())),
        }
    });
    interp.register_native("max", Some(2), |_, args| {
        let a = arg(&args, 0, "max")?;
        let b = arg(&args, 1, "max")?;
        if a.is_integral() && b.is_integral() {
            Ok(Value::from_i64(a.as_long()?.max(b.as_long()?)))
        } else {
            Ok(Value::Double(a.as_double()?.max(b.as_double()?)))
        }
    });
    interp.register_native("min", Some(2), |_, args| {
        let a = arg(&args, 0, "min")?;
        let b = arg(&args, 1, "min")?;
        if a.is_integral() && b.is_integral() {
            Ok(Value::from_i64(a.as_long()?.min(b.as_long()?)))
        } else {
            Ok(Value::Double(a.as_double()?.min(b.as_double()?)))
        }
    });
    interp.register_native("sqrt", Some(1), |_, args| Ok(Value::Double(num(&args, 0, "sqrt")?.sqrt())));
    interp.register_native("pow", Some(2), |_, args| {
        Ok(Value::Double(num(&args, 0, "pow")?.powf(num(&args, 1, "pow")?)))
    });
    interp.register_native("floor", Some(1), |_, args| Ok(Value::Double(num(&args, 0, "floor")?.floor())));
    interp.register_native("ceil", Some(1), |_, args| Ok(Value::Double(num(&args, 0, "ceil")?.ceil())));
    interp.register_native("round", Some(1), |_, args| Ok(Value::Double(num(&args, 0, "round")?.round())));
    interp.register_native("sign", Some(1), |_, args| {
        let v = num(&args, 0, "sign")?;
        Ok(Value::Int(if v > 0.0 {
            1
        } else if v < 0.0 {
            -1
        } else {
            0
        }))
    });
    interp.register_native("clamp", Some(3), |_, args| {
        let v = arg(&args, 0, "clamp")?;
        let lo = arg(&args, 1, "clamp")?;
        let hi = arg(&args, 2, "clamp")?;
        if v.is_integral() && lo.is_integral() && hi.is_integral() {
            Ok(Value::from_i64(v.as_long()?.clamp(lo.as_long()?, hi.as_long()?)))
        } else {
            Ok(Value::Double(v.as_double()?.clamp(lo.as_double()?, hi.as_double()?)))
        }
    });
    for (name, f) in [
        ("sin", f64::sin as fn(f64) -> f64),
        ("cos", f64::cos),
        ("tan", f64::tan),
        ("asin", f64::asin),
        ("acos", f64::acos),
        ("atan", f64::atan),
        ("log", f64::ln),
        ("log10", f64::log10),
        ("log2", f64::log2),
        ("exp", f64::exp),
    ] {
        interp.register_native(name, Some(1), move |_, args| Ok(Value::Double(f(num(&args, 0, name)?))));
    }
    interp.register_native("atan2", Some(2), |_, args| {
        Ok(Value::Double(num(&args, 0, "atan2")?.atan2(num(&args, 1, "atan2")?)))
    });

    interp.register_native("randomInt", None, |_, args| {
        let mut rng = rand::thread_rng();
        match args.positional.len() {
            0 => Ok(Value::Int(rng.r#gen())),
            1 => {
                let hi = arg(&args, 0, "randomInt")?.as_long()?;
                Ok(Value::from_i64(rng.gen_range(0..hi.max(1))))
            }
            _ => {
                let lo = arg(&args, 0, "randomInt")?.as_long()?;
                let hi = arg(&args, 1, "randomInt")?.as_long()?;
                if lo >= hi {
                    return Err(NovaError::type_error("randomInt: empty range"));
                }
                Ok(Value::from_i64(rng.gen_range(lo..hi)))
            }
        }
    });
    interp.register_native("randomDouble", None, |_, _| {
        Ok(Value::Double(rand::thread_rng().r#gen::<f64>()))
    });
    interp.register_native("randomBool", None, |_, _| {
        Ok(Value::Bool(rand::thread_rng().r#gen::<bool>()))
    });
    interp.register_native("randomStr", None, |_, args| {
        let len = match args.positional.first() {
            Some(v) => usize::try_from(v.as_long()?).unwrap_or(8),
            None => 8,
        };
        let mut rng = rand::thread_rng();
        let text: String = (0..len)
            .map(|_| char::from(rng.gen_range(b'a'..=b'z')))
            .collect();
        Ok(Value::from_string(text))
    });
    interp.register_native("randomList", None, |_, args| {
        let len = usize::try_from(arg(&args, 0, "randomList")?.as_long()?).unwrap_or(0);
        let max = match args.positional.get(1) {
            Some(v) => v.as_long()?,
            None => 100,
        };
        let mut rng = rand::thread_rng();
        let items = (0..len)
            .map(|_| Value::from_i64(rng.gen_range(0..max.max(1))))
            .collect();
        Ok(Value::list(items))
    });
}
