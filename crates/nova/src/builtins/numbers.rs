//! Built-in numeric and Char methods.

use crate::{
    error::{EvalResult, NovaError, Signal},
    interp::Interpreter,
    types::CallArgs,
    value::Value,
};

pub(super) fn dispatch(
    _interp: &mut Interpreter,
    recv: &Value,
    name: &str,
    args: &CallArgs,
    _line: u32,
) -> Option<EvalResult<Value>> {
    let argc = args.positional.len();
    let result = match (name, argc) {
        ("toInt", 0) => recv.as_int().map(Value::Int).map_err(Signal::raise),
        ("toLong", 0) => recv.as_long().map(Value::Long).map_err(Signal::raise),
        ("toFloat", 0) => recv.as_float().map(Value::Float).map_err(Signal::raise),
        ("toDouble", 0) => recv.as_double().map(Value::Double).map_err(Signal::raise),
        ("toChar", 0) => recv
            .as_long()
            .map_err(Signal::raise)
            .and_then(|code| {
                u32::try_from(code)
                    .ok()
                    .and_then(char::from_u32)
                    .map(Value::Char)
                    .ok_or_else(|| Signal::raise(NovaError::type_error(format!("{code} is not a valid code point"))))
            }),
        ("abs", 0) => match recv {
            Value::Int(v) => Ok(Value::Int(v.wrapping_abs())),
            Value::Long(v) => Ok(Value::Long(v.wrapping_abs())),
            Value::Float(v) => Ok(Value::Float(v.abs())),
            Value::Double(v) => Ok(Value::Double(v.abs())),
            _ => return None,
        },
        ("coerceIn", 2) => {
            let lo = args.positional.first().cloned().unwrap_or(Value::Null);
            let hi = args.positional.get(1).cloned().unwrap_or(Value::Null);
            if recv.is_integral() && lo.is_integral() && hi.is_integral() {
                let (v, lo, hi) = match (recv.as_long(), lo.as_long(), hi.as_long()) {
                    (Ok(v), Ok(lo), Ok(hi)) => (v, lo, hi),
                    _ => return Some(Err(Signal::raise(NovaError::type_error("coerceIn expects numbers")))),
                };
                Ok(Value::from_i64(v.clamp(lo, hi)))
            } else {
                let v = recv.as_double().map_err(Signal::raise);
                let lo = lo.as_double().map_err(Signal::raise);
                let hi = hi.as_double().map_err(Signal::raise);
                match (v, lo, hi) {
                    (Ok(v), Ok(lo), Ok(hi)) => Ok(Value::Double(v.clamp(lo, hi))),
                    (Err(err), _, _) | (_, Err(err), _) | (_, _, Err(err)) => Err(err),
                }
            }
        }
        ("isNaN", 0) => match recv {
            Value::Float(v) => Ok(Value::Bool(v.is_nan())),
            Value::Double(v) => Ok(Value::Bool(v.is_nan())),
            _ => Ok(Value::Bool(false)),
        },
        _ => return None,
    };
    Some(result)
}
