//! Built-in String methods.

use crate::{
    error::{EvalResult, NovaError, Signal},
    interp::Interpreter,
    types::CallArgs,
    value::Value,
};

fn str_arg(args: &CallArgs, index: usize, method: &str) -> EvalResult<String> {
    match args.positional.get(index) {
        Some(Value::Str(s)) => Ok(s.to_string()),
        Some(Value::Char(c)) => Ok(c.to_string()),
        Some(other) => Err(Signal::raise(NovaError::type_error(format!(
            "String.{method}: expected a String argument, got {}",
            other.type_name()
        )))),
        None => Err(Signal::raise(NovaError::type_error(format!(
            "String.{method}: missing argument {index}"
        )))),
    }
}

fn int_arg(args: &CallArgs, index: usize, method: &str) -> EvalResult<i64> {
    match args.positional.get(index) {
        Some(value) if value.is_integral() => value.as_long().map_err(Signal::raise),
        Some(other) => Err(Signal::raise(NovaError::type_error(format!(
            "String.{method}: expected an Int argument, got {}",
            other.type_name()
        )))),
        None => Err(Signal::raise(NovaError::type_error(format!(
            "String.{method}: missing argument {index}"
        )))),
    }
}

#[expect(clippy::too_many_lines, reason = "one table entry per supported method")]
pub(super) fn dispatch(
    _interp: &mut Interpreter,
    recv: &Value,
    name: &str,
    args: &CallArgs,
    _line: u32,
) -> Option<EvalResult<Value>> {
    let Value::Str(s) = recv else { return None };
    let argc = args.positional.len();
    let result = match (name, argc) {
        ("length", 0) => Ok(Value::Int(s.chars().count() as i32)),
        ("isEmpty", 0) => Ok(Value::Bool(s.is_empty())),
        ("isNotEmpty", 0) => Ok(Value::Bool(!s.is_empty())),
        ("toUpperCase", 0) => Ok(Value::from_string(s.to_uppercase())),
        ("toLowerCase", 0) => Ok(Value::from_string(s.to_lowercase())),
        ("contains", 1) => str_arg(args, 0, name).map(|needle| Value::Bool(s.contains(&needle))),
        ("startsWith", 1) => str_arg(args, 0, name).map(|prefix| Value::Bool(s.starts_with(&prefix))),
        ("endsWith", 1) => str_arg(args, 0, name).map(|suffix| Value::Bool(s.ends_with(&suffix))),
        ("indexOf", 1) => str_arg(args, 0, name).map(|needle| {
            // character index, not byte offset
            match s.find(&needle) {
                Some(byte_at) => Value::Int(s[..byte_at].chars().count() as i32),
                None => Value::Int(-1),
            }
        }),
        ("substring", 1 | 2) => (|| {
            let chars: Vec<char> = s.chars().collect();
            let from = int_arg(args, 0, name)?;
            let to = if argc == 2 { int_arg(args, 1, name)? } else { chars.len() as i64 };
            if from < 0 || to < from || to > chars.len() as i64 {
                return Err(Signal::raise(NovaError::index_out_of_bounds(from, chars.len())));
            }
            Ok(Value::from_string(chars[from as usize..to as usize].iter().collect()))
        })(),
        ("replace", 2) => {
            let from = str_arg(args, 0, name);
            let to = str_arg(args, 1, name);
            from.and_then(|from| to.map(|to| Value::from_string(s.replace(&from, &to))))
        }
        ("trim", 0) => Ok(Value::from_str_slice(s.trim())),
        ("trimStart", 0) => Ok(Value::from_str_slice(s.trim_start())),
        ("trimEnd", 0) => Ok(Value::from_str_slice(s.trim_end())),
        ("split", 1) => str_arg(args, 0, name).map(|separator| {
            let parts: Vec<Value> = if separator.is_empty() {
                s.chars().map(|c| Value::from_string(c.to_string())).collect()
            } else {
                s.split(&separator).map(Value::from_str_slice).collect()
            };
            Value::list(parts)
        }),
        ("repeat", 1) => int_arg(args, 0, name).map(|n| {
            let n = usize::try_from(n).unwrap_or(0);
            Value::from_string(s.repeat(n))
        }),
        ("padStart", 1 | 2) => pad(s, args, name, true),
        ("padEnd", 1 | 2) => pad(s, args, name, false),
        ("toInt", 0) => s
            .trim()
            .parse::<i64>()
            .map(Value::from_i64)
            .map_err(|_| Signal::raise(NovaError::type_error(format!("Cannot convert '{s}' to Int")))),
        ("toDouble", 0) => s
            .trim()
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|_| Signal::raise(NovaError::type_error(format!("Cannot convert '{s}' to Double")))),
        ("reversed", 0) => Ok(Value::from_string(s.chars().rev().collect())),
        ("chars", 0) => Ok(Value::list(s.chars().map(Value::Char).collect())),
        ("first", 0) => s
            .chars()
            .next()
            .map(Value::Char)
            .ok_or_else(|| Signal::raise(NovaError::index_out_of_bounds(0, 0))),
        ("last", 0) => s
            .chars()
            .last()
            .map(Value::Char)
            .ok_or_else(|| Signal::raise(NovaError::index_out_of_bounds(-1, 0))),
        _ => return None,
    };
    Some(result)
}

fn pad(s: &str, args: &CallArgs, method: &str, at_start: bool) -> EvalResult<Value> {
    let width = usize::try_from(int_arg(args, 0, method)?).unwrap_or(0);
    let fill = match args.positional.get(1) {
        Some(Value::Char(c)) => *c,
        Some(Value::Str(text)) => text.chars().next().unwrap_or(' '),
        Some(other) => {
            return Err(Signal::raise(NovaError::type_error(format!(
                "String.{method}: pad character must be a Char, got {}",
                other.type_name()
            ))));
        }
        None => ' ',
    };
    let current = s.chars().count();
    if current >= width {
        return Ok(Value::from_str_slice(s));
    }
    let padding: String = std::iter::repeat_n(fill, width - current).collect();
    Ok(Value::from_string(if at_start {
        format!("{padding}{s}")
    } else {
        format!("{s}{padding}")
    }))
}
