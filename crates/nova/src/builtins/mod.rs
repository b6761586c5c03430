//! Built-in library surface: top-level functions and the per-type method
//! tables the evaluator falls back to after user and extension dispatch.

mod collections;
mod concurrent;
mod math;
mod misc;
mod numbers;
mod results;
mod scope_fns;
mod strings;

use crate::{
    error::EvalResult,
    interp::Interpreter,
    types::CallArgs,
    value::Value,
};

/// Installs every top-level builtin into the interpreter's globals.
///
/// Stdio functions are only registered when the policy allows stdio; the
/// host-interop entry points only when interop is enabled.
pub(crate) fn install(interp: &mut Interpreter) {
    math::install(interp);
    misc::install(interp);
    results::install(interp);
    concurrent::install(interp);
}

/// Built-in method dispatch for a receiver value.
///
/// Returns `None` when no built-in method of that name/arity exists, letting
/// the caller continue down the resolution ladder.
pub(crate) fn dispatch_method(
    interp: &mut Interpreter,
    recv: &Value,
    name: &str,
    args: &CallArgs,
    line: u32,
) -> Option<EvalResult<Value>> {
    if let Some(result) = scope_fns::dispatch(interp, recv, name, args, line) {
        return Some(result);
    }
    if let Some(result) = common_method(interp, recv, name, args, line) {
        return Some(result);
    }
    match recv {
        Value::Str(_) => strings::dispatch(interp, recv, name, args, line),
        Value::List(_) | Value::Array(_) | Value::Map(_) | Value::Range(_) => {
            collections::dispatch(interp, recv, name, args, line)
        }
        Value::Int(_) | Value::Long(_) | Value::Float(_) | Value::Double(_) | Value::Char(_) => {
            numbers::dispatch(interp, recv, name, args, line)
        }
        Value::Result(_) | Value::Pair(_) => results::dispatch(interp, recv, name, args, line),
        Value::Task(_) | Value::Future(_) => concurrent::dispatch(interp, recv, name, args, line),
        _ => None,
    }
}

/// Methods available on every receiver type.
fn common_method(
    interp: &mut Interpreter,
    recv: &Value,
    name: &str,
    args: &CallArgs,
    _line: u32,
) -> Option<EvalResult<Value>> {
    match (name, args.positional.len()) {
        ("toString", 0) => Some(interp.display_value(recv).map(Value::from_string)),
        // the `to` infix builds a pair
        ("to", 1) => Some(Ok(Value::pair(
            recv.clone(),
            args.positional.first().cloned().unwrap_or(Value::Null),
        ))),
        _ => None,
    }
}
