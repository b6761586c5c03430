//! The Result and Pair surface: constructors, combinators, unwrapping.

use std::sync::Arc;

use crate::{
    error::{EvalResult, NovaError, Signal},
    interp::Interpreter,
    types::{CallArgs, ResultValue},
    value::Value,
};

pub(super) fn install(interp: &mut Interpreter) {
    interp.register_native("Ok", Some(1), |_, args| {
        Ok(Value::ok(args.positional.into_iter().next().unwrap_or(Value::Null)))
    });
    interp.register_native("Err", Some(1), |_, args| {
        Ok(Value::err(args.positional.into_iter().next().unwrap_or(Value::Null)))
    });
    interp.register_native("runCatching", Some(1), |interp, args| {
        let f = args.positional.into_iter().next().unwrap_or(Value::Null);
        match interp.call_value(f, CallArgs::empty(), 0) {
            Ok(value) => Ok(Value::ok(value)),
            Err(Signal::Raise(err)) if err.kind.is_catchable() => {
                let payload = err.payload.clone().unwrap_or_else(|| Value::from_str_slice(&err.message));
                Ok(Value::err(payload))
            }
            Err(Signal::Raise(err)) => Err(*err),
            Err(Signal::Return(value)) => Ok(Value::ok(value)),
            Err(_) => Err(NovaError::type_error("unexpected control flow in runCatching")),
        }
    });
    interp.register_native("Pair", Some(2), |_, args| {
        let mut it = args.positional.into_iter();
        Ok(Value::pair(it.next().unwrap_or(Value::Null), it.next().unwrap_or(Value::Null)))
    });
}

pub(super) fn dispatch(
    interp: &mut Interpreter,
    recv: &Value,
    name: &str,
    args: &CallArgs,
    line: u32,
) -> Option<EvalResult<Value>> {
    match recv {
        Value::Result(result) => result_dispatch(interp, result, name, args, line),
        Value::Pair(pair) => {
            let argc = args.positional.len();
            match (name, argc) {
                ("first", 0) => Some(Ok(pair.first.clone())),
                ("second", 0) => Some(Ok(pair.second.clone())),
                ("toList", 0) => Some(Ok(Value::list(vec![pair.first.clone(), pair.second.clone()]))),
                _ => None,
            }
        }
        _ => None,
    }
}

fn result_dispatch(
    interp: &mut Interpreter,
    result: &Arc<ResultValue>,
    name: &str,
    args: &CallArgs,
    line: u32,
) -> Option<EvalResult<Value>> {
    let argc = args.positional.len();
    let outcome = match (name, argc) {
        ("isOk", 0) => Ok(Value::Bool(result.is_ok())),
        ("isErr", 0) => Ok(Value::Bool(result.is_err())),
        ("map", 1) => {
            let f = args.positional.first().cloned().unwrap_or(Value::Null);
            match result.as_ref() {
                ResultValue::Ok(value) => interp
                    .call_value(f, CallArgs::positional([value.clone()]), line)
                    .map(Value::ok),
                ResultValue::Err(_) => Ok(Value::Result(Arc::clone(result))),
            }
        }
        ("mapErr", 1) => {
            let f = args.positional.first().cloned().unwrap_or(Value::Null);
            match result.as_ref() {
                ResultValue::Err(err) => interp
                    .call_value(f, CallArgs::positional([err.clone()]), line)
                    .map(Value::err),
                ResultValue::Ok(_) => Ok(Value::Result(Arc::clone(result))),
            }
        }
        ("unwrap", 0) | ("get", 0) => interp.unwrap_result(result),
        ("unwrapOr", 1) => match result.as_ref() {
            ResultValue::Ok(value) => Ok(value.clone()),
            ResultValue::Err(_) => Ok(args.positional.first().cloned().unwrap_or(Value::Null)),
        },
        ("getOrNull", 0) => match result.as_ref() {
            ResultValue::Ok(value) => Ok(value.clone()),
            ResultValue::Err(_) => Ok(Value::Null),
        },
        ("errorOrNull", 0) => match result.as_ref() {
            ResultValue::Ok(_) => Ok(Value::Null),
            ResultValue::Err(err) => Ok(err.clone()),
        },
        _ => return None,
    };
    Some(outcome)
}
