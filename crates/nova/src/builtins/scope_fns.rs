//! The scope functions: `let`, `also`, `run`, `apply`, `takeIf`,
//! `takeUnless`.
//!
//! Available on every receiver type. `let`/`also` pass the receiver as the
//! lambda argument (`it`); `run`/`apply` bind it as `this`. Extensions
//! registered at the same arity shadow these, as they are checked earlier in
//! the resolution ladder.

use crate::{
    error::EvalResult,
    interp::Interpreter,
    types::CallArgs,
    value::Value,
};

pub(super) fn dispatch(
    interp: &mut Interpreter,
    recv: &Value,
    name: &str,
    args: &CallArgs,
    line: u32,
) -> Option<EvalResult<Value>> {
    if args.positional.len() != 1 {
        return None;
    }
    let block = args.positional.first().cloned().unwrap_or(Value::Null);
    let result = match name {
        "let" => interp.call_value(block, CallArgs::positional([recv.clone()]), line),
        "also" => interp
            .call_value(block, CallArgs::positional([recv.clone()]), line)
            .map(|_| recv.clone()),
        "run" => interp.call_lambda_with_this(block, recv.clone(), CallArgs::empty(), line),
        "apply" => interp
            .call_lambda_with_this(block, recv.clone(), CallArgs::empty(), line)
            .map(|_| recv.clone()),
        "takeIf" => interp
            .call_value(block, CallArgs::positional([recv.clone()]), line)
            .map(|accepted| if accepted.truthy() { recv.clone() } else { Value::Null }),
        "takeUnless" => interp
            .call_value(block, CallArgs::positional([recv.clone()]), line)
            .map(|rejected| if rejected.truthy() { Value::Null } else { recv.clone() }),
        "with" => interp.call_lambda_with_this(block, recv.clone(), CallArgs::empty(), line),
        _ => return None,
    };
    Some(result)
}
