//! Built-in List, Array, Map, and Range methods.

use std::cmp::Ordering;

use crate::{
    error::{EvalResult, NovaError, Signal},
    interp::Interpreter,
    types::CallArgs,
    value::Value,
};

fn missing(method: &str, index: usize) -> Signal {
    Signal::raise(NovaError::type_error(format!("{method}: missing argument {index}")))
}

/// Unwraps an `EvalResult` inside a function returning `Option<EvalResult<_>>`,
/// propagating an error as `Some(Err(_))`.
macro_rules! tryv {
    ($e:expr) => {
        match $e {
            Ok(value) => value,
            Err(err) => return Some(Err(err)),
        }
    };
}

fn callable(args: &CallArgs, index: usize, method: &str) -> EvalResult<Value> {
    args.positional.get(index).cloned().ok_or_else(|| missing(method, index))
}

fn int_arg(args: &CallArgs, index: usize, method: &str) -> EvalResult<i64> {
    args.positional
        .get(index)
        .ok_or_else(|| missing(method, index))?
        .as_long()
        .map_err(Signal::raise)
}

pub(super) fn dispatch(
    interp: &mut Interpreter,
    recv: &Value,
    name: &str,
    args: &CallArgs,
    line: u32,
) -> Option<EvalResult<Value>> {
    match recv {
        Value::List(_) | Value::Array(_) => sequence_dispatch(interp, recv, name, args, line),
        Value::Map(_) => map_dispatch(interp, recv, name, args, line),
        Value::Range(_) => range_dispatch(interp, recv, name, args, line),
        _ => None,
    }
}

fn items_of(recv: &Value) -> Vec<Value> {
    match recv {
        Value::List(list) => list.snapshot(),
        Value::Array(array) => array.snapshot(),
        Value::Range(range) => range.to_values(),
        _ => Vec::new(),
    }
}

#[expect(clippy::too_many_lines, reason = "one table entry per supported method")]
fn sequence_dispatch(
    interp: &mut Interpreter,
    recv: &Value,
    name: &str,
    args: &CallArgs,
    line: u32,
) -> Option<EvalResult<Value>> {
    let argc = args.positional.len();
    let result = match (name, argc) {
        ("size", 0) => Ok(Value::Int(items_of(recv).len() as i32)),
        ("isEmpty", 0) => Ok(Value::Bool(items_of(recv).is_empty())),
        ("isNotEmpty", 0) => Ok(Value::Bool(!items_of(recv).is_empty())),
        ("first", 0) => items_of(recv)
            .first()
            .cloned()
            .ok_or_else(|| Signal::raise(NovaError::index_out_of_bounds(0, 0))),
        ("last", 0) => items_of(recv)
            .last()
            .cloned()
            .ok_or_else(|| Signal::raise(NovaError::index_out_of_bounds(-1, 0))),
        ("contains", 1) => {
            let needle = tryv!(callable(args, 0, name));
            Ok(Value::Bool(items_of(recv).contains(&needle)))
        }
        ("indexOf", 1) => {
            let needle = tryv!(callable(args, 0, name));
            Ok(Value::Int(
                items_of(recv)
                    .iter()
                    .position(|item| *item == needle)
                    .map_or(-1, |at| at as i32),
            ))
        }
        ("add", 1) => {
            let Value::List(list) = recv else {
                return Some(Err(Signal::raise(NovaError::type_error("add() requires a List"))));
            };
            list.push(tryv!(callable(args, 0, name)));
            Ok(Value::Unit)
        }
        ("set", 2) => {
            let at = tryv!(int_arg(args, 0, name));
            let value = tryv!(callable(args, 1, name));
            match recv {
                Value::List(list) => list.set(at, value).map_err(Signal::raise).map(|()| Value::Unit),
                Value::Array(array) => array.set(at, value).map_err(Signal::raise).map(|()| Value::Unit),
                _ => unreachable!("sequence receivers only"),
            }
        }
        ("removeAt", 1) => {
            let Value::List(list) = recv else {
                return Some(Err(Signal::raise(NovaError::type_error("removeAt() requires a List"))));
            };
            list.remove_at(tryv!(int_arg(args, 0, name))).map_err(Signal::raise)
        }
        ("slice", 2) => {
            let from = tryv!(int_arg(args, 0, name));
            let to = tryv!(int_arg(args, 1, name));
            let range = crate::types::RangeValue::new(from, to, true);
            let items = items_of(recv);
            range
                .slice_bounds(items.len())
                .map(|(from, to)| Value::list(items[from..to].to_vec()))
                .map_err(Signal::raise)
        }
        ("map", 1) => {
            let f = tryv!(callable(args, 0, name));
            let mut out = Vec::new();
            for item in items_of(recv) {
                out.push(tryv!(interp.call_value(f.clone(), CallArgs::positional([item]), line)));
            }
            Ok(Value::list(out))
        }
        ("mapNotNull", 1) => {
            let f = tryv!(callable(args, 0, name));
            let mut out = Vec::new();
            for item in items_of(recv) {
                let mapped = tryv!(interp.call_value(f.clone(), CallArgs::positional([item]), line));
                if !mapped.is_null() {
                    out.push(mapped);
                }
            }
            Ok(Value::list(out))
        }
        ("filter", 1) => {
            let f = tryv!(callable(args, 0, name));
            let mut out = Vec::new();
            for item in items_of(recv) {
                if tryv!(
                    interp.call_value(f.clone(), CallArgs::positional([item.clone()]), line)
                )
                .truthy()
                {
                    out.push(item);
                }
            }
            Ok(Value::list(out))
        }
        ("flatMap", 1) => {
            let f = tryv!(callable(args, 0, name));
            let mut out = Vec::new();
            for item in items_of(recv) {
                let mapped = tryv!(interp.call_value(f.clone(), CallArgs::positional([item]), line));
                match mapped {
                    Value::List(inner) => out.extend(inner.snapshot()),
                    other => out.push(other),
                }
            }
            Ok(Value::list(out))
        }
        ("reduce", 2) => {
            let mut acc = tryv!(callable(args, 0, name));
            let f = tryv!(callable(args, 1, name));
            for item in items_of(recv) {
                acc = tryv!(interp.call_value(f.clone(), CallArgs::positional([acc, item]), line));
            }
            Ok(acc)
        }
        ("any", 1) => {
            let f = tryv!(callable(args, 0, name));
            for item in items_of(recv) {
                if tryv!(interp.call_value(f.clone(), CallArgs::positional([item]), line)).truthy() {
                    return Some(Ok(Value::Bool(true)));
                }
            }
            Ok(Value::Bool(false))
        }
        ("all", 1) => {
            let f = tryv!(callable(args, 0, name));
            for item in items_of(recv) {
                if !tryv!(interp.call_value(f.clone(), CallArgs::positional([item]), line)).truthy() {
                    return Some(Ok(Value::Bool(false)));
                }
            }
            Ok(Value::Bool(true))
        }
        ("none", 1) => {
            let f = tryv!(callable(args, 0, name));
            for item in items_of(recv) {
                if tryv!(interp.call_value(f.clone(), CallArgs::positional([item]), line)).truthy() {
                    return Some(Ok(Value::Bool(false)));
                }
            }
            Ok(Value::Bool(true))
        }
        ("sorted", 0) => {
            let mut items = items_of(recv);
            let mut failure = None;
            items.sort_by(|a, b| match interp.compare_values(a, b, line) {
                Ok(ordering) => ordering,
                Err(err) => {
                    if failure.is_none() {
                        failure = Some(err);
                    }
                    Ordering::Equal
                }
            });
            match failure {
                Some(err) => Err(err),
                None => Ok(Value::list(items)),
            }
        }
        ("sortedBy", 1) => {
            let f = tryv!(callable(args, 0, name));
            let mut keyed = Vec::new();
            for item in items_of(recv) {
                let key = tryv!(interp.call_value(f.clone(), CallArgs::positional([item.clone()]), line));
                keyed.push((key, item));
            }
            let mut failure = None;
            keyed.sort_by(|(a, _), (b, _)| match interp.compare_values(a, b, line) {
                Ok(ordering) => ordering,
                Err(err) => {
                    if failure.is_none() {
                        failure = Some(err);
                    }
                    Ordering::Equal
                }
            });
            match failure {
                Some(err) => Err(err),
                None => Ok(Value::list(keyed.into_iter().map(|(_, item)| item).collect())),
            }
        }
        ("distinct", 0) => {
            let mut out: Vec<Value> = Vec::new();
            for item in items_of(recv) {
                if !out.contains(&item) {
                    out.push(item);
                }
            }
            Ok(Value::list(out))
        }
        ("take", 1) => {
            let n = usize::try_from(tryv!(int_arg(args, 0, name))).unwrap_or(0);
            Ok(Value::list(items_of(recv).into_iter().take(n).collect()))
        }
        ("drop", 1) => {
            let n = usize::try_from(tryv!(int_arg(args, 0, name))).unwrap_or(0);
            Ok(Value::list(items_of(recv).into_iter().skip(n).collect()))
        }
        ("zip", 1) => {
            let other = tryv!(callable(args, 0, name));
            let rhs = match &other {
                Value::List(list) => list.snapshot(),
                Value::Array(array) => array.snapshot(),
                Value::Range(range) => range.to_values(),
                other => {
                    return Some(Err(Signal::raise(NovaError::type_error(format!(
                        "zip() requires a List, got {}",
                        other.type_name()
                    )))));
                }
            };
            Ok(Value::list(
                items_of(recv)
                    .into_iter()
                    .zip(rhs)
                    .map(|(a, b)| Value::pair(a, b))
                    .collect(),
            ))
        }
        ("sum", 0) => {
            let mut total = Value::Int(0);
            for item in items_of(recv) {
                total = tryv!(total.op_add(&item).map_err(Signal::raise));
            }
            Ok(total)
        }
        ("joinToString", 0 | 1) => {
            let separator = match args.positional.first() {
                Some(Value::Str(s)) => s.to_string(),
                Some(other) => other.display(),
                None => ", ".to_owned(),
            };
            let mut out = String::new();
            for (index, item) in items_of(recv).iter().enumerate() {
                if index > 0 {
                    out.push_str(&separator);
                }
                out.push_str(&tryv!(interp.display_value(item)));
            }
            Ok(Value::from_string(out))
        }
        ("reversed", 0) => {
            let mut items = items_of(recv);
            items.reverse();
            Ok(Value::list(items))
        }
        ("count", 0) => Ok(Value::Int(items_of(recv).len() as i32)),
        ("count", 1) => {
            let f = tryv!(callable(args, 0, name));
            let mut count = 0;
            for item in items_of(recv) {
                if tryv!(interp.call_value(f.clone(), CallArgs::positional([item]), line)).truthy() {
                    count += 1;
                }
            }
            Ok(Value::Int(count))
        }
        ("find", 1) => {
            let f = tryv!(callable(args, 0, name));
            for item in items_of(recv) {
                if tryv!(
                    interp.call_value(f.clone(), CallArgs::positional([item.clone()]), line)
                )
                .truthy()
                {
                    return Some(Ok(item));
                }
            }
            Ok(Value::Null)
        }
        ("forEach", 1) => {
            let f = tryv!(callable(args, 0, name));
            for item in items_of(recv) {
                tryv!(interp.call_value(f.clone(), CallArgs::positional([item]), line));
            }
            Ok(Value::Unit)
        }
        ("toList", 0) => Ok(Value::list(items_of(recv))),
        _ => return None,
    };
    Some(result)
}

fn map_dispatch(
    interp: &mut Interpreter,
    recv: &Value,
    name: &str,
    args: &CallArgs,
    line: u32,
) -> Option<EvalResult<Value>> {
    let Value::Map(map) = recv else { return None };
    let argc = args.positional.len();
    let result = match (name, argc) {
        ("size", 0) => Ok(Value::Int(map.len() as i32)),
        ("isEmpty", 0) => Ok(Value::Bool(map.is_empty())),
        ("isNotEmpty", 0) => Ok(Value::Bool(!map.is_empty())),
        ("keys", 0) => Ok(Value::list(map.snapshot().into_iter().map(|(k, _)| k).collect())),
        ("values", 0) => Ok(Value::list(map.snapshot().into_iter().map(|(_, v)| v).collect())),
        ("entries", 0) => Ok(Value::list(
            map.snapshot().into_iter().map(|(k, v)| Value::pair(k, v)).collect(),
        )),
        ("get", 1) => {
            let key = tryv!(callable(args, 0, name));
            Ok(map.get(&key).unwrap_or(Value::Null))
        }
        ("set", 2) | ("put", 2) => {
            let key = tryv!(callable(args, 0, name));
            let value = tryv!(callable(args, 1, name));
            map.insert(key, value);
            Ok(Value::Unit)
        }
        ("containsKey", 1) => {
            let key = tryv!(callable(args, 0, name));
            Ok(Value::Bool(map.contains_key(&key)))
        }
        ("containsValue", 1) => {
            let value = tryv!(callable(args, 0, name));
            Ok(Value::Bool(map.snapshot().iter().any(|(_, v)| *v == value)))
        }
        ("remove", 1) => {
            let key = tryv!(callable(args, 0, name));
            Ok(map.remove(&key).unwrap_or(Value::Null))
        }
        ("clear", 0) => {
            map.write().clear();
            Ok(Value::Unit)
        }
        ("getOrDefault", 2) => {
            let key = tryv!(callable(args, 0, name));
            let default = tryv!(callable(args, 1, name));
            Ok(map.get(&key).unwrap_or(default))
        }
        ("putAll", 1) => match tryv!(callable(args, 0, name)) {
            Value::Map(other) => {
                for (k, v) in other.snapshot() {
                    map.insert(k, v);
                }
                Ok(Value::Unit)
            }
            other => Err(Signal::raise(NovaError::type_error(format!(
                "putAll() requires a Map, got {}",
                other.type_name()
            )))),
        },
        ("forEach", 1) => {
            let f = tryv!(callable(args, 0, name));
            for (k, v) in map.snapshot() {
                tryv!(interp.call_value(f.clone(), CallArgs::positional([Value::pair(k, v)]), line));
            }
            Ok(Value::Unit)
        }
        _ => return None,
    };
    Some(result)
}

fn range_dispatch(
    interp: &mut Interpreter,
    recv: &Value,
    name: &str,
    args: &CallArgs,
    line: u32,
) -> Option<EvalResult<Value>> {
    let Value::Range(range) = recv else { return None };
    let argc = args.positional.len();
    let result = match (name, argc) {
        ("contains", 1) => {
            let needle = tryv!(callable(args, 0, name));
            Ok(Value::Bool(
                needle.is_integral() && range.contains(tryv!(needle.as_long().map_err(Signal::raise))),
            ))
        }
        ("toList", 0) => Ok(Value::list(range.to_values())),
        ("size", 0) => Ok(Value::Int(range.len() as i32)),
        ("first", 0) => Ok(Value::from_i64(range.start)),
        ("last", 0) => range
            .last()
            .map(Value::from_i64)
            .ok_or_else(|| Signal::raise(NovaError::index_out_of_bounds(-1, 0))),
        ("forEach" | "map" | "filter" | "sum" | "joinToString" | "reversed" | "count" | "any" | "all" | "none", _) => {
            // ranges reuse the sequence table over their materialised values
            return sequence_dispatch(interp, recv, name, args, line);
        }
        _ => return None,
    };
    Some(result)
}
