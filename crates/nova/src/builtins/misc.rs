//! Miscellaneous top-level builtins: collection constructors, type
//! inspection, assertions, stdio, and host-interop entry points.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::{
    error::{ErrorKind, NovaError},
    host::JavaNamespace,
    interp::Interpreter,
    io::{input_read_line, sink_write, sink_write_char},
    types::{ArrayValue, CallArgs, ElemKind},
    value::Value,
};

fn arg(args: &CallArgs, index: usize, name: &str) -> Result<Value, NovaError> {
    args.positional
        .get(index)
        .cloned()
        .ok_or_else(|| NovaError::type_error(format!("{name}: missing argument {index}")))
}

#[expect(clippy::too_many_lines, reason = "one registration per builtin")]
pub(super) fn install(interp: &mut Interpreter) {
    interp.register_native("len", Some(1), |_, args| {
        let value = arg(&args, 0, "len")?;
        let len = match &value {
            Value::Str(s) => s.chars().count(),
            Value::List(list) => list.len(),
            Value::Array(array) => array.len(),
            Value::Map(map) => map.len(),
            Value::Range(range) => range.len(),
            other => {
                return Err(NovaError::type_error(format!(
                    "len() is not defined for {}",
                    other.type_name()
                )));
            }
        };
        Ok(Value::from_i64(len as i64))
    });
    interp.register_native("typeof", Some(1), |_, args| {
        Ok(Value::from_string(arg(&args, 0, "typeof")?.type_name().into_owned()))
    });
    interp.register_native("isNull", Some(1), |_, args| {
        Ok(Value::Bool(arg(&args, 0, "isNull")?.is_null()))
    });
    interp.register_native("isNumber", Some(1), |_, args| {
        Ok(Value::Bool(arg(&args, 0, "isNumber")?.is_number()))
    });
    interp.register_native("isString", Some(1), |_, args| {
        Ok(Value::Bool(matches!(arg(&args, 0, "isString")?, Value::Str(_))))
    });
    interp.register_native("isList", Some(1), |_, args| {
        Ok(Value::Bool(matches!(arg(&args, 0, "isList")?, Value::List(_))))
    });
    interp.register_native("isMap", Some(1), |_, args| {
        Ok(Value::Bool(matches!(arg(&args, 0, "isMap")?, Value::Map(_))))
    });

    interp.register_native("toInt", Some(1), |_, args| {
        arg(&args, 0, "toInt")?.as_long().map(Value::from_i64)
    });
    interp.register_native("toDouble", Some(1), |_, args| {
        arg(&args, 0, "toDouble")?.as_double().map(Value::Double)
    });
    interp.register_native("toString", Some(1), |interp, args| {
        let value = arg(&args, 0, "toString")?;
        match interp.display_value(&value) {
            Ok(text) => Ok(Value::from_string(text)),
            Err(crate::error::Signal::Raise(err)) => Err(*err),
            Err(_) => Err(NovaError::type_error("unexpected control flow in toString")),
        }
    });

    interp.register_native("assert", None, |_, args| {
        let condition = arg(&args, 0, "assert")?;
        if condition.truthy() {
            Ok(Value::Unit)
        } else {
            let message = args
                .positional
                .get(1)
                .map_or_else(|| "assertion failed".to_owned(), Value::display);
            Err(NovaError::new(ErrorKind::AssertionFailed, message))
        }
    });
    interp.register_native("require", None, |_, args| {
        let condition = arg(&args, 0, "require")?;
        if condition.truthy() {
            Ok(Value::Unit)
        } else {
            let message = args
                .positional
                .get(1)
                .map_or_else(|| "requirement failed".to_owned(), Value::display);
            Err(NovaError::new(ErrorKind::AssertionFailed, message))
        }
    });
    interp.register_native("todo", None, |_, args| {
        let message = args
            .positional
            .first()
            .map_or_else(|| "not implemented".to_owned(), Value::display);
        Err(NovaError::new(ErrorKind::UserThrown, format!("TODO: {message}")))
    });
    interp.register_native("error", Some(1), |_, args| {
        let payload = arg(&args, 0, "error")?;
        let message = payload.display();
        Err(NovaError::new(ErrorKind::UserThrown, message).with_payload(payload))
    });

    interp.register_native("listOf", None, |_, args| Ok(Value::list(args.positional.to_vec())));
    interp.register_native("mutableListOf", None, |_, args| Ok(Value::list(args.positional.to_vec())));
    interp.register_native("arrayOf", None, |_, args| {
        Ok(Value::Array(ArrayValue::from_values(
            ElemKind::Any,
            args.positional.to_vec(),
        )))
    });
    interp.register_native("mapOf", None, |_, args| build_map(&args));
    interp.register_native("mutableMapOf", None, |_, args| build_map(&args));
    interp.register_native("Array", None, |interp, args| {
        let elem = args
            .type_args
            .first()
            .map_or(ElemKind::Any, |name| ElemKind::from_type_name(name));
        let len = usize::try_from(arg(&args, 0, "Array")?.as_long()?).unwrap_or(0);
        match args.positional.get(1) {
            // an initialiser lambda receives each index
            Some(init) => {
                let mut items = Vec::with_capacity(len);
                for index in 0..len {
                    let value = interp
                        .call_function(init.clone(), vec![Value::from_i64(index as i64)])?;
                    items.push(value);
                }
                Ok(Value::Array(ArrayValue::from_values(elem, items)))
            }
            None => Ok(Value::Array(ArrayValue::filled(elem, len))),
        }
    });

    interp.register_native("classOf", Some(1), |interp, args| {
        let value = arg(&args, 0, "classOf")?;
        match &value {
            Value::Instance(instance) => {
                let class = crate::class::arena_read(interp.classes())
                    .get(instance.class)
                    .map(|d| d.class_ref());
                Ok(class.map_or_else(
                    || Value::from_string(value.type_name().into_owned()),
                    Value::Class,
                ))
            }
            other => Ok(Value::from_string(other.type_name().into_owned())),
        }
    });

    if interp.policy().allow_stdio {
        interp.register_native("println", None, |interp, args| {
            print_values(interp, &args, true);
            Ok(Value::Unit)
        });
        interp.register_native("print", None, |interp, args| {
            print_values(interp, &args, false);
            Ok(Value::Unit)
        });
        interp.register_native("readLine", Some(0), |interp, _| {
            Ok(input_read_line(&interp.stdin).map_or(Value::Null, Value::from_string))
        });
        interp.register_native("input", None, |interp, args| {
            if let Some(prompt) = args.positional.first() {
                sink_write(&interp.stdout, &prompt.display());
            }
            Ok(input_read_line(&interp.stdin).map_or(Value::Null, Value::from_string))
        });
    }

    if interp.policy().allow_host_interop {
        interp
            .globals()
            .redefine("Java", Value::External(Arc::new(JavaNamespace)));
        interp.register_native("javaClass", Some(1), |interp, args| {
            let java = JavaNamespace;
            use crate::host::HostObject as _;
            let positional: Vec<Value> = args.positional.to_vec();
            match java.invoke("type", &positional, interp) {
                Some(Ok(value)) => Ok(value),
                Some(Err(crate::error::Signal::Raise(err))) => Err(*err),
                Some(Err(_)) => Err(NovaError::type_error("unexpected control flow in javaClass")),
                None => Err(NovaError::method_not_found("Java", "type")),
            }
        });
    }
}

fn build_map(args: &CallArgs) -> Result<Value, NovaError> {
    let mut entries = IndexMap::new();
    for value in &args.positional {
        match value {
            Value::Pair(pair) => {
                entries.insert(pair.first.clone(), pair.second.clone());
            }
            other => {
                return Err(NovaError::type_error(format!(
                    "mapOf() expects Pair arguments, got {}",
                    other.type_name()
                )));
            }
        }
    }
    Ok(Value::map(entries))
}

fn print_values(interp: &mut Interpreter, args: &CallArgs, newline: bool) {
    let mut first = true;
    let rendered: Vec<String> = args
        .positional
        .iter()
        .map(|value| interp.display_value(value).unwrap_or_else(|_| value.display()))
        .collect();
    for text in rendered {
        if !first {
            sink_write_char(&interp.stdout, ' ');
        }
        sink_write(&interp.stdout, &text);
        first = false;
    }
    if newline {
        sink_write_char(&interp.stdout, '\n');
    }
}
