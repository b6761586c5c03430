//! Operator dispatch: user overloads first, built-in semantics second.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::{
    class::arena_read,
    env::Env,
    error::{ErrorKind, EvalResult, NovaError, Signal},
    host::registry_lookup,
    interp::Interpreter,
    mir::{BinOp, Target, UnOp},
    types::{CallArgs, ResultValue},
    value::Value,
};

/// Binary operator tokens map to these overloadable method names.
fn operator_method(op: BinOp) -> Option<&'static str> {
    Some(match op {
        BinOp::Add => "plus",
        BinOp::Sub => "minus",
        BinOp::Mul => "times",
        BinOp::Div => "div",
        BinOp::Rem => "rem",
        _ => return None,
    })
}

impl Interpreter {
    /// Tries a user-defined operator method on an instance receiver.
    fn try_operator(&mut self, recv: &Value, method: &str, args: CallArgs, line: u32) -> Option<EvalResult<Value>> {
        if let Value::Instance(instance) = recv {
            let found = arena_read(&self.classes)
                .resolve_method(instance.class, method, args.positional.len())
                .is_some();
            if found {
                return Some(self.invoke_method(recv.clone(), method, args, line));
            }
        }
        None
    }

    pub(crate) fn binary_op(&mut self, op: BinOp, lhs: Value, rhs: Value, line: u32) -> EvalResult<Value> {
        match op {
            BinOp::Eq => Ok(Value::Bool(self.values_equal(&lhs, &rhs)?)),
            BinOp::NotEq => Ok(Value::Bool(!self.values_equal(&lhs, &rhs)?)),
            BinOp::Lt | BinOp::LtEq | BinOp::Gt | BinOp::GtEq => {
                let ordering = self.compare_values(&lhs, &rhs, line)?;
                let result = match op {
                    BinOp::Lt => ordering == Ordering::Less,
                    BinOp::LtEq => ordering != Ordering::Greater,
                    BinOp::Gt => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                };
                Ok(Value::Bool(result))
            }
            _ => {
                if let Some(method) = operator_method(op)
                    && let Some(result) =
                        self.try_operator(&lhs, method, CallArgs::positional([rhs.clone()]), line)
                {
                    return result;
                }
                let builtin = match op {
                    BinOp::Add => lhs.op_add(&rhs),
                    BinOp::Sub => lhs.op_sub(&rhs),
                    BinOp::Mul => lhs.op_mul(&rhs),
                    BinOp::Div => lhs.op_div(&rhs),
                    BinOp::Rem => lhs.op_rem(&rhs),
                    _ => unreachable!("comparisons handled above"),
                };
                builtin.map_err(|mut err| {
                    err.capture_frames(self.call_stack.snapshot());
                    Signal::raise(err)
                })
            }
        }
    }

    pub(crate) fn unary_op(&mut self, op: UnOp, value: Value, line: u32) -> EvalResult<Value> {
        match op {
            UnOp::Not => Ok(Value::Bool(!value.truthy())),
            UnOp::Neg => {
                if let Some(result) = self.try_operator(&value, "unaryMinus", CallArgs::empty(), line) {
                    return result;
                }
                value.op_neg().map_err(Signal::raise)
            }
            UnOp::Plus => {
                if let Some(result) = self.try_operator(&value, "unaryPlus", CallArgs::empty(), line) {
                    return result;
                }
                if value.is_number() {
                    Ok(value)
                } else {
                    Err(Signal::raise(NovaError::type_error(format!(
                        "unary '+' is not defined for {}",
                        value.type_name()
                    ))))
                }
            }
        }
    }

    /// Equality with user `equals` and data-class structural dispatch.
    ///
    /// Never fails across types: values of different shapes are simply
    /// unequal (numeric cross-type equality excepted).
    pub(crate) fn values_equal(&mut self, lhs: &Value, rhs: &Value) -> EvalResult<bool> {
        if let Value::Instance(instance) = lhs {
            if let Value::Instance(other) = rhs
                && Arc::ptr_eq(instance, other)
            {
                return Ok(true);
            }
            let has_equals = arena_read(&self.classes)
                .resolve_method(instance.class, "equals", 1)
                .is_some();
            if has_equals {
                let result = self.invoke_method(lhs.clone(), "equals", CallArgs::positional([rhs.clone()]), 0)?;
                return Ok(result.truthy());
            }
            if instance.is_data {
                let Value::Instance(other) = rhs else { return Ok(false) };
                if instance.class != other.class {
                    return Ok(false);
                }
                for (name, value) in instance.field_snapshot() {
                    let Some(other_value) = other.get_field(&name) else {
                        return Ok(false);
                    };
                    if !self.values_equal(&value, &other_value)? {
                        return Ok(false);
                    }
                }
                return Ok(true);
            }
        }
        Ok(lhs == rhs)
    }

    /// Ordering with user `compareTo` dispatch.
    pub(crate) fn compare_values(&mut self, lhs: &Value, rhs: &Value, line: u32) -> EvalResult<Ordering> {
        if let Some(ordering) = lhs.builtin_compare(rhs) {
            return Ok(ordering);
        }
        if let Some(result) = self.try_operator(lhs, "compareTo", CallArgs::positional([rhs.clone()]), line) {
            let sign = result?.as_long().map_err(Signal::raise)?;
            return Ok(sign.cmp(&0));
        }
        let mut err = NovaError::incomparable(&lhs.type_name(), &rhs.type_name());
        err.capture_frames(self.call_stack.snapshot());
        Err(Signal::raise(err))
    }

    /// The `in` operator: O(1) on ranges, membership elsewhere, user
    /// `contains` on instances.
    pub(crate) fn contains(&mut self, collection: &Value, item: &Value, line: u32) -> EvalResult<bool> {
        match collection {
            Value::Range(range) => {
                if item.is_integral() {
                    Ok(range.contains(item.as_long().map_err(Signal::raise)?))
                } else {
                    Ok(false)
                }
            }
            Value::List(list) => Ok(list.snapshot().iter().any(|candidate| candidate == item)),
            Value::Array(array) => Ok(array.snapshot().iter().any(|candidate| candidate == item)),
            Value::Map(map) => Ok(map.contains_key(item)),
            Value::Str(s) => match item {
                Value::Str(needle) => Ok(s.contains(needle.as_ref())),
                Value::Char(c) => Ok(s.contains(*c)),
                _ => Ok(false),
            },
            Value::Instance(_) => {
                if let Some(result) =
                    self.try_operator(collection, "contains", CallArgs::positional([item.clone()]), line)
                {
                    return Ok(result?.truthy());
                }
                Err(Signal::raise(NovaError::method_not_found(
                    &collection.type_name(),
                    "contains",
                )))
            }
            other => Err(Signal::raise(NovaError::type_error(format!(
                "'in' is not supported on {}",
                other.type_name()
            )))),
        }
    }

    /// Runtime `is` check. Reified type parameters resolve through their
    /// call-site binding before matching.
    pub(crate) fn type_matches(&self, value: &Value, ty: &str, env: &Env) -> bool {
        let resolved = self.resolve_type_name(ty, env);
        let ty = resolved.as_str();
        match ty {
            "Any" => !value.is_null(),
            "Null" | "Nothing" => value.is_null(),
            "Number" => value.is_number(),
            "Bool" | "Boolean" => matches!(value, Value::Bool(_)),
            "Int" => matches!(value, Value::Int(_)),
            "Long" => matches!(value, Value::Long(_)),
            "Float" => matches!(value, Value::Float(_)),
            "Double" => matches!(value, Value::Double(_)),
            "Char" => matches!(value, Value::Char(_)),
            "String" => matches!(value, Value::Str(_)),
            "List" => matches!(value, Value::List(_)),
            "Map" => matches!(value, Value::Map(_)),
            "Pair" => matches!(value, Value::Pair(_)),
            "Range" => matches!(value, Value::Range(_)),
            "Result" => matches!(value, Value::Result(_)),
            "Function" => matches!(value, Value::Function(_)),
            "Task" => matches!(value, Value::Task(_)),
            "Future" => matches!(value, Value::Future(_)),
            "Array" => matches!(value, Value::Array(_)),
            "Unit" => matches!(value, Value::Unit),
            _ => match value {
                Value::Instance(instance) => {
                    let arena = arena_read(&self.classes);
                    arena
                        .lookup(ty)
                        .is_some_and(|target| arena.is_subtype(instance.class, target))
                }
                Value::Class(class) => class.name.as_ref() == ty,
                Value::External(object) => {
                    let fqn = object.type_name();
                    fqn == ty || fqn.rsplit('.').next() == Some(ty)
                }
                _ => false,
            },
        }
    }

    /// Resolves a reified type parameter to its call-site argument, if bound.
    pub(crate) fn resolve_type_name(&self, ty: &str, env: &Env) -> String {
        if let Some(Value::Str(actual)) = env.get_opt(&format!("$type:{ty}")) {
            actual.to_string()
        } else {
            ty.to_owned()
        }
    }

    /// `as` / `as?` casts, including lambda-to-SAM conversion.
    pub(crate) fn eval_cast(&mut self, value: Value, ty: &str, safe: bool, env: &Env, line: u32) -> EvalResult<Value> {
        let ty = self.resolve_type_name(ty, env);
        let fail = |value: &Value| {
            if safe {
                Ok(Value::Null)
            } else {
                let mut err = NovaError::cast_error(&value.type_name(), &ty);
                err.capture_frames(self.call_stack.snapshot());
                Err(Signal::raise(err))
            }
        };

        // SAM conversion for lambdas
        if matches!(value, Value::Function(_)) {
            let candidates = [ty.clone(), format!("java.lang.{ty}"), format!("java.util.function.{ty}")];
            for fqn in &candidates {
                if let Some(class) = registry_lookup(&self.host_classes, fqn) {
                    return match class.sam_method() {
                        Some(method) => Ok(Value::External(Arc::new(crate::host::SamObject {
                            fqn: fqn.clone(),
                            method: method.to_owned(),
                            lambda: value,
                        }))),
                        None => fail(&value),
                    };
                }
            }
        }

        match ty.as_str() {
            "Any" => Ok(value),
            "Int" if value.is_number() || matches!(value, Value::Char(_)) => {
                Ok(Value::Int(value.as_int().map_err(Signal::raise)?))
            }
            "Long" if value.is_number() || matches!(value, Value::Char(_)) => {
                Ok(Value::Long(value.as_long().map_err(Signal::raise)?))
            }
            "Float" if value.is_number() => Ok(Value::Float(value.as_float().map_err(Signal::raise)?)),
            "Double" if value.is_number() => Ok(Value::Double(value.as_double().map_err(Signal::raise)?)),
            _ => {
                if self.type_matches(&value, &ty, env) {
                    Ok(value)
                } else {
                    fail(&value)
                }
            }
        }
    }

    /// `recv[index]` built-in semantics (user `get` handled by the caller
    /// falling through to method dispatch on instances).
    pub(crate) fn index_get(&mut self, recv: Value, index: Value, line: u32) -> EvalResult<Value> {
        let raised = |err: NovaError, stack: &crate::frame::CallStack| {
            let mut err = err;
            err.capture_frames(stack.snapshot());
            Signal::raise(err)
        };
        match &recv {
            Value::List(list) => match index {
                Value::Range(range) => {
                    let (from, to) = range.slice_bounds(list.len()).map_err(|e| raised(e, &self.call_stack))?;
                    Ok(Value::list(list.slice(from, to)))
                }
                other => {
                    let at = other.as_long().map_err(|e| raised(e, &self.call_stack))?;
                    list.get(at).map_err(|e| raised(e, &self.call_stack))
                }
            },
            Value::Array(array) => {
                let at = index.as_long().map_err(|e| raised(e, &self.call_stack))?;
                array.get(at).map_err(|e| raised(e, &self.call_stack))
            }
            Value::Str(s) => match index {
                Value::Range(range) => {
                    let chars: Vec<char> = s.chars().collect();
                    let (from, to) = range
                        .slice_bounds(chars.len())
                        .map_err(|e| raised(e, &self.call_stack))?;
                    Ok(Value::from_string(chars[from..to].iter().collect()))
                }
                other => {
                    let chars: Vec<char> = s.chars().collect();
                    let at = other.as_long().map_err(|e| raised(e, &self.call_stack))?;
                    let resolved = crate::types::resolve_index(at, chars.len())
                        .map_err(|e| raised(e, &self.call_stack))?;
                    Ok(Value::Char(chars[resolved]))
                }
            },
            Value::Map(map) => map.get(&index).ok_or_else(|| {
                raised(NovaError::key_not_found(&index.display()), &self.call_stack)
            }),
            Value::Pair(pair) => {
                let at = index.as_long().map_err(|e| raised(e, &self.call_stack))?;
                pair.get(at)
                    .ok_or_else(|| raised(NovaError::index_out_of_bounds(at, 2), &self.call_stack))
            }
            Value::Range(range) => {
                let at = index.as_long().map_err(|e| raised(e, &self.call_stack))?;
                let values = range.to_values();
                let resolved = crate::types::resolve_index(at, values.len())
                    .map_err(|e| raised(e, &self.call_stack))?;
                Ok(values[resolved].clone())
            }
            Value::Instance(_) => self.invoke_method(recv, "get", CallArgs::positional([index]), line),
            Value::External(object) => {
                let object = Arc::clone(object);
                object
                    .invoke("get", &[index], self)
                    .unwrap_or_else(|| Err(Signal::raise(NovaError::method_not_found(object.type_name(), "get"))))
            }
            other => Err(Signal::raise(NovaError::type_error(format!(
                "type {} does not support indexing",
                other.type_name()
            )))),
        }
    }

    /// `recv[index] = value` built-in semantics.
    pub(crate) fn index_set(&mut self, recv: Value, index: Value, value: Value, line: u32) -> EvalResult<Value> {
        match &recv {
            Value::List(list) => {
                let at = index.as_long().map_err(Signal::raise)?;
                list.set(at, value).map_err(Signal::raise)?;
                Ok(Value::Unit)
            }
            Value::Array(array) => {
                let at = index.as_long().map_err(Signal::raise)?;
                array.set(at, value).map_err(Signal::raise)?;
                Ok(Value::Unit)
            }
            Value::Map(map) => {
                map.insert(index, value);
                Ok(Value::Unit)
            }
            Value::Instance(_) => self.invoke_method(recv, "set", CallArgs::positional([index, value]), line),
            Value::External(object) => {
                let object = Arc::clone(object);
                object
                    .invoke("set", &[index, value], self)
                    .unwrap_or_else(|| Err(Signal::raise(NovaError::method_not_found(object.type_name(), "set"))))
            }
            other => Err(Signal::raise(NovaError::type_error(format!(
                "type {} does not support index assignment",
                other.type_name()
            )))),
        }
    }

    /// `++x` / `x--`: user `inc`/`dec` on instances, numeric step otherwise;
    /// the binding is overwritten and the pre- or post-value returned.
    pub(crate) fn eval_inc_dec(
        &mut self,
        inc: bool,
        prefix: bool,
        target: &Target,
        env: &Env,
        file: &Arc<str>,
        line: u32,
    ) -> EvalResult<Value> {
        let current = self.read_target(target, env, file, line)?;
        let method = if inc { "inc" } else { "dec" };
        let next = if let Some(result) = self.try_operator(&current, method, CallArgs::empty(), line) {
            result?
        } else if inc {
            current.op_add(&Value::Int(1)).map_err(Signal::raise)?
        } else {
            current.op_sub(&Value::Int(1)).map_err(Signal::raise)?
        };
        self.write_target(target, next.clone(), env, file, line)?;
        Ok(if prefix { next } else { current })
    }

    pub(crate) fn read_target(&mut self, target: &Target, env: &Env, file: &Arc<str>, line: u32) -> EvalResult<Value> {
        match target {
            Target::Name(name) => self.eval_ident(name, env, line),
            Target::Member { recv, name } => {
                let receiver = self.eval_expr(recv, env, file)?;
                self.member_value(receiver, name, line)
            }
            Target::Index { recv, index } => {
                let receiver = self.eval_expr(recv, env, file)?;
                let index = self.eval_expr(index, env, file)?;
                self.index_get(receiver, index, line)
            }
        }
    }

    /// Compound or plain assignment with single evaluation of the receiver
    /// and index.
    pub(crate) fn assign_target(
        &mut self,
        target: &Target,
        op: Option<BinOp>,
        value: Value,
        env: &Env,
        file: &Arc<str>,
        line: u32,
    ) -> EvalResult<()> {
        match target {
            Target::Name(name) => {
                let new = match op {
                    None => value,
                    Some(op) => {
                        let current = self.eval_ident(name, env, line)?;
                        self.binary_op(op, current, value, line)?
                    }
                };
                self.assign_name(name, new, env, line)
            }
            Target::Member { recv, name } => {
                let receiver = self.eval_expr(recv, env, file)?;
                let new = match op {
                    None => value,
                    Some(op) => {
                        let current = self.member_value(receiver.clone(), name, line)?;
                        self.binary_op(op, current, value, line)?
                    }
                };
                self.set_member(receiver, name, new, line)
            }
            Target::Index { recv, index } => {
                let receiver = self.eval_expr(recv, env, file)?;
                let index = self.eval_expr(index, env, file)?;
                let new = match op {
                    None => value,
                    Some(op) => {
                        let current = self.index_get(receiver.clone(), index.clone(), line)?;
                        self.binary_op(op, current, value, line)?
                    }
                };
                self.index_set(receiver, index, new, line)?;
                Ok(())
            }
        }
    }

    pub(crate) fn write_target(
        &mut self,
        target: &Target,
        value: Value,
        env: &Env,
        file: &Arc<str>,
        line: u32,
    ) -> EvalResult<()> {
        self.assign_target(target, None, value, env, file, line)
    }

    /// Assignment to a bare name: the lexical chain first, then an implicit
    /// `this` field.
    fn assign_name(&mut self, name: &str, value: Value, env: &Env, line: u32) -> EvalResult<()> {
        match env.assign(name, value.clone()) {
            Ok(()) => Ok(()),
            Err(err) if err.kind == ErrorKind::UndefinedVariable => {
                if let Some(Value::Instance(this)) = env.get_opt("this")
                    && this.has_field(name)
                {
                    let descriptor = arena_read(&self.classes).get(this.class);
                    if let Some(descriptor) = descriptor
                        && descriptor.field_mutable(name) == Some(false)
                    {
                        return Err(Signal::raise(NovaError::type_error(format!(
                            "Cannot reassign val '{name}'"
                        ))));
                    }
                    this.set_field(name, value);
                    return Ok(());
                }
                let mut err = err;
                err.capture_frames(self.call_stack.snapshot());
                let _ = line;
                Err(Signal::raise(err))
            }
            Err(err) => {
                let mut err = err;
                err.capture_frames(self.call_stack.snapshot());
                Err(Signal::raise(err))
            }
        }
    }

    /// Unwraps a `Result` for the propagation-adjacent builtins.
    pub(crate) fn unwrap_result(&mut self, result: &ResultValue) -> EvalResult<Value> {
        match result {
            ResultValue::Ok(value) => Ok(value.clone()),
            ResultValue::Err(err) => {
                let mut error = NovaError::new(
                    ErrorKind::UnwrapError,
                    format!("called unwrap() on an Err value: {}", err.display()),
                )
                .with_payload(err.clone());
                error.capture_frames(self.call_stack.snapshot());
                Err(Signal::raise(error))
            }
        }
    }
}
