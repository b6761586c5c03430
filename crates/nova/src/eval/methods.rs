//! Method resolution and member access.
//!
//! The resolution ladder for `recv.m(args)`: instance methods through the
//! class chain and interfaces, companion members via the class name,
//! registered extension functions (same-arity shadowing), built-in method
//! tables, host-object methods, and finally in-scope receiver-lambdas.

use std::{
    hash::{Hash, Hasher},
    sync::Arc,
};

use crate::{
    annotations::BuilderObject,
    class::{ClassRef, Instance, InstanceKind, arena_read},
    env::Env,
    error::{ErrorKind, EvalResult, NovaError, Signal},
    interp::Interpreter,
    mir::{CallArg, ClassKind, Expr},
    types::{CallArgs, FunctionValue, UserFunction},
    value::Value,
};

impl Interpreter {
    #[expect(clippy::too_many_arguments, reason = "call sites carry full MIR context")]
    pub(crate) fn eval_method_call(
        &mut self,
        recv: &Expr,
        name: &str,
        type_args: &[String],
        args: &[CallArg],
        safe: bool,
        on_super: bool,
        env: &Env,
        file: &Arc<str>,
        line: u32,
    ) -> EvalResult<Value> {
        let receiver = self.eval_expr(recv, env, file)?;
        if safe && receiver.is_null() {
            return Ok(Value::Null);
        }
        let (call_args, holes) = self.eval_args(args, env, file)?;
        if holes.iter().any(|h| *h) {
            // method partials: bind the receiver now, holes fill later
            let resolved = self.member_value(receiver, name, line)?;
            let Value::Function(target) = resolved else {
                return Err(Signal::raise(NovaError::not_callable(&resolved.type_name())));
            };
            let bound = call_args
                .positional
                .into_iter()
                .zip(holes)
                .map(|(value, hole)| if hole { None } else { Some(value) })
                .collect();
            return Ok(Value::Function(Arc::new(FunctionValue::Partial { target, bound })));
        }

        if on_super {
            return self.invoke_super_method(&receiver, name, call_args, line);
        }

        let _ = type_args;
        self.invoke_method_in_scope(receiver, name, call_args, Some(env), line)
    }

    /// `super.m(args)`: resolution starts above the current class context.
    fn invoke_super_method(&mut self, receiver: &Value, name: &str, args: CallArgs, line: u32) -> EvalResult<Value> {
        let current = self.class_context.last().copied().ok_or_else(|| {
            Signal::raise(NovaError::syntax(line, 1, "'super' is only available inside methods"))
        })?;
        let superclass = arena_read(&self.classes)
            .get(current)
            .and_then(|descriptor| descriptor.superclass);
        let Some(superclass) = superclass else {
            return Err(Signal::raise(NovaError::method_not_found("super", name)));
        };
        let resolved = arena_read(&self.classes).resolve_method(superclass, name, args.len());
        match resolved {
            Some((fun, owner)) => {
                self.check_visibility(fun.visibility, owner.id, name)
                    .map_err(Signal::raise)?;
                self.call_user(&fun, args, Some(receiver.clone()), &[], line)
            }
            None => Err(Signal::raise(NovaError::method_not_found("super", name))),
        }
    }

    /// Full method dispatch without scope context (no receiver-lambda step).
    pub(crate) fn invoke_method(&mut self, recv: Value, name: &str, args: CallArgs, line: u32) -> EvalResult<Value> {
        self.invoke_method_in_scope(recv, name, args, None, line)
    }

    pub(crate) fn invoke_method_in_scope(
        &mut self,
        recv: Value,
        name: &str,
        args: CallArgs,
        env: Option<&Env>,
        line: u32,
    ) -> EvalResult<Value> {
        // 1. instance methods through the class chain and interfaces
        if let Value::Instance(instance) = &recv {
            let resolved = arena_read(&self.classes).resolve_method(instance.class, name, args.len());
            if let Some((fun, owner)) = resolved {
                self.check_visibility(fun.visibility, owner.id, name)
                    .map_err(Signal::raise)?;
                return self.call_user(&fun, args, Some(recv.clone()), &[], line);
            }
            if instance.kind == InstanceKind::Companion {
                let companion_method = arena_read(&self.classes).get(instance.class).and_then(|descriptor| {
                    descriptor
                        .companion
                        .as_ref()
                        .and_then(|companion| find_overload(&companion.methods, name, args.len()))
                });
                if let Some(fun) = companion_method {
                    return self.call_user(&fun, args, Some(recv.clone()), &[], line);
                }
            }
            if let Some(result) = self.data_class_method(instance, name, &args, line) {
                return result;
            }
        }

        // 2. companion members, enum statics, and builders via the class name
        if let Value::Class(class) = &recv {
            if let Some(result) = self.class_static_method(class, name, &args, line) {
                return result;
            }
        }

        // 3. extension functions (same-arity shadowing of builtins)
        let chain = self.type_chain(&recv);
        if let Some(fun) = self.find_extension_fun(&chain, name, args.len()) {
            return self.call_user(&fun, args, Some(recv.clone()), &[], line);
        }

        // 4. built-in method tables
        if let Some(result) = crate::builtins::dispatch_method(self, &recv, name, &args, line) {
            return result;
        }

        // 5. host-object methods; real host classes (fqn-shaped names) are
        // policy-gated, runtime-internal externals (builders, SAM wrappers,
        // the Java namespace) are not
        if let Value::External(object) = &recv {
            if object.type_name().contains('.') {
                self.policy
                    .check_method(object.type_name(), name)
                    .map_err(Signal::raise)?;
            }
            let object = Arc::clone(object);
            let positional: Vec<Value> = args.positional.to_vec();
            if let Some(result) = object.invoke(name, &positional, self) {
                return result;
            }
        }

        // 6. a callable field on the instance
        if let Value::Instance(instance) = &recv
            && let Some(field @ Value::Function(_)) = instance.get_field(name)
        {
            return self.call_value(field, args, line);
        }

        // 7. an in-scope lambda called with `this = recv` (receiver-lambda)
        if let Some(env) = env
            && let Some(candidate @ Value::Function(_)) = env.get_opt(name)
        {
            return self.call_lambda_with_this(candidate, recv, args, line);
        }

        let mut err = NovaError::method_not_found(&recv.type_name(), name);
        err.capture_frames(self.call_stack.snapshot());
        Err(Signal::raise(err))
    }

    /// componentN/copy/equals/hashCode/toString on `@data` classes.
    fn data_class_method(
        &mut self,
        instance: &Arc<Instance>,
        name: &str,
        args: &CallArgs,
        line: u32,
    ) -> Option<EvalResult<Value>> {
        if !instance.is_data {
            return None;
        }
        let fields = instance.field_snapshot();
        if let Some(index) = name.strip_prefix("component")
            && let Ok(index) = index.parse::<usize>()
            && index >= 1
        {
            return Some(match fields.get(index - 1) {
                Some((_, value)) => Ok(value.clone()),
                None => Err(Signal::raise(NovaError::syntax(
                    line,
                    1,
                    format!("{} has no component{index}", instance.class_name),
                ))),
            });
        }
        match name {
            "copy" => {
                let copy = Instance::new(
                    instance.class,
                    Arc::clone(&instance.class_name),
                    InstanceKind::Regular,
                    true,
                );
                for (index, (field, value)) in fields.iter().enumerate() {
                    let overridden = args
                        .named
                        .iter()
                        .find(|(n, _)| n == field)
                        .map(|(_, v)| v.clone())
                        .or_else(|| args.positional.get(index).cloned());
                    copy.set_field(field, overridden.unwrap_or_else(|| value.clone()));
                }
                Some(Ok(Value::Instance(copy)))
            }
            "equals" => {
                let other = args.positional.first().cloned().unwrap_or(Value::Null);
                let this = Value::Instance(Arc::clone(instance));
                Some(self.values_equal(&this, &other).map(Value::Bool))
            }
            "hashCode" => {
                let mut hasher = std::collections::hash_map::DefaultHasher::new();
                for (_, value) in &fields {
                    value.hash(&mut hasher);
                }
                Some(Ok(Value::Int(hasher.finish() as i32)))
            }
            "toString" => Some(Ok(Value::from_string(instance.default_display(0)))),
            _ => None,
        }
    }

    /// Statics reachable via the class name: enum `values`/`valueOf`,
    /// companion methods, and `@builder`'s `builder()`.
    fn class_static_method(
        &mut self,
        class: &ClassRef,
        name: &str,
        args: &CallArgs,
        line: u32,
    ) -> Option<EvalResult<Value>> {
        let descriptor = arena_read(&self.classes).get(class.id)?;
        if descriptor.kind == ClassKind::Enum {
            match name {
                "values" => {
                    return Some(self.enum_entries(class.id).map(Value::list));
                }
                "valueOf" => {
                    let wanted = match args.positional.first() {
                        Some(Value::Str(s)) => s.to_string(),
                        other => other.map(|v| v.display()).unwrap_or_default(),
                    };
                    let entries = match self.enum_entries(class.id) {
                        Ok(entries) => entries,
                        Err(err) => return Some(Err(err)),
                    };
                    let found = entries.into_iter().find(|entry| {
                        matches!(entry, Value::Instance(e) if e.get_field("name")
                            .is_some_and(|n| matches!(n, Value::Str(s) if s.as_ref() == wanted)))
                    });
                    return Some(found.ok_or_else(|| {
                        Signal::raise(NovaError::new(
                            ErrorKind::NoSuchEnumEntry,
                            format!("No such enum entry: {}.{wanted}", class.name),
                        ))
                    }));
                }
                _ => {}
            }
        }
        if name == "builder" && descriptor.has_builder() {
            return Some(Ok(Value::External(Arc::new(BuilderObject::new(class.clone())))));
        }
        if let Some(companion) = &descriptor.companion
            && let Some(fun) = find_overload(&companion.methods, name, args.len())
        {
            let companion_instance = match self.companion_instance(class.id) {
                Ok(value) => value,
                Err(err) => return Some(Err(err)),
            };
            let args = args.clone();
            return Some(self.call_user(&fun, args, Some(companion_instance), &[], line));
        }
        None
    }

    /// Member read with the full property ladder.
    #[expect(clippy::too_many_arguments, reason = "call sites carry full MIR context")]
    pub(crate) fn eval_member(
        &mut self,
        recv: &Expr,
        name: &str,
        safe: bool,
        on_super: bool,
        env: &Env,
        file: &Arc<str>,
        line: u32,
    ) -> EvalResult<Value> {
        let receiver = self.eval_expr(recv, env, file)?;
        if safe && receiver.is_null() {
            return Ok(Value::Null);
        }
        if on_super {
            // only methods can be reached through super
            return self.invoke_super_method(&receiver, name, CallArgs::empty(), line);
        }
        self.member_value(receiver, name, line)
    }

    /// `recv.name` read: fields, synthetic properties, bound methods,
    /// extension properties, bean-style host access.
    pub(crate) fn member_value(&mut self, recv: Value, name: &str, line: u32) -> EvalResult<Value> {
        match &recv {
            Value::Instance(instance) => {
                if let Some(value) = instance.get_field(name) {
                    self.check_field_visibility(instance, name).map_err(Signal::raise)?;
                    return Ok(value);
                }
                // a method referenced without calling it binds the receiver
                let resolved = {
                    let arena = arena_read(&self.classes);
                    arena
                        .get(instance.class)
                        .and_then(|descriptor| descriptor.methods.get(name).and_then(|o| o.first().cloned()))
                        .or_else(|| arena.resolve_method(instance.class, name, 0).map(|(f, _)| f))
                };
                if let Some(fun) = resolved {
                    return Ok(Value::Function(Arc::new(FunctionValue::Bound {
                        receiver: recv.clone(),
                        function: Arc::new(FunctionValue::User(fun)),
                    })));
                }
            }
            Value::Class(class) => {
                if let Some(value) = self.class_member(class, name, line)? {
                    return Ok(value);
                }
            }
            Value::Pair(pair) => match name {
                "first" => return Ok(pair.first.clone()),
                "second" => return Ok(pair.second.clone()),
                _ => {}
            },
            Value::Range(range) => match name {
                "start" => return Ok(Value::from_i64(range.start)),
                "end" => return Ok(Value::from_i64(range.end)),
                "inclusive" => return Ok(Value::Bool(range.inclusive)),
                _ => {}
            },
            Value::Str(s) => {
                if name == "length" {
                    return Ok(Value::Int(s.chars().count() as i32));
                }
            }
            Value::List(list) => {
                if name == "size" {
                    return Ok(Value::Int(list.len() as i32));
                }
            }
            Value::Array(array) => {
                if name == "size" {
                    return Ok(Value::Int(array.len() as i32));
                }
            }
            Value::Map(map) => {
                if name == "size" {
                    return Ok(Value::Int(map.len() as i32));
                }
            }
            Value::Task(task) => {
                if name == "isCancelled" {
                    return Ok(Value::Bool(task.is_cancelled()));
                }
            }
            Value::Future(future) => {
                if name == "isCancelled" {
                    return Ok(Value::Bool(future.is_cancelled()));
                }
            }
            Value::External(object) => {
                let object = Arc::clone(object);
                return crate::host::external_get_member(&object, name, self);
            }
            _ => {}
        }

        // extension properties
        let chain = self.type_chain(&recv);
        if let Some(fun) = self.find_extension_prop(&chain, name) {
            return self.call_user(&fun, CallArgs::empty(), Some(recv.clone()), &[], line);
        }

        let mut err = NovaError::field_not_found(&recv.type_name(), name);
        err.capture_frames(self.call_stack.snapshot());
        Err(Signal::raise(err))
    }

    /// Member reads on a class value: enum entries, companion fields and
    /// bound companion methods.
    fn class_member(&mut self, class: &ClassRef, name: &str, _line: u32) -> EvalResult<Option<Value>> {
        let descriptor = match arena_read(&self.classes).get(class.id) {
            Some(descriptor) => descriptor,
            None => return Ok(None),
        };
        if descriptor.kind == ClassKind::Enum {
            let entries = self.enum_entries(class.id)?;
            let found = entries.into_iter().find(|entry| {
                matches!(entry, Value::Instance(e) if e.get_field("name")
                    .is_some_and(|n| matches!(n, Value::Str(s) if s.as_ref() == name)))
            });
            if let Some(entry) = found {
                return Ok(Some(entry));
            }
        }
        if descriptor.companion.is_some() {
            let companion = self.companion_instance(class.id)?;
            if let Value::Instance(companion_instance) = &companion {
                if let Some(value) = companion_instance.get_field(name) {
                    return Ok(Some(value));
                }
            }
            let bound = descriptor
                .companion
                .as_ref()
                .and_then(|c| c.methods.get(name).and_then(|o| o.first().cloned()));
            if let Some(fun) = bound {
                return Ok(Some(Value::Function(Arc::new(FunctionValue::Bound {
                    receiver: companion,
                    function: Arc::new(FunctionValue::User(fun)),
                }))));
            }
        }
        Ok(None)
    }

    /// Member write.
    pub(crate) fn set_member(&mut self, recv: Value, name: &str, value: Value, line: u32) -> EvalResult<()> {
        match &recv {
            Value::Instance(instance) => {
                if instance.has_field(name) {
                    self.check_field_visibility(instance, name).map_err(Signal::raise)?;
                    let mutable = arena_read(&self.classes)
                        .get(instance.class)
                        .and_then(|descriptor| descriptor.field_mutable(name));
                    if mutable == Some(false) {
                        return Err(Signal::raise(NovaError::type_error(format!(
                            "Cannot reassign val '{name}'"
                        ))));
                    }
                    instance.set_field(name, value);
                    Ok(())
                } else {
                    Err(Signal::raise(NovaError::field_not_found(&instance.class_name, name)))
                }
            }
            Value::External(object) => {
                let object = Arc::clone(object);
                crate::host::external_set_member(&object, name, value, self)
            }
            Value::Class(class) => {
                let has_companion = arena_read(&self.classes)
                    .get(class.id)
                    .is_some_and(|d| d.companion.is_some());
                if has_companion {
                    let companion = self.companion_instance(class.id)?;
                    if let Value::Instance(companion_instance) = companion {
                        companion_instance.set_field(name, value);
                        return Ok(());
                    }
                }
                Err(Signal::raise(NovaError::field_not_found(&class.name, name)))
            }
            other => {
                let _ = line;
                Err(Signal::raise(NovaError::type_error(format!(
                    "cannot assign member '{name}' on {}",
                    other.type_name()
                ))))
            }
        }
    }

    fn check_field_visibility(&self, instance: &Arc<Instance>, name: &str) -> Result<(), NovaError> {
        let (visibility, owner) = {
            let arena = arena_read(&self.classes);
            let mut current = Some(instance.class);
            let mut found = None;
            while let Some(id) = current {
                let Some(descriptor) = arena.get(id) else { break };
                if let Some(visibility) = descriptor.field_visibility(name) {
                    found = Some((visibility, id));
                    break;
                }
                current = descriptor.superclass;
            }
            match found {
                Some(found) => found,
                // dynamically-created fields (enum name/ordinal, builders)
                None => return Ok(()),
            }
        };
        self.check_visibility(visibility, owner, name)
    }

    /// `Type::name`, `::name`, `Type::class` references.
    pub(crate) fn eval_method_ref(
        &mut self,
        qualifier: Option<&str>,
        name: &str,
        env: &Env,
        line: u32,
    ) -> EvalResult<Value> {
        match qualifier {
            None => self.eval_ident(name, env, line),
            Some(q) => {
                if name == "class" {
                    let resolved = self.resolve_type_name(q, env);
                    let found = arena_read(&self.classes).lookup(&resolved);
                    if let Some(id) = found {
                        return self.class_value(id);
                    }
                    return Ok(Value::from_string(resolved));
                }
                let found = arena_read(&self.classes).lookup(q);
                if let Some(id) = found {
                    // constructor reference: `Type::new`
                    if name == "new" {
                        let class = arena_read(&self.classes)
                            .get(id)
                            .map(|d| d.class_ref())
                            .ok_or_else(|| Signal::raise(NovaError::undefined_variable(q)))?;
                        return Ok(Value::Function(Arc::new(FunctionValue::CtorRef { class })));
                    }
                }
                Ok(Value::Function(Arc::new(FunctionValue::MethodRef {
                    name: name.to_owned(),
                })))
            }
        }
    }

    /// Receiver type names checked for extension dispatch, most specific
    /// first, ending with `Any`.
    pub(crate) fn type_chain(&self, recv: &Value) -> Vec<String> {
        let mut chain = vec![recv.type_name().into_owned()];
        if let Value::Instance(instance) = recv {
            let arena = arena_read(&self.classes);
            let mut current = arena.get(instance.class).and_then(|d| d.superclass);
            while let Some(id) = current {
                let Some(descriptor) = arena.get(id) else { break };
                chain.push(descriptor.name.to_string());
                current = descriptor.superclass;
            }
            let mut stack = vec![instance.class];
            while let Some(id) = stack.pop() {
                let Some(descriptor) = arena.get(id) else { continue };
                for interface in &descriptor.interfaces {
                    if let Some(iface) = arena.get(*interface) {
                        chain.push(iface.name.to_string());
                        stack.push(*interface);
                    }
                }
            }
        }
        if matches!(recv, Value::Int(_) | Value::Long(_) | Value::Float(_) | Value::Double(_)) {
            chain.push("Number".to_owned());
        }
        chain.push("Any".to_owned());
        chain
    }
}

fn find_overload(
    methods: &ahash::AHashMap<String, Vec<Arc<UserFunction>>>,
    name: &str,
    arity: usize,
) -> Option<Arc<UserFunction>> {
    let overloads = methods.get(name)?;
    overloads
        .iter()
        .find(|f| f.arity() == arity)
        .or_else(|| {
            overloads
                .iter()
                .find(|f| arity >= f.required_arity() && arity <= f.arity())
        })
        .cloned()
}
