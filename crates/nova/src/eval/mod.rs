//! The evaluator: dispatch over lowered MIR nodes.
//!
//! Split across focused submodules, all extending [`Interpreter`]:
//! statements and control flow here, operator dispatch in [`ops`], call
//! machinery and tail-call elimination in [`call`], method resolution in
//! [`methods`], and the class/object/enum runtime in [`classes`].

mod call;
mod classes;
mod methods;
mod ops;

use std::sync::Arc;

use crate::{
    class::arena_read,
    env::Env,
    error::{ErrorKind, EvalResult, NovaError, Signal},
    host::registry_lookup,
    interp::Interpreter,
    mir::{Block, Catch, Expr, InterpPart, Pattern, Stmt, WhenTest},
    types::{FunctionValue, UserFunction, Visibility},
    value::Value,
};

impl Interpreter {
    pub(crate) fn exec_stmt(&mut self, stmt: &Stmt, env: &Env, file: &Arc<str>) -> EvalResult<Value> {
        match stmt {
            Stmt::Expr(expr) => self.eval_expr(expr, env, file),
            Stmt::Bind {
                pattern,
                init,
                mutable,
                line,
            } => {
                let value = self.eval_expr(init, env, file)?;
                self.bind_pattern(pattern, value, *mutable, env, *line)?;
                Ok(Value::Unit)
            }
            Stmt::Assign { target, op, value, line } => {
                let value = self.eval_expr(value, env, file)?;
                self.assign_target(target, *op, value, env, file, *line)?;
                Ok(Value::Unit)
            }
            Stmt::NullAssign { target, value, line } => {
                let current = self.read_target(target, env, file, *line)?;
                if current.is_null() {
                    let value = self.eval_expr(value, env, file)?;
                    self.assign_target(target, None, value, env, file, *line)?;
                }
                Ok(Value::Unit)
            }
            Stmt::While { cond, body, .. } => {
                loop {
                    self.tracker.on_loop_iteration().map_err(NovaError::from)?;
                    if !self.eval_expr(cond, env, file)?.truthy() {
                        break;
                    }
                    match self.eval_block(body, env, file) {
                        Ok(_) => {}
                        Err(Signal::Break) => break,
                        Err(Signal::Continue) => {}
                        Err(other) => return Err(other),
                    }
                }
                Ok(Value::Unit)
            }
            Stmt::For {
                pattern,
                iter,
                body,
                line,
            } => {
                let iterable = self.eval_expr(iter, env, file)?;
                let items = self.iterable_values(&iterable, *line)?;
                for item in items {
                    self.tracker.on_loop_iteration().map_err(NovaError::from)?;
                    let scope = env.child();
                    self.bind_pattern(pattern, item, false, &scope, *line)?;
                    match self.eval_block_in(body, &scope, file) {
                        Ok(_) => {}
                        Err(Signal::Break) => break,
                        Err(Signal::Continue) => {}
                        Err(other) => return Err(other),
                    }
                }
                Ok(Value::Unit)
            }
            Stmt::Fun(def) => {
                if def.receiver.is_some() {
                    let fun = self.make_function(def, env, file, None);
                    self.register_extension_fun(fun);
                } else {
                    let fun = self.make_function(def, env, file, None);
                    let name = def.name.clone();
                    env.redefine(&name, Value::Function(Arc::new(FunctionValue::User(fun))));
                }
                Ok(Value::Unit)
            }
            Stmt::Class(def) => {
                self.declare_class(def, env, file)?;
                Ok(Value::Unit)
            }
            Stmt::ExtProp {
                receiver,
                name,
                body,
                line,
            } => {
                let fun = Arc::new(UserFunction {
                    name: name.clone(),
                    params: Vec::new(),
                    body: Arc::new(Block {
                        stmts: vec![Stmt::Expr(body.clone())],
                    }),
                    captured: env.clone(),
                    receiver_type: Some(receiver.clone()),
                    declared_class: None,
                    visibility: Visibility::Public,
                    is_lambda: false,
                    type_params: Vec::new(),
                    source_file: Arc::clone(file),
                    line: *line,
                    column: 1,
                });
                self.register_extension_prop(receiver.clone(), name.clone(), fun);
                Ok(Value::Unit)
            }
            Stmt::GuardLet {
                name,
                init,
                else_body,
                line,
            } => {
                let value = self.eval_expr(init, env, file)?;
                if value.is_null() {
                    self.eval_block(else_body, env, file)?;
                    return Err(Signal::raise(NovaError::syntax(
                        *line,
                        1,
                        "the else branch of 'guard let' must exit (return, throw, break, or continue)",
                    )));
                }
                env.define_val(name, value, self.repl_mode).map_err(Signal::raise)?;
                Ok(Value::Unit)
            }
        }
    }

    /// Evaluates a block in a fresh child scope; the value is the last
    /// expression statement's value, or `Unit`.
    pub(crate) fn eval_block(&mut self, block: &Block, env: &Env, file: &Arc<str>) -> EvalResult<Value> {
        let scope = env.child();
        self.eval_block_in(block, &scope, file)
    }

    /// Evaluates a block directly in `env` (used where the caller already
    /// created the scope, e.g. function bodies with bound parameters).
    pub(crate) fn eval_block_in(&mut self, block: &Block, env: &Env, file: &Arc<str>) -> EvalResult<Value> {
        let mut last = Value::Unit;
        for stmt in &block.stmts {
            last = self.exec_stmt(stmt, env, file)?;
            if !matches!(stmt, Stmt::Expr(_)) {
                last = Value::Unit;
            }
        }
        Ok(last)
    }

    #[expect(clippy::too_many_lines, reason = "single dispatch over every MIR expression")]
    pub(crate) fn eval_expr(&mut self, expr: &Expr, env: &Env, file: &Arc<str>) -> EvalResult<Value> {
        match expr {
            Expr::Null => Ok(Value::Null),
            Expr::Bool(v) => Ok(Value::Bool(*v)),
            Expr::Int(v) => Ok(Value::Int(*v)),
            Expr::Long(v) => Ok(Value::Long(*v)),
            Expr::Float(v) => Ok(Value::Float(*v)),
            Expr::Double(v) => Ok(Value::Double(*v)),
            Expr::Char(v) => Ok(Value::Char(*v)),
            Expr::Str(s) => Ok(Value::from_str_slice(s)),
            Expr::Interp(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        InterpPart::Lit(text) => out.push_str(text),
                        InterpPart::Expr(e) => {
                            let value = self.eval_expr(e, env, file)?;
                            out.push_str(&self.display_value(&value)?);
                        }
                    }
                }
                Ok(Value::from_string(out))
            }
            Expr::ListLit(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    let value = self.eval_expr(&item.value, env, file)?;
                    if item.spread {
                        values.extend(self.spread_values(value)?);
                    } else {
                        values.push(value);
                    }
                }
                Ok(Value::list(values))
            }
            Expr::MapLit(entries) => {
                let mut map = indexmap::IndexMap::new();
                for (key, value) in entries {
                    let key = self.eval_expr(key, env, file)?;
                    let value = self.eval_expr(value, env, file)?;
                    map.insert(key, value);
                }
                Ok(Value::map(map))
            }
            Expr::Range {
                start,
                end,
                inclusive,
                line,
            } => {
                let start = self.require_integral(start, env, file, *line)?;
                let end = self.require_integral(end, env, file, *line)?;
                Ok(Value::Range(crate::types::RangeValue::new(start, end, *inclusive)))
            }
            Expr::Ident(name, line) => self.eval_ident(name, env, *line),
            Expr::This(line) => env
                .get_opt("this")
                .ok_or_else(|| Signal::raise(NovaError::syntax(*line, 1, "'this' is not available here"))),
            Expr::Binary { op, lhs, rhs, line } => {
                let lhs = self.eval_expr(lhs, env, file)?;
                let rhs = self.eval_expr(rhs, env, file)?;
                self.binary_op(*op, lhs, rhs, *line)
            }
            Expr::Logic { and, lhs, rhs } => {
                let lhs = self.eval_expr(lhs, env, file)?;
                if *and {
                    if !lhs.truthy() {
                        return Ok(Value::Bool(false));
                    }
                    let rhs = self.eval_expr(rhs, env, file)?;
                    Ok(Value::Bool(rhs.truthy()))
                } else {
                    if lhs.truthy() {
                        return Ok(Value::Bool(true));
                    }
                    let rhs = self.eval_expr(rhs, env, file)?;
                    Ok(Value::Bool(rhs.truthy()))
                }
            }
            Expr::Unary { op, expr, line } => {
                let value = self.eval_expr(expr, env, file)?;
                self.unary_op(*op, value, *line)
            }
            Expr::IncDec {
                inc,
                prefix,
                target,
                line,
            } => self.eval_inc_dec(*inc, *prefix, target, env, file, *line),
            Expr::Call {
                callee,
                type_args,
                args,
                tail,
                line,
            } => self.eval_call(callee, type_args, args, *tail, env, file, *line),
            Expr::MethodCall {
                recv,
                name,
                type_args,
                args,
                safe,
                on_super,
                line,
            } => self.eval_method_call(recv, name, type_args, args, *safe, *on_super, env, file, *line),
            Expr::Member {
                recv,
                name,
                safe,
                on_super,
                line,
            } => self.eval_member(recv, name, *safe, *on_super, env, file, *line),
            Expr::Index { recv, index, safe, line } => {
                let receiver = self.eval_expr(recv, env, file)?;
                if *safe && receiver.is_null() {
                    return Ok(Value::Null);
                }
                let index = self.eval_expr(index, env, file)?;
                self.index_get(receiver, index, *line)
            }
            Expr::Lambda(def) => Ok(Value::Function(Arc::new(FunctionValue::User(
                self.make_lambda(def, env, file),
            )))),
            Expr::If { cond, then, els } => {
                if self.eval_expr(cond, env, file)?.truthy() {
                    self.eval_block(then, env, file)
                } else if let Some(els) = els {
                    self.eval_block(els, env, file)
                } else {
                    Ok(Value::Unit)
                }
            }
            Expr::When {
                binding,
                subject,
                arms,
                els,
                line,
            } => self.eval_when(binding.as_deref(), subject.as_deref(), arms, els.as_ref(), env, file, *line),
            Expr::Try {
                body,
                catches,
                finally,
            } => self.eval_try(body, catches, finally.as_ref(), env, file),
            Expr::Throw { value, line } => {
                let payload = self.eval_expr(value, env, file)?;
                let message = match &payload {
                    Value::Str(s) => s.to_string(),
                    other => other.display(),
                };
                let err = NovaError::new(ErrorKind::UserThrown, message).with_payload(payload);
                self.trace(|t| t.on_throw(ErrorKind::UserThrown, &err.message));
                let mut err = err;
                err.capture_frames(self.call_stack.snapshot());
                let _ = line;
                Err(Signal::raise(err))
            }
            Expr::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr, env, file)?,
                    None => Value::Unit,
                };
                Err(Signal::Return(value))
            }
            Expr::Break { .. } => Err(Signal::Break),
            Expr::Continue { .. } => Err(Signal::Continue),
            Expr::Ternary { cond, then, els } => {
                if self.eval_expr(cond, env, file)?.truthy() {
                    self.eval_expr(then, env, file)
                } else {
                    self.eval_expr(els, env, file)
                }
            }
            Expr::Elvis { lhs, rhs } => {
                let value = self.eval_expr(lhs, env, file)?;
                if value.is_null() {
                    self.eval_expr(rhs, env, file)
                } else {
                    Ok(value)
                }
            }
            Expr::Propagate { expr, .. } => {
                let value = self.eval_expr(expr, env, file)?;
                match value {
                    Value::Null => Err(Signal::Return(Value::Null)),
                    Value::Result(result) => match result.as_ref() {
                        crate::types::ResultValue::Ok(inner) => Ok(inner.clone()),
                        crate::types::ResultValue::Err(_) => Err(Signal::Return(Value::Result(result))),
                    },
                    other => Ok(other),
                }
            }
            Expr::Is { expr, ty, negated } => {
                let value = self.eval_expr(expr, env, file)?;
                let matches = self.type_matches(&value, ty, env);
                Ok(Value::Bool(matches != *negated))
            }
            Expr::Cast { expr, ty, safe, line } => {
                let value = self.eval_expr(expr, env, file)?;
                self.eval_cast(value, ty, *safe, env, *line)
            }
            Expr::InOp {
                item,
                collection,
                negated,
                line,
            } => {
                let item = self.eval_expr(item, env, file)?;
                let collection = self.eval_expr(collection, env, file)?;
                let contained = self.contains(&collection, &item, *line)?;
                Ok(Value::Bool(contained != *negated))
            }
            Expr::MethodRef { qualifier, name, line } => self.eval_method_ref(qualifier.as_deref(), name, env, *line),
            Expr::Scope { stmts, value } => {
                let scope = env.child();
                for stmt in stmts {
                    self.exec_stmt(stmt, &scope, file)?;
                }
                self.eval_expr(value, &scope, file)
            }
        }
    }

    /// Identifier resolution: lexical scope, then implicit `this` members,
    /// then declared classes, then the `java.lang` auto-import. Builtins
    /// live in the global environment, so the auto-import can never shadow
    /// them.
    pub(crate) fn eval_ident(&mut self, name: &str, env: &Env, line: u32) -> EvalResult<Value> {
        if let Some(value) = env.get_opt(name) {
            return Ok(value);
        }
        if let Some(Value::Instance(this)) = env.get_opt("this")
            && let Some(value) = this.get_field(name)
        {
            return Ok(value);
        }
        let found = arena_read(&self.classes).lookup(name);
        if let Some(id) = found {
            return self.class_value(id);
        }
        if self.policy.allow_host_interop {
            let fqn = format!("java.lang.{name}");
            if self.policy.is_class_allowed(&fqn)
                && let Some(class) = registry_lookup(&self.host_classes, &fqn)
            {
                return Ok(Value::External(Arc::new(crate::host::ClassHandle { class })));
            }
        }
        let mut err = NovaError::undefined_variable(name);
        err.capture_frames(self.call_stack.snapshot());
        let _ = line;
        Err(Signal::raise(err))
    }

    fn eval_when(
        &mut self,
        binding: Option<&str>,
        subject: Option<&Expr>,
        arms: &[crate::mir::WhenArm],
        els: Option<&Block>,
        env: &Env,
        file: &Arc<str>,
        line: u32,
    ) -> EvalResult<Value> {
        let scope = env.child();
        let subject_value = match subject {
            Some(expr) => {
                let value = self.eval_expr(expr, env, file)?;
                if let Some(name) = binding {
                    scope.define_val(name, value.clone(), true).map_err(Signal::raise)?;
                }
                Some(value)
            }
            None => None,
        };
        for arm in arms {
            for test in &arm.tests {
                let matched = match (test, &subject_value) {
                    (WhenTest::Expr(e), Some(subject)) => {
                        let candidate = self.eval_expr(e, &scope, file)?;
                        self.values_equal(subject, &candidate)?
                    }
                    (WhenTest::Expr(e), None) => self.eval_expr(e, &scope, file)?.truthy(),
                    (WhenTest::In(e), Some(subject)) => {
                        let collection = self.eval_expr(e, &scope, file)?;
                        self.contains(&collection, subject, line)?
                    }
                    (WhenTest::NotIn(e), Some(subject)) => {
                        let collection = self.eval_expr(e, &scope, file)?;
                        !self.contains(&collection, subject, line)?
                    }
                    (WhenTest::Is(ty), Some(subject)) => self.type_matches(subject, ty, &scope),
                    (WhenTest::NotIs(ty), Some(subject)) => !self.type_matches(subject, ty, &scope),
                    (WhenTest::In(_) | WhenTest::NotIn(_) | WhenTest::Is(_) | WhenTest::NotIs(_), None) => {
                        return Err(Signal::raise(NovaError::syntax(
                            line,
                            1,
                            "'in' and 'is' arms require a when subject",
                        )));
                    }
                };
                if matched {
                    return self.eval_block(&arm.body, &scope, file);
                }
            }
        }
        match els {
            Some(block) => self.eval_block(block, &scope, file),
            None => Ok(Value::Unit),
        }
    }

    fn eval_try(
        &mut self,
        body: &Block,
        catches: &[Catch],
        finally: Option<&Block>,
        env: &Env,
        file: &Arc<str>,
    ) -> EvalResult<Value> {
        let mut outcome = self.eval_block(body, env, file);

        let catch_index = match &outcome {
            Err(Signal::Raise(err)) if err.kind.is_catchable() => {
                catches.iter().position(|catch| catch_matches(self, catch, err))
            }
            _ => None,
        };
        if let Some(index) = catch_index {
            let Err(Signal::Raise(err)) = outcome else { unreachable!() };
            let catch = &catches[index];
            let bound = err.payload.clone().unwrap_or_else(|| Value::from_str_slice(&err.message));
            let scope = env.child();
            scope.define_val(&catch.name, bound, true).map_err(Signal::raise)?;
            outcome = self.eval_block_in(&catch.body, &scope, file);
        }

        if let Some(finally) = finally {
            match self.eval_block(finally, env, file) {
                Ok(_) => {}
                // a signal from finally supersedes the in-flight outcome
                Err(signal) => outcome = Err(signal),
            }
        }
        outcome
    }

    /// Values an iterable produces, snapshotted for stable traversal.
    pub(crate) fn iterable_values(&mut self, value: &Value, line: u32) -> EvalResult<Vec<Value>> {
        match value {
            Value::List(list) => Ok(list.snapshot()),
            Value::Array(array) => Ok(array.snapshot()),
            Value::Range(range) => Ok(range.to_values()),
            Value::Str(s) => Ok(s.chars().map(Value::Char).collect()),
            Value::Map(map) => Ok(map
                .snapshot()
                .into_iter()
                .map(|(k, v)| Value::pair(k, v))
                .collect()),
            other => Err(Signal::raise(NovaError::syntax(
                line,
                1,
                format!("value of type {} is not iterable", other.type_name()),
            ))),
        }
    }

    /// Unpacks a `*spread` argument.
    pub(crate) fn spread_values(&mut self, value: Value) -> EvalResult<Vec<Value>> {
        match value {
            Value::List(list) => Ok(list.snapshot()),
            Value::Array(array) => Ok(array.snapshot()),
            Value::Range(range) => Ok(range.to_values()),
            other => Err(Signal::raise(NovaError::type_error(format!(
                "spread requires a List, got {}",
                other.type_name()
            )))),
        }
    }

    /// Binds a `val`/`var`/`for`/lambda pattern, destructuring tuples via
    /// list elements or `componentN()`.
    pub(crate) fn bind_pattern(
        &mut self,
        pattern: &Pattern,
        value: Value,
        mutable: bool,
        env: &Env,
        line: u32,
    ) -> EvalResult<()> {
        match pattern {
            Pattern::Name(name) => {
                let result = if mutable {
                    env.define_var(name, value, self.repl_mode)
                } else {
                    env.define_val(name, value, self.repl_mode)
                };
                result.map_err(Signal::raise)
            }
            Pattern::Tuple(names) => {
                let components = self.destructure(&value, names.len(), line)?;
                for (slot, component) in names.iter().zip(components) {
                    if let Some(name) = slot {
                        let result = if mutable {
                            env.define_var(name, component, self.repl_mode)
                        } else {
                            env.define_val(name, component, self.repl_mode)
                        };
                        result.map_err(Signal::raise)?;
                    }
                }
                Ok(())
            }
        }
    }

    /// Produces exactly `count` destructuring components.
    pub(crate) fn destructure(&mut self, value: &Value, count: usize, line: u32) -> EvalResult<Vec<Value>> {
        match value {
            Value::List(list) => {
                let items = list.snapshot();
                if items.len() < count {
                    return Err(Signal::raise(NovaError::syntax(
                        line,
                        1,
                        format!("cannot destructure {} elements into {count} bindings", items.len()),
                    )));
                }
                Ok(items.into_iter().take(count).collect())
            }
            Value::Pair(pair) => {
                if count > 2 {
                    return Err(Signal::raise(NovaError::syntax(
                        line,
                        1,
                        format!("cannot destructure a Pair into {count} bindings"),
                    )));
                }
                Ok([pair.first.clone(), pair.second.clone()].into_iter().take(count).collect())
            }
            Value::Instance(_) => {
                let mut components = Vec::with_capacity(count);
                for index in 1..=count {
                    let method = format!("component{index}");
                    let result = self.invoke_method(value.clone(), &method, crate::types::CallArgs::empty(), line)?;
                    components.push(result);
                }
                Ok(components)
            }
            other => Err(Signal::raise(NovaError::type_error(format!(
                "cannot destructure a {}",
                other.type_name()
            )))),
        }
    }

    fn require_integral(&mut self, expr: &Expr, env: &Env, file: &Arc<str>, line: u32) -> EvalResult<i64> {
        let value = self.eval_expr(expr, env, file)?;
        if value.is_integral() {
            value.as_long().map_err(Signal::raise)
        } else {
            Err(Signal::raise(NovaError::syntax(
                line,
                1,
                format!("range bounds must be integers, got {}", value.type_name()),
            )))
        }
    }

    /// The canonical string form, routing through a user `toString` for
    /// instances that define one.
    pub(crate) fn display_value(&mut self, value: &Value) -> EvalResult<String> {
        if let Value::Instance(instance) = value {
            let descriptor = arena_read(&self.classes).get(instance.class);
            if let Some(descriptor) = descriptor
                && descriptor.find_own_method("toString", 0).is_some()
            {
                let result = self.invoke_method(value.clone(), "toString", crate::types::CallArgs::empty(), 0)?;
                return Ok(result.display());
            }
        }
        Ok(value.display())
    }
}

/// Whether a catch clause matches the in-flight error.
fn catch_matches(interp: &Interpreter, catch: &Catch, err: &NovaError) -> bool {
    let Some(ty) = &catch.ty else { return true };
    if ty == "Exception" || ty == "Throwable" || ty == "Error" {
        return true;
    }
    // an exact error-kind name, e.g. `catch (e: DivisionByZero)`
    if err.kind.to_string() == *ty {
        return true;
    }
    // a thrown user-class payload matched by class or superclass
    if let Some(Value::Instance(instance)) = &err.payload {
        let arena = arena_read(&interp.classes);
        if let Some(target) = arena.lookup(ty) {
            return arena.is_subtype(instance.class, target);
        }
    }
    false
}
