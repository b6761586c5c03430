//! Call machinery: argument evaluation, every callable flavour, parameter
//! binding, and the self-tail-call loop.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::{
    class::ClassRef,
    env::Env,
    error::{ErrorKind, EvalResult, NovaError, Signal},
    frame::CallFrame,
    interp::Interpreter,
    mir::{CallArg, Expr, FunDef, LambdaDef, Param, Pattern},
    types::{CallArgs, FunctionValue, UserFunction},
    value::Value,
};

/// Cap on the rendered parameter summary stored per frame.
const PARAM_SUMMARY_LIMIT: usize = 48;

impl Interpreter {
    pub(crate) fn make_function(
        &mut self,
        def: &FunDef,
        env: &Env,
        file: &Arc<str>,
        declared_class: Option<ClassRef>,
    ) -> Arc<UserFunction> {
        Arc::new(UserFunction {
            name: def.name.clone(),
            params: def.params.clone(),
            body: Arc::new(def.body.clone()),
            captured: env.clone(),
            receiver_type: def.receiver.clone(),
            declared_class,
            visibility: def.visibility,
            is_lambda: false,
            type_params: def.type_params.clone(),
            source_file: Arc::clone(file),
            line: def.line,
            column: def.column,
        })
    }

    pub(crate) fn make_lambda(&mut self, def: &LambdaDef, env: &Env, file: &Arc<str>) -> Arc<UserFunction> {
        Arc::new(UserFunction {
            name: "<lambda>".to_owned(),
            params: def.params.clone(),
            body: Arc::new(def.body.clone()),
            captured: env.clone(),
            receiver_type: None,
            declared_class: None,
            visibility: crate::types::Visibility::Public,
            is_lambda: true,
            type_params: Vec::new(),
            source_file: Arc::clone(file),
            line: def.line,
            column: def.column,
        })
    }

    /// Evaluates call arguments left-to-right, expanding spreads.
    ///
    /// Returns the args plus the hole mask for partial application.
    pub(crate) fn eval_args(
        &mut self,
        args: &[CallArg],
        env: &Env,
        file: &Arc<str>,
    ) -> EvalResult<(CallArgs, Vec<bool>)> {
        let mut out = CallArgs::empty();
        let mut holes = Vec::new();
        for arg in args {
            if arg.hole {
                out.positional.push(Value::Null);
                holes.push(true);
                continue;
            }
            let value = self.eval_expr(&arg.value, env, file)?;
            if arg.spread {
                for item in self.spread_values(value)? {
                    out.positional.push(item);
                    holes.push(false);
                }
            } else if let Some(name) = &arg.name {
                out.named.push((name.clone(), value));
            } else {
                out.positional.push(value);
                holes.push(false);
            }
        }
        Ok((out, holes))
    }

    #[expect(clippy::too_many_arguments, reason = "call sites carry full MIR context")]
    pub(crate) fn eval_call(
        &mut self,
        callee: &Expr,
        type_args: &[String],
        args: &[CallArg],
        tail: bool,
        env: &Env,
        file: &Arc<str>,
        line: u32,
    ) -> EvalResult<Value> {
        // Resolve the callee. A bare name that fails lexical lookup may be a
        // method on the implicit `this`.
        let resolved = match callee {
            Expr::Ident(name, ident_line) => match self.eval_ident(name, env, *ident_line) {
                Ok(value) => Ok(value),
                Err(Signal::Raise(err)) if err.kind == ErrorKind::UndefinedVariable => {
                    if let Some(this @ Value::Instance(_)) = env.get_opt("this") {
                        let (call_args, holes) = self.eval_args(args, env, file)?;
                        if holes.iter().any(|h| *h) {
                            return Err(Signal::raise(NovaError::type_error(
                                "partial application is not supported on implicit method calls",
                            )));
                        }
                        return self.invoke_method(this, name, call_args, line);
                    }
                    Err(Signal::Raise(err))
                }
                Err(other) => Err(other),
            },
            other => self.eval_expr(other, env, file),
        }?;

        // Self-tail-call: rebind the current frame instead of recursing.
        if tail
            && let Value::Function(f) = &resolved
            && let FunctionValue::User(fun) = f.as_ref()
            && self.fn_stack.last().is_some_and(|current| Arc::ptr_eq(current, fun))
            && args.iter().all(|a| a.name.is_none() && !a.spread && !a.hole)
            && args.len() == fun.params.len()
        {
            let mut values: SmallVec<[Value; 4]> = SmallVec::with_capacity(args.len());
            for arg in args {
                values.push(self.eval_expr(&arg.value, env, file)?);
            }
            return Err(Signal::TailCall(values));
        }

        let (mut call_args, holes) = self.eval_args(args, env, file)?;
        call_args.type_args = type_args.to_vec();

        // `f(10, _)` builds a partial application
        if holes.iter().any(|h| *h) {
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

        self.call_value_typed(resolved, call_args, type_args, line)
    }

    /// Calls any callable value.
    pub(crate) fn call_value(&mut self, callee: Value, args: CallArgs, line: u32) -> EvalResult<Value> {
        self.call_value_typed(callee, args, &[], line)
    }

    pub(crate) fn call_value_typed(
        &mut self,
        callee: Value,
        mut args: CallArgs,
        type_args: &[String],
        line: u32,
    ) -> EvalResult<Value> {
        if !type_args.is_empty() {
            args.type_args = type_args.to_vec();
        }
        match callee {
            Value::Function(f) => self.call_function_value(&f, args, type_args, line),
            Value::Class(class) => self.instantiate_class(class.id, args, line),
            Value::External(object) => {
                let positional: Vec<Value> = args.positional.to_vec();
                match object.call(&positional, self) {
                    Some(result) => result,
                    None => Err(Signal::raise(NovaError::not_callable(&object.type_name().to_owned()))),
                }
            }
            Value::Instance(_) => self.invoke_method(callee, "invoke", args, line),
            other => Err(Signal::raise(NovaError::not_callable(&other.type_name()))),
        }
    }

    pub(crate) fn call_function_value(
        &mut self,
        f: &Arc<FunctionValue>,
        mut args: CallArgs,
        type_args: &[String],
        line: u32,
    ) -> EvalResult<Value> {
        match f.as_ref() {
            FunctionValue::User(fun) => {
                let type_args: Vec<String> = if type_args.is_empty() {
                    args.type_args.clone()
                } else {
                    type_args.to_vec()
                };
                self.call_user(fun, args, None, &type_args, line)
            }
            FunctionValue::Native(native) => {
                if let Some(arity) = native.arity
                    && args.positional.len() != arity
                {
                    return Err(Signal::raise(NovaError::type_error(format!(
                        "{}() expects {arity} argument(s), got {}",
                        native.name,
                        args.positional.len()
                    ))));
                }
                let implementation = Arc::clone(&native.f);
                implementation(self, args)
            }
            FunctionValue::Bound { receiver, function } => match function.as_ref() {
                FunctionValue::User(fun) => self.call_user(fun, args, Some(receiver.clone()), type_args, line),
                _ => {
                    args.prepend(receiver.clone());
                    self.call_function_value(function, args, type_args, line)
                }
            },
            FunctionValue::Partial { target, bound } => {
                let mut filled = CallArgs::empty();
                let mut supplied = args.positional.into_iter();
                for slot in bound {
                    match slot {
                        Some(value) => filled.positional.push(value.clone()),
                        None => match supplied.next() {
                            Some(value) => filled.positional.push(value),
                            None => {
                                return Err(Signal::raise(NovaError::type_error(
                                    "not enough arguments for partial application",
                                )));
                            }
                        },
                    }
                }
                filled.positional.extend(supplied);
                filled.named = args.named;
                self.call_function_value(&Arc::clone(target), filled, type_args, line)
            }
            FunctionValue::MethodRef { name } => {
                if args.positional.is_empty() {
                    return Err(Signal::raise(NovaError::type_error(format!(
                        "method reference ::{name} needs a receiver argument"
                    ))));
                }
                let receiver = args.positional.remove(0);
                self.invoke_method(receiver, name, args, line)
            }
            FunctionValue::CtorRef { class } => self.instantiate_class(class.id, args, line),
        }
    }

    /// Calls a user function, method, or lambda; the heart of the call path.
    ///
    /// Pushes one frame, binds parameters, and loops on `TailCall` signals,
    /// rebinding instead of recursing so self-recursion runs in constant
    /// stack space.
    pub(crate) fn call_user(
        &mut self,
        fun: &Arc<UserFunction>,
        args: CallArgs,
        this: Option<Value>,
        type_args: &[String],
        line: u32,
    ) -> EvalResult<Value> {
        self.tracker
            .check_recursion_depth(self.call_stack.len())
            .map_err(|err| {
                let mut err = NovaError::from(err);
                err.capture_frames(self.call_stack.snapshot());
                Signal::raise(err)
            })?;

        let mut frame = CallFrame::new(fun.name.clone(), Arc::clone(&fun.source_file), line, fun.column);
        frame.param_summary = summarize_params(&fun.params, &args);
        self.call_stack.push(frame);
        self.fn_stack.push(Arc::clone(fun));
        if let Some(class) = &fun.declared_class {
            self.class_context.push(class.id);
        }
        let depth = self.call_stack.len();
        self.trace(|t| t.on_call(&fun.name, depth));

        let mut current_args = args;
        let result = loop {
            let env = fun.captured.child();
            if let Some(this_value) = &this {
                let _ = env.define_val("this", this_value.clone(), true);
            }
            for (param, actual) in fun.type_params.iter().zip(type_args.iter()) {
                let _ = env.define_val(&format!("$type:{param}"), Value::from_str_slice(actual), true);
            }
            if let Err(err) = self.bind_call_params(&fun.name, &fun.params, current_args, &env, fun.is_lambda) {
                break Err(err);
            }

            match self.eval_block_in(&fun.body, &env, &fun.source_file) {
                Err(Signal::TailCall(values)) => {
                    if let Some(frame) = self.call_stack.peek_mut() {
                        frame.tail_hits = frame.tail_hits.saturating_add(1);
                        let hits = frame.tail_hits;
                        if hits == crate::frame::TAIL_REPORT_THRESHOLD {
                            self.trace(|t| t.on_tail_call(&fun.name, hits));
                        }
                    }
                    current_args = CallArgs::positional(values);
                }
                Err(Signal::Return(value)) => break Ok(value),
                Err(Signal::Break | Signal::Continue) => {
                    break Err(Signal::raise(NovaError::new(
                        ErrorKind::Syntax,
                        "break/continue outside of a loop",
                    )));
                }
                other => break other,
            }
        };

        if fun.declared_class.is_some() {
            self.class_context.pop();
        }
        self.fn_stack.pop();
        self.call_stack.pop();
        let depth = self.call_stack.len();
        self.trace(|t| t.on_return(&fun.name, depth));
        result
    }

    /// Binds declared parameters from positional and named arguments, filling
    /// defaults left-to-right. A parameterless lambda given one argument
    /// receives it as `it`.
    pub(crate) fn bind_call_params(
        &mut self,
        fn_name: &str,
        params: &[Param],
        mut args: CallArgs,
        env: &Env,
        is_lambda: bool,
    ) -> EvalResult<()> {
        if is_lambda && params.is_empty() {
            if args.positional.len() > 1 {
                return Err(Signal::raise(NovaError::type_error(format!(
                    "lambda expects at most 1 argument, got {}",
                    args.positional.len()
                ))));
            }
            if let Some(value) = args.positional.into_iter().next() {
                env.define_val("it", value, true).map_err(Signal::raise)?;
            }
            return Ok(());
        }

        if args.positional.len() > params.len() {
            return Err(Signal::raise(NovaError::type_error(format!(
                "{fn_name}() expects at most {} argument(s), got {}",
                params.len(),
                args.positional.len()
            ))));
        }

        let mut positional = args.positional.drain(..);
        for param in params {
            let supplied = positional.next().or_else(|| match &param.pattern {
                Pattern::Name(name) => {
                    let at = args.named.iter().position(|(n, _)| n == name)?;
                    Some(args.named.remove(at).1)
                }
                Pattern::Tuple(_) => None,
            });
            let value = match supplied {
                Some(value) => value,
                None => match &param.default {
                    Some(default) => {
                        let file: Arc<str> = self
                            .fn_stack
                            .last()
                            .map_or_else(|| Arc::from("<native>"), |f| Arc::clone(&f.source_file));
                        self.eval_expr(default, env, &file)?
                    }
                    None => {
                        return Err(Signal::raise(NovaError::type_error(format!(
                            "{fn_name}(): missing argument for parameter '{}'",
                            pattern_name(&param.pattern)
                        ))));
                    }
                },
            };
            self.bind_pattern(&param.pattern, value, false, env, 0)?;
        }
        drop(positional);

        if let Some((name, _)) = args.named.first() {
            return Err(Signal::raise(NovaError::type_error(format!(
                "{fn_name}(): no parameter named '{name}'"
            ))));
        }
        Ok(())
    }

    /// Calls a lambda with an explicit `this` receiver binding (the
    /// `run`/`apply` scope-function convention and user receiver-lambdas).
    pub(crate) fn call_lambda_with_this(
        &mut self,
        callee: Value,
        this: Value,
        args: CallArgs,
        line: u32,
    ) -> EvalResult<Value> {
        match callee {
            Value::Function(f) => match f.as_ref() {
                FunctionValue::User(fun) => self.call_user(fun, args, Some(this), &[], line),
                _ => self.call_function_value(&f, args, &[], line),
            },
            other => Err(Signal::raise(NovaError::not_callable(&other.type_name()))),
        }
    }
}

fn pattern_name(pattern: &Pattern) -> String {
    match pattern {
        Pattern::Name(name) => name.clone(),
        Pattern::Tuple(names) => {
            let rendered: Vec<&str> = names
                .iter()
                .map(|n| n.as_deref().unwrap_or("_"))
                .collect();
            format!("({})", rendered.join(", "))
        }
    }
}

/// Renders `name=value` pairs for the frame's parameter summary, truncated.
fn summarize_params(params: &[Param], args: &CallArgs) -> String {
    let mut out = String::new();
    for (param, value) in params.iter().zip(args.positional.iter()) {
        if !out.is_empty() {
            out.push_str(", ");
        }
        out.push_str(&pattern_name(&param.pattern));
        out.push('=');
        let rendered = value.display();
        if rendered.chars().count() > PARAM_SUMMARY_LIMIT {
            out.extend(rendered.chars().take(PARAM_SUMMARY_LIMIT));
            out.push('…');
        } else {
            out.push_str(&rendered);
        }
        if out.len() > PARAM_SUMMARY_LIMIT * 2 {
            out.push('…');
            break;
        }
    }
    out
}
