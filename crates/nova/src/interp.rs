//! The public `Interpreter`: construction, configuration, and the
//! `eval`/`eval_repl`/`precompile_to_mir`/`execute_mir` entry points.
//!
//! One `Interpreter` is one logical execution context with its own call
//! stack. Child interpreters (created per scheduled block and async task)
//! share the globals, policy, scheduler, class arena, extension registry,
//! and host registry of their parent, snapshot the annotation-processor
//! table, and inherit the parent's stdio sinks and execution tracker.

use std::sync::{
    Arc, Mutex, PoisonError, RwLock,
    atomic::{AtomicU64, Ordering},
};

use ahash::AHashMap;

use crate::{
    annotations::{ProcessorFn, ProcessorTable, default_processors},
    builtins,
    class::{ClassId, SharedArena},
    env::Env,
    error::{ErrorKind, EvalResult, NovaError, RunResult, Signal},
    frame::CallStack,
    host::{HostClass, HostRegistry, SharedRegistry},
    io::{
        EmptyInput, InputSource, OutputSink, SharedInput, SharedSink, StdErrSink, StdSink, shared_input, shared_sink,
    },
    mir::{self, Mir},
    parser,
    policy::SecurityPolicy,
    resource::{Budgets, ExecutionTracker},
    scheduler::Scheduler,
    tracer::{EvalTracer, NoopTracer},
    types::{CallArgs, NativeFunction, UserFunction, Visibility},
    value::Value,
};

/// Registered extension functions and properties, keyed by receiver type
/// name. Functions are additionally keyed by arity so an extension shadows a
/// built-in only at the same arity and overloads at others.
#[derive(Debug, Default)]
pub(crate) struct ExtensionRegistry {
    pub funs: AHashMap<(String, String, usize), Arc<UserFunction>>,
    pub props: AHashMap<(String, String), Arc<UserFunction>>,
}

/// The Nova runtime entry point.
pub struct Interpreter {
    pub(crate) globals: Env,
    pub(crate) policy: Arc<SecurityPolicy>,
    pub(crate) scheduler: Option<Arc<dyn Scheduler>>,
    pub(crate) classes: SharedArena,
    pub(crate) extensions: Arc<RwLock<ExtensionRegistry>>,
    pub(crate) processors: ProcessorTable,
    pub(crate) host_classes: SharedRegistry,
    pub(crate) stdout: SharedSink,
    pub(crate) stderr: SharedSink,
    pub(crate) stdin: SharedInput,
    pub(crate) tracer: Arc<Mutex<dyn EvalTracer + Send>>,
    pub(crate) repl_mode: bool,
    pub(crate) call_stack: CallStack,
    pub(crate) tracker: Arc<ExecutionTracker>,
    /// Source of compilation-unit IDs (one per eval), shared in the family.
    pub(crate) unit_counter: Arc<AtomicU64>,
    /// The unit the currently-running eval belongs to; sealed subclassing is
    /// confined to it in batch mode.
    pub(crate) current_unit: u64,
    /// Class whose method bodies are currently executing (visibility checks).
    pub(crate) class_context: Vec<ClassId>,
    /// User functions currently on the Rust call path (self-tail-call
    /// detection compares against the innermost entry).
    pub(crate) fn_stack: Vec<Arc<UserFunction>>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// A fresh interpreter with the unrestricted policy.
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(SecurityPolicy::unrestricted())
    }

    /// A fresh interpreter enforcing the given policy.
    #[must_use]
    pub fn with_policy(policy: SecurityPolicy) -> Self {
        let mut interp = Self {
            globals: Env::root(),
            policy: Arc::new(policy),
            scheduler: None,
            classes: Arc::new(RwLock::new(crate::class::ClassArena::new())),
            extensions: Arc::new(RwLock::new(ExtensionRegistry::default())),
            processors: default_processors(),
            host_classes: Arc::new(RwLock::new(HostRegistry::with_builtins())),
            stdout: shared_sink(StdSink),
            stderr: shared_sink(StdErrSink),
            stdin: shared_input(EmptyInput),
            tracer: Arc::new(Mutex::new(NoopTracer)),
            repl_mode: false,
            call_stack: CallStack::new(),
            tracker: Arc::new(ExecutionTracker::new(Budgets::unlimited())),
            unit_counter: Arc::new(AtomicU64::new(0)),
            current_unit: 0,
            class_context: Vec::new(),
            fn_stack: Vec::new(),
        };
        builtins::install(&mut interp);
        interp
    }

    /// A child interpreter for one scheduled block or async task.
    ///
    /// Shares globals, policy, scheduler, class arena, extensions, and host
    /// registry; snapshots the annotation-processor table; owns its call
    /// stack. The execution tracker is inherited so loop budgets span the
    /// whole outermost eval.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            globals: self.globals.clone(),
            policy: Arc::clone(&self.policy),
            scheduler: self.scheduler.clone(),
            classes: Arc::clone(&self.classes),
            extensions: Arc::clone(&self.extensions),
            processors: Arc::clone(&self.processors),
            host_classes: Arc::clone(&self.host_classes),
            stdout: Arc::clone(&self.stdout),
            stderr: Arc::clone(&self.stderr),
            stdin: Arc::clone(&self.stdin),
            tracer: Arc::clone(&self.tracer),
            repl_mode: self.repl_mode,
            call_stack: CallStack::new(),
            tracker: Arc::clone(&self.tracker),
            unit_counter: Arc::clone(&self.unit_counter),
            current_unit: self.current_unit,
            class_context: Vec::new(),
            fn_stack: Vec::new(),
        }
    }

    // --- configuration ---

    /// REPL mode permits redefinition of user bindings.
    pub fn set_repl_mode(&mut self, repl: bool) {
        self.repl_mode = repl;
    }

    pub fn set_stdout(&mut self, sink: impl OutputSink + Send + 'static) {
        self.stdout = shared_sink(sink);
    }

    /// Replaces stdout with an already-shared sink (lets the embedder keep a
    /// handle for inspection).
    pub fn set_stdout_shared(&mut self, sink: SharedSink) {
        self.stdout = sink;
    }

    pub fn set_stderr(&mut self, sink: impl OutputSink + Send + 'static) {
        self.stderr = shared_sink(sink);
    }

    pub fn set_stdin(&mut self, input: impl InputSource + Send + 'static) {
        self.stdin = shared_input(input);
    }

    pub fn set_scheduler(&mut self, scheduler: Arc<dyn Scheduler>) {
        self.scheduler = Some(scheduler);
    }

    pub fn set_tracer(&mut self, tracer: impl EvalTracer + Send + 'static) {
        self.tracer = Arc::new(Mutex::new(tracer));
    }

    /// Registers an annotation processor under `name`.
    ///
    /// The table is copy-on-write; running children keep their snapshot.
    pub fn register_annotation_processor(&mut self, name: impl Into<String>, processor: ProcessorFn) {
        let mut table = (*self.processors).clone();
        table.insert(name.into(), processor);
        self.processors = Arc::new(table);
    }

    /// Binds a native function as a global.
    pub fn register_native(
        &mut self,
        name: &str,
        arity: Option<usize>,
        f: impl Fn(&mut Self, CallArgs) -> RunResult<Value> + Send + Sync + 'static,
    ) {
        let native = NativeFunction::new(name, arity, move |interp: &mut Self, args: CallArgs| {
            f(interp, args).map_err(Signal::raise)
        });
        self.globals.redefine(
            name,
            Value::Function(Arc::new(crate::types::FunctionValue::Native(native))),
        );
    }

    /// Registers a host class with the interop bridge.
    pub fn register_host_class(&mut self, class: Arc<dyn HostClass>) {
        self.host_classes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(class);
    }

    /// The global environment.
    #[must_use]
    pub fn globals(&self) -> &Env {
        &self.globals
    }

    #[must_use]
    pub fn policy(&self) -> &SecurityPolicy {
        &self.policy
    }

    pub(crate) fn classes(&self) -> &SharedArena {
        &self.classes
    }

    pub(crate) fn host_registry(&self) -> &SharedRegistry {
        &self.host_classes
    }

    // --- execution ---

    /// Parses and runs top-level source; the result is the value of the last
    /// expression statement.
    pub fn eval(&mut self, source: &str) -> Result<Value, NovaError> {
        self.eval_named(source, "<script>")
    }

    /// Like [`Self::eval`] with an explicit file name for stack traces.
    pub fn eval_named(&mut self, source: &str, filename: &str) -> Result<Value, NovaError> {
        let mir = self.precompile_to_mir_named(source, filename)?;
        self.execute_mir(&mir)
    }

    /// Evaluates one REPL line: bare expressions are permitted, declarations
    /// land in the global environment, and redefinition is allowed.
    pub fn eval_repl(&mut self, source: &str) -> Result<Value, NovaError> {
        let was_repl = self.repl_mode;
        self.repl_mode = true;
        let result = self.eval_named(source, "<repl>");
        self.repl_mode = was_repl;
        result
    }

    /// Parses and lowers without executing.
    pub fn precompile_to_mir(&self, source: &str) -> Result<Mir, NovaError> {
        self.precompile_to_mir_named(source, "<script>")
    }

    fn precompile_to_mir_named(&self, source: &str, filename: &str) -> Result<Mir, NovaError> {
        let program = parser::parse(source)?;
        Ok(mir::lower(&program, filename))
    }

    /// Executes a lowered program. Budgets and the wall clock restart here:
    /// this is the outermost-eval boundary.
    pub fn execute_mir(&mut self, mir: &Mir) -> Result<Value, NovaError> {
        self.tracker = Arc::new(ExecutionTracker::new(self.policy.budgets));
        self.current_unit = self.unit_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let file: Arc<str> = Arc::from(mir.file.as_str());
        let env = self.globals.clone();
        let mut last = Value::Unit;
        for stmt in &mir.stmts {
            match self.exec_stmt(stmt, &env, &file) {
                Ok(value) => last = value,
                Err(Signal::Return(value)) => return Ok(value),
                Err(Signal::Raise(err)) => {
                    let mut err = *err;
                    err.capture_frames(self.call_stack.snapshot());
                    self.call_stack.clear();
                    return Err(err);
                }
                Err(Signal::Break | Signal::Continue) => {
                    self.call_stack.clear();
                    return Err(NovaError::new(
                        ErrorKind::Syntax,
                        "break/continue outside of a loop",
                    ));
                }
                Err(Signal::TailCall(_)) => {
                    self.call_stack.clear();
                    return Err(NovaError::type_error("tail call outside of a function body"));
                }
            }
        }
        Ok(last)
    }

    /// Calls a Nova callable from host code.
    pub fn call_function(&mut self, callee: Value, args: Vec<Value>) -> Result<Value, NovaError> {
        match self.call_value(callee, CallArgs::positional(args), 0) {
            Ok(value) => Ok(value),
            Err(Signal::Return(value)) => Ok(value),
            Err(Signal::Raise(err)) => {
                let mut err = *err;
                err.capture_frames(self.call_stack.snapshot());
                Err(err)
            }
            Err(other) => Err(NovaError::type_error(format!(
                "unexpected {} escaping a host call",
                other.describe()
            ))),
        }
    }

    // --- shared helpers used across the evaluator ---

    pub(crate) fn trace(&self, f: impl FnOnce(&mut dyn EvalTracer)) {
        let mut tracer = self.tracer.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *tracer);
    }

    /// Looks up an extension function for the given receiver type chain.
    pub(crate) fn find_extension_fun(&self, type_names: &[String], name: &str, arity: usize) -> Option<Arc<UserFunction>> {
        let registry = self.extensions.read().unwrap_or_else(PoisonError::into_inner);
        for type_name in type_names {
            if let Some(found) = registry.funs.get(&(type_name.clone(), name.to_owned(), arity)) {
                return Some(Arc::clone(found));
            }
        }
        None
    }

    /// Looks up an extension property for the given receiver type chain.
    pub(crate) fn find_extension_prop(&self, type_names: &[String], name: &str) -> Option<Arc<UserFunction>> {
        let registry = self.extensions.read().unwrap_or_else(PoisonError::into_inner);
        for type_name in type_names {
            if let Some(found) = registry.props.get(&(type_name.clone(), name.to_owned())) {
                return Some(Arc::clone(found));
            }
        }
        None
    }

    pub(crate) fn register_extension_fun(&self, fun: Arc<UserFunction>) {
        if let Some(receiver) = fun.receiver_type.clone() {
            self.extensions
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .funs
                .insert((receiver, fun.name.clone(), fun.arity()), fun);
        }
    }

    pub(crate) fn register_extension_prop(&self, receiver: String, name: String, fun: Arc<UserFunction>) {
        self.extensions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .props
            .insert((receiver, name), fun);
    }

    /// Checks member visibility against the current class context.
    pub(crate) fn check_visibility(
        &self,
        visibility: Visibility,
        owner: ClassId,
        member: &str,
    ) -> Result<(), NovaError> {
        let allowed = match visibility {
            Visibility::Public => true,
            Visibility::Private => self.class_context.iter().any(|ctx| *ctx == owner),
            Visibility::Protected => self
                .class_context
                .iter()
                .any(|ctx| crate::class::arena_read(&self.classes).is_subtype(*ctx, owner)),
        };
        if allowed {
            Ok(())
        } else {
            Err(NovaError::new(
                ErrorKind::VisibilityError,
                format!("'{member}' is not accessible here"),
            ))
        }
    }
}
