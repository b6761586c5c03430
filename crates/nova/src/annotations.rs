//! Annotation processors.
//!
//! Processors are callbacks keyed by annotation name, invoked once per
//! annotated class at declaration time. The registry is copy-on-write: child
//! interpreters snapshot it at fork, so a processor registered later in the
//! parent never appears mid-flight in a child.
//!
//! Two processors ship built in: `@data` (componentN/copy/equals/hashCode/
//! toString synthesis) and `@builder` (a fluent companion builder).

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::Ordering,
};

use ahash::AHashMap;
use indexmap::IndexMap;

use crate::{
    class::{ClassRef, arena_read},
    error::{EvalResult, RunResult, Signal},
    host::HostObject,
    interp::Interpreter,
    types::CallArgs,
    value::Value,
};

/// Callback invoked with `(class, annotation_args)` when a class declaration
/// carrying the annotation is evaluated.
pub type ProcessorFn = Arc<dyn Fn(&mut Interpreter, &ClassRef, &IndexMap<String, Value>) -> RunResult<()> + Send + Sync>;

/// Immutable processor table; cloned wholesale on registration.
pub type ProcessorTable = Arc<AHashMap<String, ProcessorFn>>;

/// The built-in `@data` and `@builder` processors.
#[must_use]
pub fn default_processors() -> ProcessorTable {
    let mut table: AHashMap<String, ProcessorFn> = AHashMap::new();
    table.insert(
        "data".to_owned(),
        Arc::new(|interp: &mut Interpreter, class: &ClassRef, _args: &IndexMap<String, Value>| {
            if let Some(descriptor) = arena_read(interp.classes()).get(class.id) {
                descriptor.data.store(true, Ordering::Relaxed);
            }
            Ok(())
        }),
    );
    table.insert(
        "builder".to_owned(),
        Arc::new(|interp: &mut Interpreter, class: &ClassRef, _args: &IndexMap<String, Value>| {
            if let Some(descriptor) = arena_read(interp.classes()).get(class.id) {
                descriptor.builder.store(true, Ordering::Relaxed);
            }
            Ok(())
        }),
    );
    Arc::new(table)
}

/// The fluent builder produced by `Companion.builder()` on `@builder`
/// classes: every unknown method is a setter for the field of that name, and
/// `build()` instantiates the class with the collected values as named
/// arguments.
#[derive(Debug)]
pub struct BuilderObject {
    pub class: ClassRef,
    values: Arc<Mutex<IndexMap<String, Value>>>,
}

impl BuilderObject {
    #[must_use]
    pub fn new(class: ClassRef) -> Self {
        Self {
            class,
            values: Arc::new(Mutex::new(IndexMap::new())),
        }
    }

    fn share(&self) -> Self {
        Self {
            class: self.class.clone(),
            values: Arc::clone(&self.values),
        }
    }
}

impl HostObject for BuilderObject {
    fn type_name(&self) -> &str {
        "Builder"
    }

    fn to_display(&self) -> String {
        format!("<{} builder>", self.class.name)
    }

    fn invoke(&self, method: &str, args: &[Value], interp: &mut Interpreter) -> Option<EvalResult<Value>> {
        if method == "build" {
            let named: Vec<(String, Value)> = self
                .values
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let args = CallArgs {
                positional: smallvec::SmallVec::new(),
                named,
                type_args: Vec::new(),
            };
            return Some(interp.instantiate_class(self.class.id, args, 0));
        }
        let Some(value) = args.first() else {
            return Some(Err(Signal::raise(crate::error::NovaError::type_error(format!(
                "builder setter '{method}' expects one argument"
            )))));
        };
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(method.to_owned(), value.clone());
        Some(Ok(Value::External(Arc::new(self.share()))))
    }
}
