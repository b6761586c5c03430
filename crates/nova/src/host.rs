//! Host-interop bridge.
//!
//! Host types are registered under fully-qualified names and reached from
//! script code through `Java.type`/`Java.static`/`Java.field`/`Java.new`
//! (or `javaClass`), gated by the active [`crate::policy::SecurityPolicy`].
//! A built-in host library registers `java.lang`/`java.util` basics so the
//! bridge is observable out of the box; embedders add their own classes with
//! [`HostRegistry::register`].
//!
//! Method arguments resolve by name with conversion in the order
//! exact → numeric widening → boxing; the `want_*` helpers implement that
//! ladder for host-library implementations.

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError, RwLock},
    time::{SystemTime, UNIX_EPOCH},
};

use ahash::AHashMap;
use indexmap::IndexMap;

use crate::{
    error::{ErrorKind, EvalResult, NovaError, RunResult, Signal},
    interp::Interpreter,
    types::CallArgs,
    value::Value,
};

/// An opaque host-provided object proxied into script code.
///
/// `invoke`/`call` return `None` when the member does not exist, letting the
/// bridge fall through to the next resolution step.
pub trait HostObject: Send + Sync + fmt::Debug {
    /// Fully-qualified type name reported to scripts.
    fn type_name(&self) -> &str;

    /// Display form used by string conversion.
    fn to_display(&self) -> String {
        format!("<{}>", self.type_name())
    }

    /// Direct field read (after bean-style accessors were tried).
    fn get_field(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Direct field write; `Ok(false)` means no such field.
    fn set_field(&self, _name: &str, _value: Value) -> RunResult<bool> {
        Ok(false)
    }

    /// Instance method invocation; `None` means no such method.
    fn invoke(&self, method: &str, args: &[Value], interp: &mut Interpreter) -> Option<EvalResult<Value>>;

    /// The invocation operator `obj(args)`; class handles construct here.
    fn call(&self, _args: &[Value], _interp: &mut Interpreter) -> Option<EvalResult<Value>> {
        None
    }
}

/// A host class: constructors, statics, and (for interfaces) the SAM hook.
pub trait HostClass: Send + Sync + fmt::Debug {
    fn fqn(&self) -> &str;

    /// Best-matching constructor; the default is not constructible.
    fn construct(&self, _args: &[Value], _interp: &mut Interpreter) -> EvalResult<Value> {
        Err(Signal::raise(NovaError::new(
            ErrorKind::HostError,
            format!("{} has no accessible constructor", self.fqn()),
        )))
    }

    /// Static method invocation; `None` means no such method.
    fn invoke_static(&self, method: &str, args: &[Value], interp: &mut Interpreter) -> Option<EvalResult<Value>>;

    /// Static field read.
    fn static_field(&self, _name: &str) -> Option<Value> {
        None
    }

    /// The single abstract method name when this is a SAM interface.
    fn sam_method(&self) -> Option<&str> {
        None
    }
}

/// Registry of host classes keyed by fully-qualified name.
#[derive(Debug, Default)]
pub struct HostRegistry {
    classes: AHashMap<String, Arc<dyn HostClass>>,
}

impl HostRegistry {
    /// Creates a registry pre-populated with the built-in host library.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::default();
        registry.register(Arc::new(MathClass));
        registry.register(Arc::new(SystemClass));
        registry.register(Arc::new(IntegerClass));
        registry.register(Arc::new(StringClass));
        registry.register(Arc::new(StringBuilderClass));
        registry.register(Arc::new(RuntimeClass));
        registry.register(Arc::new(ArrayListClass));
        registry.register(Arc::new(HashMapClass));
        registry.register(Arc::new(SamInterface::new("java.lang.Runnable", "run")));
        registry.register(Arc::new(SamInterface::new("java.util.function.Function", "apply")));
        registry.register(Arc::new(SamInterface::new("java.util.function.Supplier", "get")));
        registry.register(Arc::new(SamInterface::new("java.util.Comparator", "compare")));
        registry
    }

    pub fn register(&mut self, class: Arc<dyn HostClass>) {
        self.classes.insert(class.fqn().to_owned(), class);
    }

    #[must_use]
    pub fn lookup(&self, fqn: &str) -> Option<Arc<dyn HostClass>> {
        self.classes.get(fqn).cloned()
    }
}

/// Shared registry handle.
pub type SharedRegistry = Arc<RwLock<HostRegistry>>;

pub(crate) fn registry_lookup(registry: &SharedRegistry, fqn: &str) -> Option<Arc<dyn HostClass>> {
    registry
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .lookup(fqn)
}

/// Error type carried as the `cause` of host-side failures.
#[derive(Debug, Clone)]
pub struct HostException(pub String);

impl fmt::Display for HostException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for HostException {}

/// Builds a `HostError` preserving the host exception as the cause.
pub(crate) fn host_error(fqn: &str, message: impl fmt::Display) -> NovaError {
    let text = format!("{fqn}: {message}");
    NovaError::new(ErrorKind::HostError, text.clone()).with_cause(Arc::new(HostException(text)))
}

// --- argument conversion ladder: exact → widening → boxing ---

pub(crate) fn want_i64(fqn: &str, method: &str, args: &[Value], index: usize) -> RunResult<i64> {
    let value = args
        .get(index)
        .ok_or_else(|| host_error(fqn, format!("{method}: missing argument {index}")))?;
    match value {
        Value::Int(v) => Ok(i64::from(*v)),
        Value::Long(v) => Ok(*v),
        Value::Bool(v) => Ok(i64::from(*v)),
        other => Err(host_error(
            fqn,
            format!("{method}: argument {index} must be an integer, got {}", other.type_name()),
        )),
    }
}

pub(crate) fn want_f64(fqn: &str, method: &str, args: &[Value], index: usize) -> RunResult<f64> {
    let value = args
        .get(index)
        .ok_or_else(|| host_error(fqn, format!("{method}: missing argument {index}")))?;
    match value {
        Value::Int(v) => Ok(f64::from(*v)),
        Value::Long(v) => Ok(*v as f64),
        Value::Float(v) => Ok(f64::from(*v)),
        Value::Double(v) => Ok(*v),
        other => Err(host_error(
            fqn,
            format!("{method}: argument {index} must be numeric, got {}", other.type_name()),
        )),
    }
}

pub(crate) fn want_str(fqn: &str, method: &str, args: &[Value], index: usize) -> RunResult<String> {
    let value = args
        .get(index)
        .ok_or_else(|| host_error(fqn, format!("{method}: missing argument {index}")))?;
    match value {
        Value::Str(s) => Ok(s.to_string()),
        other => Ok(other.display()),
    }
}

// --- bridge-level member access ---

/// Bean-style member read on an external object: `getX()`, then `isX()`,
/// then the direct field.
pub(crate) fn external_get_member(
    object: &Arc<dyn HostObject>,
    name: &str,
    interp: &mut Interpreter,
) -> EvalResult<Value> {
    let capitalised = capitalise(name);
    for accessor in [format!("get{capitalised}"), format!("is{capitalised}")] {
        if let Some(result) = object.invoke(&accessor, &[], interp) {
            return result;
        }
    }
    if let Some(value) = object.get_field(name) {
        return Ok(value);
    }
    Err(Signal::raise(NovaError::field_not_found(object.type_name(), name)))
}

/// Bean-style member write: `setX(v)`, then the direct field.
pub(crate) fn external_set_member(
    object: &Arc<dyn HostObject>,
    name: &str,
    value: Value,
    interp: &mut Interpreter,
) -> EvalResult<()> {
    let setter = format!("set{}", capitalise(name));
    if let Some(result) = object.invoke(&setter, std::slice::from_ref(&value), interp) {
        result?;
        return Ok(());
    }
    if object.set_field(name, value).map_err(Signal::raise)? {
        return Ok(());
    }
    Err(Signal::raise(NovaError::field_not_found(object.type_name(), name)))
}

fn capitalise(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

// --- class handles and SAM wrappers ---

/// The value returned by `Java.type(fqn)`; calling it constructs.
#[derive(Debug)]
pub struct ClassHandle {
    pub class: Arc<dyn HostClass>,
}

impl HostObject for ClassHandle {
    fn type_name(&self) -> &str {
        self.class.fqn()
    }

    fn to_display(&self) -> String {
        format!("<host class {}>", self.class.fqn())
    }

    fn get_field(&self, name: &str) -> Option<Value> {
        self.class.static_field(name)
    }

    fn invoke(&self, method: &str, args: &[Value], interp: &mut Interpreter) -> Option<EvalResult<Value>> {
        if let Err(err) = interp.policy().check_method(self.class.fqn(), method) {
            return Some(Err(Signal::raise(err)));
        }
        self.class.invoke_static(method, args, interp)
    }

    fn call(&self, args: &[Value], interp: &mut Interpreter) -> Option<EvalResult<Value>> {
        Some(self.class.construct(args, interp))
    }
}

/// A lambda wrapped as a single-method host interface via `as`.
#[derive(Debug)]
pub struct SamObject {
    pub fqn: String,
    pub method: String,
    pub lambda: Value,
}

impl HostObject for SamObject {
    fn type_name(&self) -> &str {
        &self.fqn
    }

    fn to_display(&self) -> String {
        format!("<{} lambda>", self.fqn)
    }

    fn invoke(&self, method: &str, args: &[Value], interp: &mut Interpreter) -> Option<EvalResult<Value>> {
        if method == self.method {
            let call_args = CallArgs::positional(args.iter().cloned());
            Some(interp.call_value(self.lambda.clone(), call_args, 0))
        } else {
            None
        }
    }
}

/// The `Java` namespace object bound as a global.
#[derive(Debug)]
pub struct JavaNamespace;

impl HostObject for JavaNamespace {
    fn type_name(&self) -> &str {
        "Java"
    }

    fn invoke(&self, method: &str, args: &[Value], interp: &mut Interpreter) -> Option<EvalResult<Value>> {
        match method {
            "type" => Some(java_type(args, interp)),
            "new" => Some(java_new(args, interp)),
            "static" => Some(java_static(args, interp)),
            "field" => Some(java_field(args, interp)),
            _ => None,
        }
    }
}

fn load_class(fqn: &str, interp: &mut Interpreter) -> EvalResult<Arc<dyn HostClass>> {
    interp.policy().check_class(fqn).map_err(Signal::raise)?;
    registry_lookup(interp.host_registry(), fqn)
        .ok_or_else(|| Signal::raise(NovaError::new(ErrorKind::HostError, format!("host class not found: {fqn}"))))
}

fn java_type(args: &[Value], interp: &mut Interpreter) -> EvalResult<Value> {
    let fqn = want_str("Java", "type", args, 0).map_err(Signal::raise)?;
    let class = load_class(&fqn, interp)?;
    Ok(Value::External(Arc::new(ClassHandle { class })))
}

fn java_new(args: &[Value], interp: &mut Interpreter) -> EvalResult<Value> {
    let fqn = want_str("Java", "new", args, 0).map_err(Signal::raise)?;
    let class = load_class(&fqn, interp)?;
    class.construct(&args[1..], interp)
}

fn java_static(args: &[Value], interp: &mut Interpreter) -> EvalResult<Value> {
    let fqn = want_str("Java", "static", args, 0).map_err(Signal::raise)?;
    let method = want_str("Java", "static", args, 1).map_err(Signal::raise)?;
    let class = load_class(&fqn, interp)?;
    interp.policy().check_method(&fqn, &method).map_err(Signal::raise)?;
    class
        .invoke_static(&method, &args[2..], interp)
        .unwrap_or_else(|| Err(Signal::raise(NovaError::method_not_found(&fqn, &method))))
}

fn java_field(args: &[Value], interp: &mut Interpreter) -> EvalResult<Value> {
    let fqn = want_str("Java", "field", args, 0).map_err(Signal::raise)?;
    let field = want_str("Java", "field", args, 1).map_err(Signal::raise)?;
    let class = load_class(&fqn, interp)?;
    class
        .static_field(&field)
        .ok_or_else(|| Signal::raise(NovaError::field_not_found(&fqn, &field)))
}

// --- built-in host library ---

#[derive(Debug)]
struct MathClass;

impl HostClass for MathClass {
    fn fqn(&self) -> &str {
        "java.lang.Math"
    }

    fn invoke_static(&self, method: &str, args: &[Value], _interp: &mut Interpreter) -> Option<EvalResult<Value>> {
        let fqn = self.fqn();
        let result = match method {
            "sqrt" => want_f64(fqn, method, args, 0).map(|x| Value::Double(x.sqrt())),
            "abs" => match args.first() {
                Some(Value::Int(v)) => Ok(Value::Int(v.wrapping_abs())),
                Some(Value::Long(v)) => Ok(Value::Long(v.wrapping_abs())),
                _ => want_f64(fqn, method, args, 0).map(|x| Value::Double(x.abs())),
            },
            "max" => match (args.first(), args.get(1)) {
                (Some(a), Some(b)) if a.is_integral() && b.is_integral() => {
                    Ok(Value::from_i64(a.as_long().unwrap_or(0).max(b.as_long().unwrap_or(0))))
                }
                _ => {
                    let a = want_f64(fqn, method, args, 0);
                    let b = want_f64(fqn, method, args, 1);
                    a.and_then(|a| b.map(|b| Value::Double(a.max(b))))
                }
            },
            "min" => match (args.first(), args.get(1)) {
                (Some(a), Some(b)) if a.is_integral() && b.is_integral() => {
                    Ok(Value::from_i64(a.as_long().unwrap_or(0).min(b.as_long().unwrap_or(0))))
                }
                _ => {
                    let a = want_f64(fqn, method, args, 0);
                    let b = want_f64(fqn, method, args, 1);
                    a.and_then(|a| b.map(|b| Value::Double(a.min(b))))
                }
            },
            "pow" => {
                let a = want_f64(fqn, method, args, 0);
                let b = want_f64(fqn, method, args, 1);
                a.and_then(|a| b.map(|b| Value::Double(a.powf(b))))
            }
            "floor" => want_f64(fqn, method, args, 0).map(|x| Value::Double(x.floor())),
            "ceil" => want_f64(fqn, method, args, 0).map(|x| Value::Double(x.ceil())),
            "random" => Ok(Value::Double(rand::random::<f64>())),
            _ => return None,
        };
        Some(result.map_err(Signal::raise))
    }

    fn static_field(&self, name: &str) -> Option<Value> {
        match name {
            "PI" => Some(Value::Double(std::f64::consts::PI)),
            "E" => Some(Value::Double(std::f64::consts::E)),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct SystemClass;

impl HostClass for SystemClass {
    fn fqn(&self) -> &str {
        "java.lang.System"
    }

    fn invoke_static(&self, method: &str, args: &[Value], _interp: &mut Interpreter) -> Option<EvalResult<Value>> {
        let result = match method {
            "currentTimeMillis" => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| Value::Long(d.as_millis() as i64))
                .map_err(|e| host_error(self.fqn(), e)),
            "nanoTime" => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| Value::Long(d.as_nanos() as i64))
                .map_err(|e| host_error(self.fqn(), e)),
            "getProperty" => {
                let key = want_str(self.fqn(), method, args, 0);
                key.map(|key| std::env::var(&key).map_or(Value::Null, Value::from_string))
            }
            // exit/load/loadLibrary exist so STANDARD's method denial is
            // observable; the embedded host never actually terminates.
            "exit" | "load" | "loadLibrary" => Err(host_error(
                self.fqn(),
                format!("{method} is not available in the embedded host"),
            )),
            _ => return None,
        };
        Some(result.map_err(Signal::raise))
    }
}

#[derive(Debug)]
struct IntegerClass;

impl HostClass for IntegerClass {
    fn fqn(&self) -> &str {
        "java.lang.Integer"
    }

    fn invoke_static(&self, method: &str, args: &[Value], _interp: &mut Interpreter) -> Option<EvalResult<Value>> {
        let result = match method {
            "parseInt" => want_str(self.fqn(), method, args, 0).and_then(|s| {
                s.trim()
                    .parse::<i32>()
                    .map(Value::Int)
                    .map_err(|e| host_error(self.fqn(), format!("parseInt: {e}")))
            }),
            "toBinaryString" => want_i64(self.fqn(), method, args, 0).map(|v| Value::from_string(format!("{v:b}"))),
            _ => return None,
        };
        Some(result.map_err(Signal::raise))
    }

    fn static_field(&self, name: &str) -> Option<Value> {
        match name {
            "MAX_VALUE" => Some(Value::Int(i32::MAX)),
            "MIN_VALUE" => Some(Value::Int(i32::MIN)),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct StringClass;

impl HostClass for StringClass {
    fn fqn(&self) -> &str {
        "java.lang.String"
    }

    fn construct(&self, args: &[Value], _interp: &mut Interpreter) -> EvalResult<Value> {
        Ok(match args.first() {
            Some(value) => Value::from_string(value.display()),
            None => Value::from_str_slice(""),
        })
    }

    fn invoke_static(&self, method: &str, args: &[Value], _interp: &mut Interpreter) -> Option<EvalResult<Value>> {
        match method {
            "valueOf" => Some(
                want_str(self.fqn(), method, args, 0)
                    .map(Value::from_string)
                    .map_err(Signal::raise),
            ),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct StringBuilderObject {
    buffer: Mutex<String>,
}

impl HostObject for StringBuilderObject {
    fn type_name(&self) -> &str {
        "java.lang.StringBuilder"
    }

    fn to_display(&self) -> String {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn invoke(&self, method: &str, args: &[Value], _interp: &mut Interpreter) -> Option<EvalResult<Value>> {
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        match method {
            "append" => {
                if let Some(value) = args.first() {
                    buffer.push_str(&value.display());
                }
                drop(buffer);
                Some(Ok(Value::Unit))
            }
            "toString" => Some(Ok(Value::from_str_slice(&buffer))),
            "length" => Some(Ok(Value::Int(buffer.chars().count() as i32))),
            "reverse" => {
                let reversed: String = buffer.chars().rev().collect();
                *buffer = reversed;
                drop(buffer);
                Some(Ok(Value::Unit))
            }
            _ => None,
        }
    }
}

#[derive(Debug)]
struct StringBuilderClass;

impl HostClass for StringBuilderClass {
    fn fqn(&self) -> &str {
        "java.lang.StringBuilder"
    }

    fn construct(&self, args: &[Value], _interp: &mut Interpreter) -> EvalResult<Value> {
        let initial = args.first().map(Value::display).unwrap_or_default();
        Ok(Value::External(Arc::new(StringBuilderObject {
            buffer: Mutex::new(initial),
        })))
    }

    fn invoke_static(&self, _method: &str, _args: &[Value], _interp: &mut Interpreter) -> Option<EvalResult<Value>> {
        None
    }
}

#[derive(Debug)]
struct RuntimeObject;

impl HostObject for RuntimeObject {
    fn type_name(&self) -> &str {
        "java.lang.Runtime"
    }

    fn invoke(&self, method: &str, _args: &[Value], _interp: &mut Interpreter) -> Option<EvalResult<Value>> {
        match method {
            "availableProcessors" => Some(Ok(Value::Int(
                std::thread::available_parallelism().map_or(1, |n| n.get() as i32),
            ))),
            "exec" => Some(Err(Signal::raise(host_error(
                self.type_name(),
                "exec is not available in the embedded host",
            )))),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct RuntimeClass;

impl HostClass for RuntimeClass {
    fn fqn(&self) -> &str {
        "java.lang.Runtime"
    }

    fn invoke_static(&self, method: &str, _args: &[Value], _interp: &mut Interpreter) -> Option<EvalResult<Value>> {
        match method {
            "getRuntime" => Some(Ok(Value::External(Arc::new(RuntimeObject)))),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct ArrayListObject {
    items: Mutex<Vec<Value>>,
}

impl HostObject for ArrayListObject {
    fn type_name(&self) -> &str {
        "java.util.ArrayList"
    }

    fn to_display(&self) -> String {
        let items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        let rendered: Vec<String> = items.iter().map(Value::display).collect();
        format!("[{}]", rendered.join(", "))
    }

    fn invoke(&self, method: &str, args: &[Value], _interp: &mut Interpreter) -> Option<EvalResult<Value>> {
        let fqn = self.type_name();
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        let result = match method {
            "add" => {
                items.push(args.first().cloned().unwrap_or(Value::Null));
                Ok(Value::Bool(true))
            }
            "get" => want_i64(fqn, method, args, 0).and_then(|i| {
                usize::try_from(i)
                    .ok()
                    .and_then(|i| items.get(i).cloned())
                    .ok_or_else(|| host_error(fqn, format!("index out of range: {i}")))
            }),
            "set" => want_i64(fqn, method, args, 0).and_then(|i| {
                let value = args.get(1).cloned().unwrap_or(Value::Null);
                match usize::try_from(i).ok().and_then(|i| items.get_mut(i)) {
                    Some(slot) => {
                        let old = std::mem::replace(slot, value);
                        Ok(old)
                    }
                    None => Err(host_error(fqn, format!("index out of range: {i}"))),
                }
            }),
            "remove" => want_i64(fqn, method, args, 0).and_then(|i| {
                match usize::try_from(i).ok().filter(|i| *i < items.len()) {
                    Some(i) => Ok(items.remove(i)),
                    None => Err(host_error(fqn, format!("index out of range: {i}"))),
                }
            }),
            "size" => Ok(Value::Int(items.len() as i32)),
            "isEmpty" => Ok(Value::Bool(items.is_empty())),
            "contains" => Ok(Value::Bool(
                args.first().is_some_and(|needle| items.contains(needle)),
            )),
            "clear" => {
                items.clear();
                Ok(Value::Unit)
            }
            "toString" => {
                let rendered: Vec<String> = items.iter().map(Value::display).collect();
                Ok(Value::from_string(format!("[{}]", rendered.join(", "))))
            }
            _ => return None,
        };
        Some(result.map_err(Signal::raise))
    }
}

#[derive(Debug)]
struct ArrayListClass;

impl HostClass for ArrayListClass {
    fn fqn(&self) -> &str {
        "java.util.ArrayList"
    }

    fn construct(&self, _args: &[Value], _interp: &mut Interpreter) -> EvalResult<Value> {
        Ok(Value::External(Arc::new(ArrayListObject {
            items: Mutex::new(Vec::new()),
        })))
    }

    fn invoke_static(&self, _method: &str, _args: &[Value], _interp: &mut Interpreter) -> Option<EvalResult<Value>> {
        None
    }
}

#[derive(Debug)]
struct HashMapObject {
    entries: Mutex<IndexMap<Value, Value>>,
}

impl HostObject for HashMapObject {
    fn type_name(&self) -> &str {
        "java.util.HashMap"
    }

    fn invoke(&self, method: &str, args: &[Value], _interp: &mut Interpreter) -> Option<EvalResult<Value>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let result = match method {
            "put" => {
                let key = args.first().cloned().unwrap_or(Value::Null);
                let value = args.get(1).cloned().unwrap_or(Value::Null);
                Ok(entries.insert(key, value).unwrap_or(Value::Null))
            }
            "get" => Ok(args
                .first()
                .and_then(|key| entries.get(key).cloned())
                .unwrap_or(Value::Null)),
            "remove" => Ok(args
                .first()
                .and_then(|key| entries.shift_remove(key))
                .unwrap_or(Value::Null)),
            "containsKey" => Ok(Value::Bool(args.first().is_some_and(|key| entries.contains_key(key)))),
            "size" => Ok(Value::Int(entries.len() as i32)),
            "isEmpty" => Ok(Value::Bool(entries.is_empty())),
            _ => return None,
        };
        Some(result)
    }
}

#[derive(Debug)]
struct HashMapClass;

impl HostClass for HashMapClass {
    fn fqn(&self) -> &str {
        "java.util.HashMap"
    }

    fn construct(&self, _args: &[Value], _interp: &mut Interpreter) -> EvalResult<Value> {
        Ok(Value::External(Arc::new(HashMapObject {
            entries: Mutex::new(IndexMap::new()),
        })))
    }

    fn invoke_static(&self, _method: &str, _args: &[Value], _interp: &mut Interpreter) -> Option<EvalResult<Value>> {
        None
    }
}

/// A registered single-abstract-method interface; the SAM conversion target
/// of `lambda as Interface`.
#[derive(Debug)]
pub struct SamInterface {
    fqn: String,
    method: String,
}

impl SamInterface {
    #[must_use]
    pub fn new(fqn: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            fqn: fqn.into(),
            method: method.into(),
        }
    }
}

impl HostClass for SamInterface {
    fn fqn(&self) -> &str {
        &self.fqn
    }

    fn invoke_static(&self, _method: &str, _args: &[Value], _interp: &mut Interpreter) -> Option<EvalResult<Value>> {
        None
    }

    fn sam_method(&self) -> Option<&str> {
        Some(&self.method)
    }
}
