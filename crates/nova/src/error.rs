use std::{fmt, sync::Arc};

use smallvec::SmallVec;
use strum::{Display, EnumString, IntoStaticStr};

use crate::{frame::FrameSnapshot, value::Value};

/// Result type alias for evaluation steps that can raise or redirect control flow.
pub type EvalResult<T> = Result<T, Signal>;

/// Result type alias for operations that can only fail with a runtime error.
pub type RunResult<T> = Result<T, NovaError>;

/// Error kinds recognised by the runtime.
///
/// Uses strum derives for automatic `Display`, `FromStr`, and `Into<&'static str>`
/// implementations; the string form matches the variant name exactly and is what
/// `catch (e: <Kind>)` arms compare against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
pub enum ErrorKind {
    // --- Lookup errors ---
    UndefinedVariable,
    MethodNotFound,
    FieldNotFound,
    KeyNotFound,
    NoSuchEnumEntry,

    // --- Definition errors ---
    AlreadyDefined,
    ConstructorArgMismatch,
    AbstractInstantiation,
    VisibilityError,
    SealedSubclass,

    // --- Type errors ---
    CastError,
    IncomparableOperands,
    NotCallable,
    TypeError,

    // --- Arithmetic errors ---
    DivisionByZero,
    IndexOutOfBounds,

    // --- User-raised errors ---
    /// Raised by `throw x` and the `error(msg)` builtin; the payload is preserved.
    UserThrown,
    AssertionFailed,

    // --- Propagation errors ---
    /// Raised by `Result.Err.unwrap()` and friends.
    UnwrapError,

    // --- Policy errors (uncatchable by user code) ---
    SecurityDenied,
    RecursionLimit,
    LoopLimit,
    Timeout,

    // --- Host interop errors ---
    HostError,

    // --- Front-end and scheduling errors ---
    Syntax,
    NoScheduler,
    SchedulerMisuse,
}

impl ErrorKind {
    /// Whether a user-level `try/catch` may observe this error.
    ///
    /// Policy errors bypass user handlers so a sandboxed script cannot swallow
    /// its own budget enforcement.
    #[must_use]
    pub fn is_catchable(self) -> bool {
        !matches!(
            self,
            Self::SecurityDenied | Self::RecursionLimit | Self::LoopLimit | Self::Timeout
        )
    }
}

/// A structured runtime error: kind, human-readable message, the raw thrown
/// payload (for `throw v`), an optional host-side cause, and the call-stack
/// snapshot captured where the error was raised.
#[derive(Debug, Clone)]
pub struct NovaError {
    pub kind: ErrorKind,
    pub message: String,
    /// The raw thrown value for `UserThrown`, or the error value of a `Result.Err`.
    pub payload: Option<Value>,
    /// Originating host exception, preserved across the interop bridge.
    pub cause: Option<Arc<dyn std::error::Error + Send + Sync>>,
    /// Frames captured at raise time, most recent first.
    pub frames: Vec<FrameSnapshot>,
}

impl NovaError {
    /// Creates an error with the given kind and message, no payload or frames.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            payload: None,
            cause: None,
            frames: Vec::new(),
        }
    }

    /// Attaches a thrown payload value.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Attaches the originating host-side error as the cause.
    #[must_use]
    pub fn with_cause(mut self, cause: Arc<dyn std::error::Error + Send + Sync>) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Records the call-stack snapshot if none has been captured yet.
    ///
    /// The first capture wins: frames are recorded where the error is raised,
    /// and outer propagation must not overwrite them.
    pub fn capture_frames(&mut self, frames: Vec<FrameSnapshot>) {
        if self.frames.is_empty() {
            self.frames = frames;
        }
    }

    // --- Constructors for the common error shapes ---

    pub(crate) fn undefined_variable(name: &str) -> Self {
        Self::new(ErrorKind::UndefinedVariable, format!("Undefined variable '{name}'"))
    }

    pub(crate) fn already_defined(name: &str) -> Self {
        Self::new(ErrorKind::AlreadyDefined, format!("Variable already defined: '{name}'"))
    }

    pub(crate) fn method_not_found(type_name: &str, method: &str) -> Self {
        Self::new(
            ErrorKind::MethodNotFound,
            format!("Method not found: {type_name}.{method}"),
        )
    }

    pub(crate) fn field_not_found(type_name: &str, field: &str) -> Self {
        Self::new(ErrorKind::FieldNotFound, format!("No field '{field}' on {type_name}"))
    }

    pub(crate) fn key_not_found(key: &str) -> Self {
        Self::new(ErrorKind::KeyNotFound, format!("Key not found: {key}"))
    }

    pub(crate) fn index_out_of_bounds(index: i64, size: usize) -> Self {
        Self::new(
            ErrorKind::IndexOutOfBounds,
            format!("Index {index} out of bounds for size {size}"),
        )
    }

    pub(crate) fn division_by_zero() -> Self {
        Self::new(ErrorKind::DivisionByZero, "Division by zero")
    }

    pub(crate) fn not_callable(type_name: &str) -> Self {
        Self::new(ErrorKind::NotCallable, format!("Value of type {type_name} is not callable"))
    }

    pub(crate) fn incomparable(left: &str, right: &str) -> Self {
        Self::new(
            ErrorKind::IncomparableOperands,
            format!("Cannot compare {left} with {right}"),
        )
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, message)
    }

    pub(crate) fn cast_error(from: &str, to: &str) -> Self {
        Self::new(ErrorKind::CastError, format!("Cannot cast {from} to {to}"))
    }

    pub(crate) fn security_denied(what: impl fmt::Display) -> Self {
        Self::new(ErrorKind::SecurityDenied, format!("Security denied: {what}"))
    }

    pub(crate) fn syntax(line: u32, column: u32, message: impl fmt::Display) -> Self {
        Self::new(ErrorKind::Syntax, format!("Syntax error at {line}:{column}: {message}"))
    }

    pub(crate) fn no_scheduler(primitive: &str) -> Self {
        Self::new(
            ErrorKind::NoScheduler,
            format!("'{primitive}' requires a scheduler, but none is bound"),
        )
    }

    /// Formats the boundary report: message, blank line, folded call stack.
    ///
    /// This is what the embedder sees when an error escapes the outermost `eval`.
    #[must_use]
    pub fn format_with_stack(&self) -> String {
        let mut out = self.message.clone();
        if !self.frames.is_empty() {
            out.push_str("\n\nCall Stack:\n");
            out.push_str(&crate::frame::render_frames(&self.frames));
        }
        out
    }
}

impl fmt::Display for NovaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.frames.is_empty() {
            f.write_str(&self.message)
        } else {
            f.write_str(&self.format_with_stack())
        }
    }
}

impl std::error::Error for NovaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

/// Non-local control flow carrier propagated up the evaluator call chain.
///
/// User throws, `break`, `continue`, `return`, and self-tail-call rebinds are
/// all represented explicitly rather than via host panics; only `Raise`
/// crosses the outermost eval boundary. Native functions written against the
/// embedding API participate via [`EvalResult`].
#[derive(Debug)]
pub enum Signal {
    Raise(Box<NovaError>),
    Return(Value),
    Break,
    Continue,
    /// A self-tail-call: rebind the current frame's parameters to these
    /// arguments and restart the body.
    TailCall(SmallVec<[Value; 4]>),
}

impl Signal {
    /// Wraps an error for propagation.
    pub fn raise(err: NovaError) -> Self {
        Self::Raise(Box::new(err))
    }

    /// Renders the signal kind for internal diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Raise(_) => "raise",
            Self::Return(_) => "return",
            Self::Break => "break",
            Self::Continue => "continue",
            Self::TailCall(_) => "tail-call",
        }
    }
}

impl From<NovaError> for Signal {
    fn from(err: NovaError) -> Self {
        Self::raise(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_errors_are_uncatchable() {
        assert!(!ErrorKind::SecurityDenied.is_catchable());
        assert!(!ErrorKind::RecursionLimit.is_catchable());
        assert!(!ErrorKind::LoopLimit.is_catchable());
        assert!(!ErrorKind::Timeout.is_catchable());
        assert!(ErrorKind::DivisionByZero.is_catchable());
        assert!(ErrorKind::UserThrown.is_catchable());
    }

    #[test]
    fn kind_display_matches_variant_name() {
        assert_eq!(ErrorKind::DivisionByZero.to_string(), "DivisionByZero");
        assert_eq!(ErrorKind::UndefinedVariable.to_string(), "UndefinedVariable");
    }

    #[test]
    fn format_without_frames_is_bare_message() {
        let err = NovaError::division_by_zero();
        assert_eq!(err.to_string(), "Division by zero");
    }
}
