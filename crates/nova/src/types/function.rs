use std::{fmt, sync::Arc};

use smallvec::SmallVec;

use crate::{
    class::ClassRef,
    env::Env,
    error::EvalResult,
    interp::Interpreter,
    mir,
    value::Value,
};

/// Member visibility, shared by fields and methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

/// Evaluated call arguments: positionals in order plus named arguments.
///
/// Most calls carry at most a handful of positionals, so the inline capacity
/// avoids a heap allocation on the hot path.
#[derive(Debug, Default, Clone)]
pub struct CallArgs {
    pub positional: SmallVec<[Value; 4]>,
    pub named: Vec<(String, Value)>,
    /// Call-site type arguments (`f<Int>(x)`, `Array<Int>(n)`).
    pub type_args: Vec<String>,
}

impl CallArgs {
    #[must_use]
    pub fn positional(values: impl IntoIterator<Item = Value>) -> Self {
        Self {
            positional: values.into_iter().collect(),
            named: Vec::new(),
            type_args: Vec::new(),
        }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positional.len() + self.named.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// Prepends a receiver argument (extension-function dispatch).
    pub fn prepend(&mut self, value: Value) {
        self.positional.insert(0, value);
    }
}

/// Implementation signature for native (host-registered) functions.
pub type NativeFn = Arc<dyn Fn(&mut Interpreter, CallArgs) -> EvalResult<Value> + Send + Sync>;

/// A function implemented by the host rather than by Nova source.
#[derive(Clone)]
pub struct NativeFunction {
    pub name: String,
    /// Expected positional arity; `None` accepts any count.
    pub arity: Option<usize>,
    pub f: NativeFn,
}

impl NativeFunction {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        arity: Option<usize>,
        f: impl Fn(&mut Interpreter, CallArgs) -> EvalResult<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            arity,
            f: Arc::new(f),
        }
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

/// A function defined in Nova source: a top-level `fun`, a method, a lambda,
/// or an extension function.
///
/// The captured environment is the lexical scope active at the definition
/// site; calling the function creates a child of that scope.
#[derive(Debug)]
pub struct UserFunction {
    pub name: String,
    pub params: Vec<mir::Param>,
    pub body: Arc<mir::Block>,
    /// Defining lexical environment (closure capture).
    pub captured: Env,
    /// Receiver type name when this is an extension function.
    pub receiver_type: Option<String>,
    /// Declaring class for methods; used for visibility checks.
    pub declared_class: Option<ClassRef>,
    pub visibility: Visibility,
    pub is_lambda: bool,
    /// Reified type parameter names, bound per call site.
    pub type_params: Vec<String>,
    pub source_file: Arc<str>,
    pub line: u32,
    pub column: u32,
}

impl UserFunction {
    /// Number of declared parameters.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Number of parameters without default values.
    #[must_use]
    pub fn required_arity(&self) -> usize {
        self.params.iter().filter(|p| p.default.is_none()).count()
    }
}

/// The callable value: every flavour of function the runtime can invoke.
#[derive(Debug)]
pub enum FunctionValue {
    User(Arc<UserFunction>),
    Native(NativeFunction),
    /// A method plus the receiver it was plucked from.
    Bound { receiver: Value, function: Arc<FunctionValue> },
    /// Partial application: `None` entries are holes filled at call time.
    Partial {
        target: Arc<FunctionValue>,
        bound: Vec<Option<Value>>,
    },
    /// Unbound method reference `Type::name` / `::name`; the first call
    /// argument becomes the receiver when no such free function exists.
    MethodRef { name: String },
    /// Constructor reference `Type::new`-style; calling it instantiates.
    CtorRef { class: ClassRef },
}

impl FunctionValue {
    /// Short human-readable name for errors and display.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::User(f) => {
                if f.is_lambda {
                    "<lambda>".to_owned()
                } else {
                    format!("<fun {}>", f.name)
                }
            }
            Self::Native(f) => format!("<native {}>", f.name),
            Self::Bound { function, .. } => function.describe(),
            Self::Partial { target, .. } => format!("<partial {}>", target.describe()),
            Self::MethodRef { name } => format!("<::{name}>"),
            Self::CtorRef { class } => format!("<{}::new>", class.name),
        }
    }

    /// Remaining positional arity of a partial application, if knowable.
    #[must_use]
    pub fn partial_holes(&self) -> Option<usize> {
        match self {
            Self::Partial { bound, .. } => Some(bound.iter().filter(|slot| slot.is_none()).count()),
            _ => None,
        }
    }
}
