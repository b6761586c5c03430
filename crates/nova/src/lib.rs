#![doc = include_str!("../../../README.md")]
#![expect(clippy::cast_possible_truncation, reason = "numeric narrowing is checked at the boundaries")]
#![expect(clippy::cast_sign_loss, reason = "sign-changing casts are intentional")]
#![expect(clippy::cast_possible_wrap, reason = "wrap behavior mirrors the numeric tower")]
#![expect(clippy::needless_pass_by_value, reason = "call APIs pass values consistently")]
#![expect(clippy::unnecessary_wraps, reason = "dispatch signatures are uniform")]
#![expect(clippy::must_use_candidate, reason = "query methods are used for effects in dispatch chains")]
#![expect(clippy::missing_panics_doc, reason = "lock poisoning is tolerated, not propagated")]
#![expect(clippy::return_self_not_must_use, reason = "builder setters are chained or dropped freely")]

mod annotations;
mod ast;
mod builtins;
mod class;
mod env;
mod error;
mod eval;
mod frame;
mod future;
mod host;
mod interp;
mod io;
mod lexer;
pub mod mir;
mod parser;
mod policy;
mod resource;
mod scheduler;
mod tracer;
mod types;
mod value;

pub use crate::{
    annotations::{BuilderObject, ProcessorFn, ProcessorTable},
    class::{
        AbstractMethod, ClassArena, ClassDescriptor, ClassId, ClassRef, CompanionDef, InitItem, Instance,
        InstanceKind, SecondaryCtor,
    },
    env::Env,
    error::{ErrorKind, EvalResult, NovaError, RunResult, Signal},
    frame::{CallFrame, CallStack, FRAME_RENDER_LIMIT, FrameSnapshot, render_frames},
    future::{FutureValue, TaskValue},
    host::{ClassHandle, HostClass, HostException, HostObject, HostRegistry, JavaNamespace, SamInterface, SamObject},
    interp::Interpreter,
    io::{
        CollectSink, EmptyInput, InputSource, NullSink, OutputSink, QueuedInput, SharedInput, SharedSink, StdErrSink,
        StdInput, StdSink, shared_input, shared_sink,
    },
    mir::Mir,
    policy::SecurityPolicy,
    resource::{Budgets, DEFAULT_MAX_RECURSION_DEPTH, ExecutionTracker, ResourceError},
    scheduler::{CancelFlag, Cancellable, Executor, Job, RepeatJob, Scheduler, ThreadScheduler},
    tracer::{EvalTracer, NoopTracer, RecordingTracer, StderrTracer, TraceEvent},
    types::{
        ArrayValue, CallArgs, ElemKind, FunctionValue, ListValue, MapValue, NativeFn, NativeFunction, PairValue,
        RangeValue, ResultValue, UserFunction, Visibility,
    },
    value::Value,
};
