//! Execution tracing infrastructure.
//!
//! A trait-based tracing system for the evaluator. The default
//! [`NoopTracer`] keeps hooks essentially free; [`StderrTracer`] prints a
//! human-readable execution log; [`RecordingTracer`] captures events for
//! post-mortem inspection in tests.
//!
//! | Tracer | Purpose |
//! |--------|---------|
//! | [`NoopTracer`] | No-op (production default) |
//! | [`StderrTracer`] | Human-readable execution log to stderr |
//! | [`RecordingTracer`] | Full event recording for post-mortem analysis |

use crate::error::ErrorKind;

/// Trace event emitted during evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// A user function, method, or lambda call was entered.
    Call { name: String, depth: usize },
    /// A call returned (normally or by unwinding).
    Return { name: String, depth: usize },
    /// A self-tail-call rebound the current frame.
    TailCall { name: String, hits: u32 },
    /// An error was raised.
    Throw { kind: ErrorKind, message: String },
}

/// Hook points invoked by the evaluator at key execution events.
///
/// All methods have empty default bodies so implementations only override
/// what they need.
pub trait EvalTracer {
    fn on_call(&mut self, _name: &str, _depth: usize) {}
    fn on_return(&mut self, _name: &str, _depth: usize) {}
    fn on_tail_call(&mut self, _name: &str, _hits: u32) {}
    fn on_throw(&mut self, _kind: ErrorKind, _message: &str) {}
}

/// Tracer that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

impl EvalTracer for NoopTracer {}

/// Tracer that logs events to stderr, indented by call depth.
#[derive(Debug, Default)]
pub struct StderrTracer;

impl EvalTracer for StderrTracer {
    fn on_call(&mut self, name: &str, depth: usize) {
        eprintln!("{:indent$}-> {name}", "", indent = depth * 2);
    }

    fn on_return(&mut self, name: &str, depth: usize) {
        eprintln!("{:indent$}<- {name}", "", indent = depth * 2);
    }

    fn on_tail_call(&mut self, name: &str, hits: u32) {
        eprintln!("~~ {name} tail-call #{hits}");
    }

    fn on_throw(&mut self, kind: ErrorKind, message: &str) {
        eprintln!("!! {kind}: {message}");
    }
}

/// Tracer that records every event for later inspection.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    events: Vec<TraceEvent>,
}

impl RecordingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded events, in order.
    #[must_use]
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Consumes the tracer, returning the recorded events.
    #[must_use]
    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }
}

impl EvalTracer for RecordingTracer {
    fn on_call(&mut self, name: &str, depth: usize) {
        self.events.push(TraceEvent::Call {
            name: name.to_owned(),
            depth,
        });
    }

    fn on_return(&mut self, name: &str, depth: usize) {
        self.events.push(TraceEvent::Return {
            name: name.to_owned(),
            depth,
        });
    }

    fn on_tail_call(&mut self, name: &str, hits: u32) {
        self.events.push(TraceEvent::TailCall {
            name: name.to_owned(),
            hits,
        });
    }

    fn on_throw(&mut self, kind: ErrorKind, message: &str) {
        self.events.push(TraceEvent::Throw {
            kind,
            message: message.to_owned(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_tracer_keeps_event_order() {
        let mut tracer = RecordingTracer::new();
        tracer.on_call("f", 0);
        tracer.on_tail_call("f", 3);
        tracer.on_return("f", 0);
        let events = tracer.into_events();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[1],
            TraceEvent::TailCall {
                name: "f".into(),
                hits: 3
            }
        );
    }
}
