//! Futures and task handles for the `async`/`await`/`schedule` primitives.
//!
//! A future is a one-shot rendezvous: the producing worker completes it, any
//! number of consumers block on `await`. Tasks wrap a scheduler-side
//! cancellation handle.

use std::sync::{
    Condvar, Mutex, PoisonError,
    atomic::{AtomicBool, Ordering},
};
use std::sync::Arc;

use crate::{
    error::{NovaError, RunResult},
    scheduler::Cancellable,
    value::Value,
};

#[derive(Debug)]
enum FutureSlot {
    Pending,
    Done(Value),
    Failed(NovaError),
}

/// The value behind `Value::Future`: result of an `async { ... }` block.
#[derive(Debug)]
pub struct FutureValue {
    slot: Mutex<FutureSlot>,
    ready: Condvar,
    cancelled: AtomicBool,
}

impl FutureValue {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            slot: Mutex::new(FutureSlot::Pending),
            ready: Condvar::new(),
            cancelled: AtomicBool::new(false),
        })
    }

    /// Resolves the future; later completions are ignored (one-shot).
    pub fn complete(&self, value: Value) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(*slot, FutureSlot::Pending) {
            *slot = FutureSlot::Done(value);
            self.ready.notify_all();
        }
    }

    /// Fails the future with the error the producing block raised.
    pub fn fail(&self, err: NovaError) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(*slot, FutureSlot::Pending) {
            *slot = FutureSlot::Failed(err);
            self.ready.notify_all();
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.ready.notify_all();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        !matches!(
            *self.slot.lock().unwrap_or_else(PoisonError::into_inner),
            FutureSlot::Pending
        )
    }

    /// Blocks until the future resolves.
    ///
    /// Awaiting a cancelled future yields `null`; a failed future re-raises
    /// the producing block's error on the awaiting thread.
    pub fn await_value(&self) -> RunResult<Value> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if self.is_cancelled() && matches!(*slot, FutureSlot::Pending) {
                return Ok(Value::Null);
            }
            match &*slot {
                FutureSlot::Pending => {
                    slot = self.ready.wait(slot).unwrap_or_else(PoisonError::into_inner);
                }
                FutureSlot::Done(value) => return Ok(value.clone()),
                FutureSlot::Failed(err) => return Err(err.clone()),
            }
        }
    }

    #[must_use]
    pub fn display(&self) -> String {
        if self.is_cancelled() {
            "<future: cancelled>".to_owned()
        } else if self.is_done() {
            "<future: completed>".to_owned()
        } else {
            "<future: pending>".to_owned()
        }
    }
}

/// The value behind `Value::Task`: a handle to a scheduled block.
#[derive(Debug)]
pub struct TaskValue {
    cancellable: Arc<dyn Cancellable>,
}

impl TaskValue {
    #[must_use]
    pub fn new(cancellable: Arc<dyn Cancellable>) -> Arc<Self> {
        Arc::new(Self { cancellable })
    }

    /// Idempotent; pending scheduler firings are skipped after this.
    pub fn cancel(&self) {
        self.cancellable.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellable.is_cancelled()
    }

    #[must_use]
    pub fn display(&self) -> String {
        if self.is_cancelled() {
            "<task: cancelled>".to_owned()
        } else {
            "<task: active>".to_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn future_rendezvous_across_threads() {
        let future = FutureValue::new();
        let producer = Arc::clone(&future);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            producer.complete(Value::Int(5));
        });
        assert_eq!(future.await_value().unwrap(), Value::Int(5));
    }

    #[test]
    fn future_completion_is_one_shot() {
        let future = FutureValue::new();
        future.complete(Value::Int(1));
        future.complete(Value::Int(2));
        assert_eq!(future.await_value().unwrap(), Value::Int(1));
    }

    #[test]
    fn awaiting_cancelled_future_yields_null() {
        let future = FutureValue::new();
        future.cancel();
        assert_eq!(future.await_value().unwrap(), Value::Null);
    }

    #[test]
    fn failed_future_reraises() {
        let future = FutureValue::new();
        future.fail(NovaError::division_by_zero());
        assert!(future.await_value().is_err());
    }
}
