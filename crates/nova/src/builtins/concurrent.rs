//! The concurrency primitives: `schedule`, `scheduleRepeat`, `scope`,
//! `async`, `sync`, `delay`, and the Task/Future method surface.
//!
//! Each scheduled block and async task runs in a child interpreter sharing
//! globals, policy, and scheduler with its parent but owning its call stack.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::{
    error::{ErrorKind, EvalResult, NovaError},
    future::{FutureValue, TaskValue},
    interp::Interpreter,
    io::sink_write,
    scheduler::Scheduler,
    types::CallArgs,
    value::Value,
};

fn arg(args: &CallArgs, index: usize, name: &str) -> Result<Value, NovaError> {
    args.positional
        .get(index)
        .cloned()
        .ok_or_else(|| NovaError::type_error(format!("{name}: missing argument {index}")))
}

fn required_scheduler(interp: &Interpreter, primitive: &str) -> Result<Arc<dyn Scheduler>, NovaError> {
    interp
        .scheduler
        .clone()
        .ok_or_else(|| NovaError::no_scheduler(primitive))
}

/// Runs a block in a child interpreter, completing `future` with the result.
fn run_into_future(mut child: Interpreter, block: Value, future: &Arc<FutureValue>) {
    match child.call_function(block, Vec::new()) {
        Ok(value) => future.complete(value),
        Err(err) => future.fail(err),
    }
}

/// Runs a fire-and-forget block; failures are reported to the stderr sink.
fn run_detached(child: &mut Interpreter, block: Value) {
    if let Err(err) = child.call_function(block, Vec::new()) {
        sink_write(&child.stderr, &format!("scheduled task failed: {}\n", err.format_with_stack()));
    }
}

pub(super) fn install(interp: &mut Interpreter) {
    interp.register_native("schedule", Some(2), |interp, args| {
        let scheduler = required_scheduler(interp, "schedule")?;
        let delay_ms = u64::try_from(arg(&args, 0, "schedule")?.as_long()?).unwrap_or(0);
        let block = arg(&args, 1, "schedule")?;
        let mut child = interp.child();
        let cancellable = scheduler.schedule_later(
            delay_ms,
            Box::new(move || run_detached(&mut child, block)),
        );
        Ok(Value::Task(TaskValue::new(cancellable)))
    });

    interp.register_native("scheduleRepeat", Some(3), |interp, args| {
        let scheduler = required_scheduler(interp, "scheduleRepeat")?;
        let initial_ms = u64::try_from(arg(&args, 0, "scheduleRepeat")?.as_long()?).unwrap_or(0);
        let period_ms = u64::try_from(arg(&args, 1, "scheduleRepeat")?.as_long()?).unwrap_or(1);
        let block = arg(&args, 2, "scheduleRepeat")?;
        let child = Mutex::new(interp.child());
        let cancellable = scheduler.schedule_repeat(
            initial_ms,
            period_ms,
            Arc::new(move || {
                let mut child = child.lock().unwrap_or_else(PoisonError::into_inner);
                run_detached(&mut child, block.clone());
            }),
        );
        Ok(Value::Task(TaskValue::new(cancellable)))
    });

    interp.register_native("scope", Some(1), |interp, args| {
        let scheduler = required_scheduler(interp, "scope")?;
        let block = arg(&args, 0, "scope")?;
        let future = FutureValue::new();
        let child = interp.child();
        let producer = Arc::clone(&future);
        scheduler
            .async_executor()
            .execute(Box::new(move || run_into_future(child, block, &producer)));
        future.await_value()
    });

    interp.register_native("async", Some(1), |interp, args| {
        let scheduler = required_scheduler(interp, "async")?;
        let block = arg(&args, 0, "async")?;
        let future = FutureValue::new();
        let child = interp.child();
        let producer = Arc::clone(&future);
        scheduler
            .async_executor()
            .execute(Box::new(move || run_into_future(child, block, &producer)));
        Ok(Value::Future(future))
    });

    interp.register_native("sync", Some(1), |interp, args| {
        let scheduler = required_scheduler(interp, "sync")?;
        if scheduler.is_main_thread() {
            return Err(NovaError::new(
                ErrorKind::SchedulerMisuse,
                "sync { } from the main thread would deadlock; call it from a scope or async context",
            ));
        }
        let block = arg(&args, 0, "sync")?;
        let future = FutureValue::new();
        let child = interp.child();
        let producer = Arc::clone(&future);
        scheduler
            .main_executor()
            .execute(Box::new(move || run_into_future(child, block, &producer)));
        future.await_value()
    });

    interp.register_native("delay", Some(1), |interp, args| {
        let ms = u64::try_from(arg(&args, 0, "delay")?.as_long()?).unwrap_or(0);
        if let Some(scheduler) = &interp.scheduler
            && scheduler.is_main_thread()
        {
            return Err(NovaError::new(
                ErrorKind::SchedulerMisuse,
                "delay() is forbidden on the main thread; use schedule() instead",
            ));
        }
        std::thread::sleep(Duration::from_millis(ms));
        Ok(Value::Unit)
    });
}

pub(super) fn dispatch(
    _interp: &mut Interpreter,
    recv: &Value,
    name: &str,
    args: &CallArgs,
    _line: u32,
) -> Option<EvalResult<Value>> {
    if !args.positional.is_empty() {
        return None;
    }
    match recv {
        Value::Task(task) => match name {
            "cancel" => {
                task.cancel();
                Some(Ok(Value::Unit))
            }
            "isCancelled" => Some(Ok(Value::Bool(task.is_cancelled()))),
            _ => None,
        },
        Value::Future(future) => match name {
            "await" | "get" => Some(future.await_value().map_err(crate::error::Signal::raise)),
            "cancel" => {
                future.cancel();
                Some(Ok(Value::Unit))
            }
            "isCancelled" => Some(Ok(Value::Bool(future.is_cancelled()))),
            "isDone" => Some(Ok(Value::Bool(future.is_done()))),
            _ => None,
        },
        _ => None,
    }
}
