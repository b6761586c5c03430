//! The scheduler SPI and a thread-backed default implementation.
//!
//! The runtime never owns threading policy: hosts implement [`Scheduler`] to
//! bridge Nova's `schedule`/`scope`/`async`/`sync` primitives onto their own
//! main loop and worker pool. [`ThreadScheduler`] is the batteries-included
//! implementation used by tests and embedders without an event loop: a
//! dedicated FIFO main-thread worker plus a small background pool.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Condvar, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
    thread,
    time::Duration,
};

/// A unit of work submitted to an executor.
pub type Job = Box<dyn FnOnce() + Send>;

/// A repeating unit of work.
pub type RepeatJob = Arc<dyn Fn() + Send + Sync>;

/// Something that can run submitted closures.
pub trait Executor: Send + Sync {
    fn execute(&self, task: Job);
}

/// Cancellation handle returned by the delayed/repeating scheduling calls.
pub trait Cancellable: Send + Sync + std::fmt::Debug {
    /// Idempotent.
    fn cancel(&self);
    fn is_cancelled(&self) -> bool;
}

/// Host-provided scheduling surface.
///
/// Main-executor tasks must run serially in submission order; async-executor
/// tasks have no ordering guarantees.
pub trait Scheduler: Send + Sync {
    fn main_executor(&self) -> Arc<dyn Executor>;
    fn async_executor(&self) -> Arc<dyn Executor>;
    /// Whether the calling thread is the designated main thread.
    fn is_main_thread(&self) -> bool;
    /// Runs `task` on the main executor after `delay_ms`.
    fn schedule_later(&self, delay_ms: u64, task: Job) -> Arc<dyn Cancellable>;
    /// Runs `task` on the main executor after `delay_ms`, then every
    /// `period_ms` until cancelled.
    fn schedule_repeat(&self, delay_ms: u64, period_ms: u64, task: RepeatJob) -> Arc<dyn Cancellable>;
}

/// Simple atomic cancellation flag.
#[derive(Debug, Default)]
pub struct CancelFlag(AtomicBool);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl Cancellable for CancelFlag {
    fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// --- default implementation ---

struct MainWorker {
    tx: mpsc::Sender<Job>,
}

impl Executor for MainWorker {
    fn execute(&self, task: Job) {
        // Receiver gone means the scheduler was dropped; late tasks are
        // silently discarded, matching cancelled-tick semantics.
        let _ = self.tx.send(task);
    }
}

// mpsc::Sender<T> is Send+Sync for T: Send since Rust 1.72; the worker is the
// sole receiver.

#[derive(Default)]
struct PoolState {
    queue: Mutex<VecDeque<Job>>,
    ready: Condvar,
    shutdown: AtomicBool,
}

struct PoolExecutor {
    state: Arc<PoolState>,
}

impl Executor for PoolExecutor {
    fn execute(&self, task: Job) {
        let mut queue = self.state.queue.lock().unwrap_or_else(PoisonError::into_inner);
        queue.push_back(task);
        drop(queue);
        self.state.ready.notify_one();
    }
}

fn pool_worker(state: &PoolState) {
    loop {
        let mut queue = state.queue.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if state.shutdown.load(Ordering::SeqCst) {
                return;
            }
            if let Some(job) = queue.pop_front() {
                drop(queue);
                job();
                break;
            }
            queue = state.ready.wait(queue).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Thread-backed [`Scheduler`]: one dedicated main-thread worker draining a
/// FIFO queue, plus a fixed background pool for async work.
pub struct ThreadScheduler {
    main: Arc<MainWorker>,
    pool: Arc<PoolExecutor>,
    pool_state: Arc<PoolState>,
    main_thread: thread::ThreadId,
}

impl ThreadScheduler {
    /// Spawns the main worker and `pool_size` background workers.
    #[must_use]
    pub fn new(pool_size: usize) -> Arc<Self> {
        let (tx, rx) = mpsc::channel::<Job>();
        let handle = thread::Builder::new()
            .name("nova-main".to_owned())
            .spawn(move || {
                while let Ok(job) = rx.recv() {
                    job();
                }
            })
            .expect("failed to spawn main worker thread");
        let main_thread = handle.thread().id();

        let pool_state = Arc::new(PoolState::default());
        for i in 0..pool_size.max(1) {
            let state = Arc::clone(&pool_state);
            let _ = thread::Builder::new()
                .name(format!("nova-worker-{i}"))
                .spawn(move || pool_worker(&state));
        }

        Arc::new(Self {
            main: Arc::new(MainWorker { tx }),
            pool: Arc::new(PoolExecutor {
                state: Arc::clone(&pool_state),
            }),
            pool_state,
            main_thread,
        })
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        self.pool_state.shutdown.store(true, Ordering::SeqCst);
        self.pool_state.ready.notify_all();
        // The main worker exits when its channel sender is dropped.
    }
}

impl Scheduler for ThreadScheduler {
    fn main_executor(&self) -> Arc<dyn Executor> {
        Arc::clone(&self.main) as Arc<dyn Executor>
    }

    fn async_executor(&self) -> Arc<dyn Executor> {
        Arc::clone(&self.pool) as Arc<dyn Executor>
    }

    fn is_main_thread(&self) -> bool {
        thread::current().id() == self.main_thread
    }

    fn schedule_later(&self, delay_ms: u64, task: Job) -> Arc<dyn Cancellable> {
        let flag = CancelFlag::new();
        let cancelled = Arc::clone(&flag);
        let main = Arc::clone(&self.main);
        let _ = thread::Builder::new().name("nova-timer".to_owned()).spawn(move || {
            thread::sleep(Duration::from_millis(delay_ms));
            if !cancelled.is_cancelled() {
                main.execute(task);
            }
        });
        flag
    }

    fn schedule_repeat(&self, delay_ms: u64, period_ms: u64, task: RepeatJob) -> Arc<dyn Cancellable> {
        let flag = CancelFlag::new();
        let cancelled = Arc::clone(&flag);
        let main = Arc::clone(&self.main);
        let _ = thread::Builder::new().name("nova-timer".to_owned()).spawn(move || {
            thread::sleep(Duration::from_millis(delay_ms));
            loop {
                if cancelled.is_cancelled() {
                    return;
                }
                let tick = Arc::clone(&task);
                main.execute(Box::new(move || tick()));
                thread::sleep(Duration::from_millis(period_ms.max(1)));
            }
        });
        flag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    #[test]
    fn main_executor_runs_fifo() {
        let scheduler = ThreadScheduler::new(2);
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..10 {
            let log = Arc::clone(&log);
            scheduler.main_executor().execute(Box::new(move || {
                log.lock().unwrap().push(i);
            }));
        }
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            if log.lock().unwrap().len() == 10 {
                break;
            }
            assert!(Instant::now() < deadline, "main worker did not drain the queue");
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(*log.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn cancelled_delayed_task_never_fires() {
        let scheduler = ThreadScheduler::new(1);
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let handle = scheduler.schedule_later(50, Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        handle.cancel();
        assert!(handle.is_cancelled());
        thread::sleep(Duration::from_millis(120));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn delayed_task_fires_once() {
        let scheduler = ThreadScheduler::new(1);
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        scheduler.schedule_later(20, Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        thread::sleep(Duration::from_millis(150));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn repeat_stops_after_cancel() {
        let scheduler = ThreadScheduler::new(1);
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let handle = scheduler.schedule_repeat(
            5,
            10,
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        thread::sleep(Duration::from_millis(80));
        handle.cancel();
        let after_cancel = fired.load(Ordering::SeqCst);
        assert!(after_cancel >= 1);
        thread::sleep(Duration::from_millis(80));
        // one in-flight tick may still land, but the stream stops
        assert!(fired.load(Ordering::SeqCst) <= after_cancel + 1);
    }

    #[test]
    fn is_main_thread_only_on_worker() {
        let scheduler = ThreadScheduler::new(1);
        assert!(!scheduler.is_main_thread());
        let (tx, rx) = mpsc::channel();
        let check = Arc::clone(&scheduler);
        scheduler.main_executor().execute(Box::new(move || {
            let _ = tx.send(check.is_main_thread());
        }));
        assert!(rx.recv_timeout(Duration::from_secs(2)).unwrap());
    }
}
