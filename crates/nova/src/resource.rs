use std::{
    fmt,
    sync::atomic::{AtomicUsize, Ordering},
    time::{Duration, Instant},
};

use crate::error::{ErrorKind, NovaError};

/// Recommended maximum recursion depth if not otherwise specified.
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 1000;

/// Error returned when a resource budget is exceeded during execution.
///
/// Budget errors are converted to uncatchable policy errors so sandboxed code
/// cannot swallow its own enforcement.
#[derive(Debug, Clone)]
pub enum ResourceError {
    /// Maximum recursion depth exceeded.
    Recursion { limit: usize, depth: usize },
    /// Maximum loop iterations exceeded.
    LoopIterations { limit: usize, count: usize },
    /// Maximum wall-clock execution time exceeded.
    Time { limit: Duration, elapsed: Duration },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recursion { limit, depth } => {
                write!(f, "recursion limit exceeded: depth {depth} > {limit}")
            }
            Self::LoopIterations { limit, count } => {
                write!(f, "loop iteration limit exceeded: {count} > {limit}")
            }
            Self::Time { limit, elapsed } => {
                write!(f, "time limit exceeded: {elapsed:?} > {limit:?}")
            }
        }
    }
}

impl std::error::Error for ResourceError {}

impl From<ResourceError> for NovaError {
    fn from(err: ResourceError) -> Self {
        let kind = match err {
            ResourceError::Recursion { .. } => ErrorKind::RecursionLimit,
            ResourceError::LoopIterations { .. } => ErrorKind::LoopLimit,
            ResourceError::Time { .. } => ErrorKind::Timeout,
        };
        Self::new(kind, err.to_string())
    }
}

/// Resource budgets for one outermost `eval`.
///
/// All limits are optional; `None` disables that check.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct Budgets {
    /// Maximum wall-clock execution time per outermost eval.
    pub max_execution_time: Option<Duration>,
    /// Maximum call-stack depth, counted per interpreter.
    pub max_recursion_depth: Option<usize>,
    /// Maximum loop iterations, counted across the whole execution.
    pub max_loop_iterations: Option<usize>,
}

impl Budgets {
    /// No limits at all.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_execution_time: None,
            max_recursion_depth: None,
            max_loop_iterations: None,
        }
    }
}

/// Per-execution budget tracker, shared by the outermost interpreter and every
/// child interpreter it forks.
///
/// The wall-clock deadline is polled at loop heads and function entries rather
/// than enforced by a watcher thread; loop iterations share one atomic counter
/// across threads so the budget is per-outermost-eval as a whole.
#[derive(Debug)]
pub struct ExecutionTracker {
    budgets: Budgets,
    started: Instant,
    deadline: Option<Instant>,
    loop_iterations: AtomicUsize,
}

impl ExecutionTracker {
    /// Starts tracking a fresh outermost execution.
    #[must_use]
    pub fn new(budgets: Budgets) -> Self {
        let started = Instant::now();
        Self {
            budgets,
            started,
            deadline: budgets.max_execution_time.map(|limit| started + limit),
            loop_iterations: AtomicUsize::new(0),
        }
    }

    /// Checks the recursion budget before a new frame is pushed.
    ///
    /// `current_depth` is the stack depth before the push.
    pub fn check_recursion_depth(&self, current_depth: usize) -> Result<(), ResourceError> {
        let limit = self.budgets.max_recursion_depth.unwrap_or(DEFAULT_MAX_RECURSION_DEPTH);
        if current_depth >= limit {
            return Err(ResourceError::Recursion {
                limit,
                depth: current_depth + 1,
            });
        }
        Ok(())
    }

    /// Counts one loop iteration and polls the wall-clock deadline.
    pub fn on_loop_iteration(&self) -> Result<(), ResourceError> {
        if let Some(limit) = self.budgets.max_loop_iterations {
            let count = self.loop_iterations.fetch_add(1, Ordering::Relaxed) + 1;
            if count > limit {
                return Err(ResourceError::LoopIterations { limit, count });
            }
        }
        self.check_time()
    }

    /// Polls the wall-clock deadline.
    pub fn check_time(&self) -> Result<(), ResourceError> {
        if let Some(deadline) = self.deadline {
            let now = Instant::now();
            if now >= deadline {
                let limit = self.budgets.max_execution_time.unwrap_or_default();
                return Err(ResourceError::Time {
                    limit,
                    elapsed: now.duration_since(self.started),
                });
            }
        }
        Ok(())
    }

    /// Total loop iterations counted so far.
    #[must_use]
    pub fn loop_iterations(&self) -> usize {
        self.loop_iterations.load(Ordering::Relaxed)
    }

    /// Elapsed time since the outermost eval began.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_tracker_never_trips() {
        let tracker = ExecutionTracker::new(Budgets::unlimited());
        for _ in 0..10_000 {
            tracker.on_loop_iteration().unwrap();
        }
        tracker.check_recursion_depth(DEFAULT_MAX_RECURSION_DEPTH - 1).unwrap();
    }

    #[test]
    fn loop_budget_trips_at_limit() {
        let tracker = ExecutionTracker::new(Budgets {
            max_loop_iterations: Some(10),
            ..Budgets::unlimited()
        });
        for _ in 0..10 {
            tracker.on_loop_iteration().unwrap();
        }
        let err = tracker.on_loop_iteration().unwrap_err();
        assert!(matches!(err, ResourceError::LoopIterations { limit: 10, count: 11 }));
    }

    #[test]
    fn recursion_budget_counts_depth_before_push() {
        let tracker = ExecutionTracker::new(Budgets {
            max_recursion_depth: Some(4),
            ..Budgets::unlimited()
        });
        tracker.check_recursion_depth(3).unwrap();
        assert!(tracker.check_recursion_depth(4).is_err());
    }

    #[test]
    fn time_budget_trips_once_elapsed() {
        let tracker = ExecutionTracker::new(Budgets {
            max_execution_time: Some(Duration::from_millis(1)),
            ..Budgets::unlimited()
        });
        std::thread::sleep(Duration::from_millis(5));
        assert!(tracker.check_time().is_err());
    }

    #[test]
    fn budget_errors_map_to_policy_kinds() {
        let err: NovaError = ResourceError::Recursion { limit: 1, depth: 2 }.into();
        assert_eq!(err.kind, ErrorKind::RecursionLimit);
        assert!(!err.kind.is_catchable());
    }
}
