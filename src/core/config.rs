//! # Runner configuration.
//!
//! Provides [`RunnerConfig`], the construction options of a [`Runner`](crate::Runner).
//!
//! ## Sentinel values
//! - `global_timeout = 0s` → not set, the default budget of 3000ms applies
//! - `task_timeout = 0s` → not set, the default per-task budget of 1000ms applies
//! - `max_parallel = 0` → unlimited (no per-stage semaphore created)
//! - `start_time = None` → the global clock starts when the runner is built

use std::time::Duration;

use tokio::time::Instant;

use crate::policies::FailStrategy;

/// Whole-run budget used when `global_timeout` is zero.
pub const DEFAULT_GLOBAL_TIMEOUT: Duration = Duration::from_millis(3000);

/// Per-task budget used when `task_timeout` is zero.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_millis(1000);

/// Construction options for a runner.
///
/// ## Field semantics
/// - `global_timeout`: whole-run budget, measured from `start_time`
/// - `task_timeout`: default per-task budget (overridable per task)
/// - `fail_strategy`: what a failed stage means for the run
/// - `auto_next`: drive the whole queue in one `run()` call
/// - `start_time`: basis of global elapsed time
/// - `max_parallel`: tasks running at once within a stage (`0` = unlimited)
/// - `bus_capacity`: event bus ring buffer size (min 1)
#[derive(Clone, Debug)]
pub struct RunnerConfig {
    /// Whole-run time budget (`0` = [`DEFAULT_GLOBAL_TIMEOUT`]).
    ///
    /// Checked each time a task of the active stage ends successfully; a stage whose
    /// tasks never settle is not interrupted by this budget alone.
    pub global_timeout: Duration,

    /// Default per-task timeout, used by tasks added without an explicit one
    /// (`0` = [`DEFAULT_TASK_TIMEOUT`]).
    pub task_timeout: Duration,

    /// Failure strategy.
    pub fail_strategy: FailStrategy,

    /// When `false`, each `run()` call drives exactly one stage.
    pub auto_next: bool,

    /// Start of the global clock, e.g. the instant a request was received.
    pub start_time: Option<Instant>,

    /// Maximum tasks running at once within one stage.
    pub max_parallel: usize,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,
}

impl RunnerConfig {
    /// Returns the whole-run budget, with `0` mapped to [`DEFAULT_GLOBAL_TIMEOUT`].
    #[inline]
    pub fn effective_global_timeout(&self) -> Duration {
        or_default(self.global_timeout, DEFAULT_GLOBAL_TIMEOUT)
    }

    /// Returns the default per-task budget, with `0` mapped to [`DEFAULT_TASK_TIMEOUT`].
    #[inline]
    pub fn effective_task_timeout(&self) -> Duration {
        or_default(self.task_timeout, DEFAULT_TASK_TIMEOUT)
    }

    /// Resolves the timeout of one task: its own override unless absent or zero,
    /// otherwise [`effective_task_timeout`](Self::effective_task_timeout).
    #[inline]
    pub fn task_timeout_for(&self, own: Option<Duration>) -> Duration {
        match own {
            Some(d) if !d.is_zero() => d,
            _ => self.effective_task_timeout(),
        }
    }

    /// Returns the per-stage concurrency limit as an `Option` (`None` = unlimited).
    #[inline]
    pub fn parallel_limit(&self) -> Option<usize> {
        if self.max_parallel == 0 {
            None
        } else {
            Some(self.max_parallel)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for RunnerConfig {
    /// Default configuration:
    ///
    /// - `global_timeout = 3000ms`
    /// - `task_timeout = 1000ms`
    /// - `fail_strategy = AnyOne`
    /// - `auto_next = true`
    /// - `start_time = None` (build instant)
    /// - `max_parallel = 0` (unlimited)
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            global_timeout: DEFAULT_GLOBAL_TIMEOUT,
            task_timeout: DEFAULT_TASK_TIMEOUT,
            fail_strategy: FailStrategy::default(),
            auto_next: true,
            start_time: None,
            max_parallel: 0,
            bus_capacity: 1024,
        }
    }
}

/// Maps the `0` sentinel to `fallback`.
#[inline]
fn or_default(d: Duration, fallback: Duration) -> Duration {
    if d.is_zero() {
        fallback
    } else {
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = RunnerConfig::default();
        assert_eq!(cfg.global_timeout, Duration::from_millis(3000));
        assert_eq!(cfg.effective_global_timeout(), Duration::from_millis(3000));
        assert_eq!(cfg.effective_task_timeout(), Duration::from_millis(1000));
        assert_eq!(cfg.fail_strategy, FailStrategy::AnyOne);
        assert!(cfg.auto_next);
        assert!(cfg.start_time.is_none());
        assert_eq!(cfg.parallel_limit(), None);
    }

    #[test]
    fn test_sentinels() {
        let cfg = RunnerConfig {
            global_timeout: Duration::ZERO,
            task_timeout: Duration::ZERO,
            max_parallel: 2,
            bus_capacity: 0,
            ..RunnerConfig::default()
        };
        assert_eq!(cfg.effective_global_timeout(), DEFAULT_GLOBAL_TIMEOUT);
        assert_eq!(cfg.effective_task_timeout(), DEFAULT_TASK_TIMEOUT);
        assert_eq!(cfg.parallel_limit(), Some(2));
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }

    #[test]
    fn test_task_timeout_resolution() {
        let cfg = RunnerConfig {
            task_timeout: Duration::from_millis(250),
            ..RunnerConfig::default()
        };
        assert_eq!(cfg.task_timeout_for(None), Duration::from_millis(250));
        assert_eq!(cfg.task_timeout_for(Some(Duration::ZERO)), Duration::from_millis(250));
        assert_eq!(
            cfg.task_timeout_for(Some(Duration::from_millis(40))),
            Duration::from_millis(40)
        );
    }
}
