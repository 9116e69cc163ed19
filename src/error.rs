//! Errors of tasks and runs.
//!
//! - [`TaskError`]: why one task did not produce a value (its own failure,
//!   its timer, or an abort).
//! - [`RuntimeError`]: why a run ended in `fail`. Task causes are wrapped with
//!   the task id; the runner timeout and the all-failed outcome are not.
//!
//! `as_label()` on both gives a stable snake_case tag for logs.
//!
//! ## Message format
//! ```text
//! TaskError::Timeout { 1s }          → "Timeout 1000ms"
//! TaskError::Aborted                 → "Aborted"
//! TaskError::Fail { "boom" }         → "boom"
//! RuntimeError::Task { 2_1, .. }     → "Task 2_1: <task error>"
//! RuntimeError::RunnerTimeout { 1s } → "Runner Timeout: 1000ms"
//! RuntimeError::AllFailed            → "Every task is failed"
//! ```

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::tasks::TaskId;

/// # Errors produced by task execution.
///
/// A failed task is terminal; there is no retry.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Task execution exceeded its own per-task timeout.
    #[error("Timeout {}ms", .timeout.as_millis())]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Task was cancelled: a sibling failed or the whole-run timeout was detected.
    #[error("Aborted")]
    Aborted,

    /// The run function returned an error (or panicked).
    #[error("{error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },
}

impl TaskError {
    /// Builds a [`TaskError::Fail`] from anything printable.
    ///
    /// # Example
    /// ```
    /// use stagevisor::TaskError;
    ///
    /// let err = TaskError::fail("connection refused");
    /// assert_eq!(err.to_string(), "connection refused");
    /// ```
    pub fn fail(error: impl fmt::Display) -> Self {
        TaskError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use stagevisor::TaskError;
    /// use std::time::Duration;
    ///
    /// let err = TaskError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "task_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Timeout { .. } => "task_timeout",
            TaskError::Aborted => "task_aborted",
            TaskError::Fail { .. } => "task_failed",
        }
    }
}

impl From<String> for TaskError {
    fn from(error: String) -> Self {
        TaskError::Fail { error }
    }
}

impl From<&str> for TaskError {
    fn from(error: &str) -> Self {
        TaskError::Fail {
            error: error.to_string(),
        }
    }
}

/// # Outcome errors of a run.
///
/// Exactly one of these is surfaced by [`Runner::run`](crate::Runner::run)
/// when the run terminates in `fail`.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// A task failed; the message is prefixed with the task id.
    #[error("Task {id}: {source}")]
    Task {
        /// Id of the failed task.
        id: TaskId,
        /// What the task hit.
        #[source]
        source: TaskError,
    },

    /// Whole-run elapsed time exceeded the global budget.
    ///
    /// Not task-scoped and always fatal, whatever the fail strategy.
    #[error("Runner Timeout: {}ms", .timeout.as_millis())]
    RunnerTimeout {
        /// The configured global timeout.
        timeout: Duration,
    },

    /// Every task of every stage ended in `fail` (only under `EveryOne`).
    #[error("Every task is failed")]
    AllFailed,
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use stagevisor::RuntimeError;
    ///
    /// assert_eq!(RuntimeError::AllFailed.as_label(), "runtime_all_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Task { source, .. } => source.as_label(),
            RuntimeError::RunnerTimeout { .. } => "runtime_runner_timeout",
            RuntimeError::AllFailed => "runtime_all_failed",
        }
    }

    /// Returns the task-scoped cause, if this error belongs to a task.
    pub fn task_error(&self) -> Option<&TaskError> {
        match self {
            RuntimeError::Task { source, .. } => Some(source),
            _ => None,
        }
    }

    /// True for the whole-run timeout.
    pub fn is_runner_timeout(&self) -> bool {
        matches!(self, RuntimeError::RunnerTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_messages() {
        let timeout = TaskError::Timeout {
            timeout: Duration::from_millis(1000),
        };
        assert_eq!(timeout.to_string(), "Timeout 1000ms");
        assert_eq!(TaskError::Aborted.to_string(), "Aborted");
        assert_eq!(TaskError::from("some wrong").to_string(), "some wrong");
    }

    #[test]
    fn test_task_scoped_error_is_prefixed() {
        let err = RuntimeError::Task {
            id: TaskId::new(2, 2),
            source: TaskError::Aborted,
        };
        assert_eq!(err.to_string(), "Task 2_2: Aborted");
        assert_eq!(err.as_label(), "task_aborted");
        assert_eq!(err.task_error(), Some(&TaskError::Aborted));
    }

    #[test]
    fn test_runner_errors_are_not_prefixed() {
        let err = RuntimeError::RunnerTimeout {
            timeout: Duration::from_millis(1000),
        };
        assert_eq!(err.to_string(), "Runner Timeout: 1000ms");
        assert!(err.is_runner_timeout());
        assert!(err.task_error().is_none());
        assert_eq!(RuntimeError::AllFailed.to_string(), "Every task is failed");
    }
}
