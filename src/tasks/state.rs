//! # Task identity, state and statistics.
//!
//! - [`TaskId`]: `"{stage}_{index}"`, both 1-based, fixed when the task is added.
//! - [`TaskState`]: `init → running → end | fail`, never re-entered.
//! - [`TaskStats`]: per-task row returned by [`Runner::stats`](crate::Runner::stats).

use std::fmt;
use std::time::Duration;

/// Identifier of a task within a runner.
///
/// `stage` is the 1-based ordinal of the stage at the moment it was added,
/// `index` the 1-based position of the task inside that stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId {
    /// 1-based stage ordinal.
    pub stage: u32,
    /// 1-based position within the stage.
    pub index: u32,
}

impl TaskId {
    /// Creates an id from its 1-based components.
    pub const fn new(stage: u32, index: u32) -> Self {
        Self { stage, index }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.stage, self.index)
    }
}

/// Execution state shared by tasks and the runner.
///
/// Moves forward only; `End` and `Fail` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskState {
    /// Created, not started.
    #[default]
    Init,
    /// Executing.
    Running,
    /// Completed successfully.
    End,
    /// Failed (own error, timeout, or abort).
    Fail,
}

impl TaskState {
    /// Returns the lowercase name (`"init"`, `"running"`, `"end"`, `"fail"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Init => "init",
            TaskState::Running => "running",
            TaskState::End => "end",
            TaskState::Fail => "fail",
        }
    }

    /// True for `End` and `Fail`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::End | TaskState::Fail)
    }

    /// True while the task may still be cancelled (`Init` or `Running`).
    pub fn is_pending(&self) -> bool {
        matches!(self, TaskState::Init | TaskState::Running)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statistics row for one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStats {
    /// Task id.
    pub id: TaskId,
    /// Elapsed wall time; `None` until measured.
    pub cost: Option<Duration>,
    /// Current state.
    pub state: TaskState,
    /// Failure message (`"Task {id}: {cause}"`), absent on success.
    pub error_message: Option<String>,
}
