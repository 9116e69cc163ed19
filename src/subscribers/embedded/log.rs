//! # LogWriter: run event logger
//!
//! A minimal subscriber that writes incoming [`Event`]s through `tracing`.
//! Failures and timeouts are logged at `warn`, the rest at `info`/`debug`.
//!
//! ## Example output
//! ```text
//! INFO  [run-starting] timeout_ms=3000
//! DEBUG [task-starting] task="2_1" timeout_ms=2800
//! WARN  [task-aborted] task="2_2"
//! WARN  [task-failed] task="2_2" err="Task 2_2: Aborted" cost_ms=1001
//! WARN  [runner-timeout] stage=2 timeout_ms=1000 cost_ms=1001
//! WARN  [run-failed] err="Runner Timeout: 1000ms" cost_ms=1001
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::RunStarting => {
                info!(timeout_ms = ?e.timeout_ms, "[run-starting]");
            }
            EventKind::RunFinished => {
                info!(cost_ms = ?e.cost_ms, "[run-finished]");
            }
            EventKind::RunFailed => {
                warn!(err = reason, cost_ms = ?e.cost_ms, "[run-failed]");
            }
            EventKind::RunnerTimeout => {
                warn!(stage = ?e.stage, task, timeout_ms = ?e.timeout_ms, cost_ms = ?e.cost_ms, "[runner-timeout]");
            }
            EventKind::StageStarting => {
                debug!(stage = ?e.stage, "[stage-starting]");
            }
            EventKind::StageFinished => {
                debug!(stage = ?e.stage, "[stage-finished]");
            }
            EventKind::StageFailed => {
                warn!(stage = ?e.stage, err = reason, "[stage-failed]");
            }
            EventKind::TaskStarting => {
                debug!(task, timeout_ms = ?e.timeout_ms, "[task-starting]");
            }
            EventKind::TaskStopped => {
                debug!(task, cost_ms = ?e.cost_ms, "[task-stopped]");
            }
            EventKind::TaskFailed => {
                warn!(task, err = reason, cost_ms = ?e.cost_ms, "[task-failed]");
            }
            EventKind::TimeoutHit => {
                warn!(task, timeout_ms = ?e.timeout_ms, "[timeout]");
            }
            EventKind::TaskAborted => {
                warn!(task, "[task-aborted]");
            }
            EventKind::SubscriberOverflow => {
                warn!(subscriber = task, reason, "[subscriber-overflow]");
            }
            EventKind::SubscriberPanicked => {
                warn!(subscriber = task, info = reason, "[subscriber-panicked]");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
