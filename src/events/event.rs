//! # Runtime events emitted by the runner.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Run events**: whole-run flow (starting, finished, failed, runner timeout)
//! - **Stage events**: one parallel stage (starting, finished, failed)
//! - **Task events**: one task (starting, stopped, failed, timeout, aborted)
//!
//! The [`Event`] struct carries additional metadata such as timestamps, task id,
//! stage ordinal, reasons and measured cost.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use stagevisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TaskFailed)
//!     .with_task("2_1")
//!     .with_stage(2)
//!     .with_reason("boom")
//!     .with_cost(Duration::from_millis(12));
//!
//! assert_eq!(ev.kind, EventKind::TaskFailed);
//! assert_eq!(ev.task.as_deref(), Some("2_1"));
//! assert_eq!(ev.cost_ms, Some(12));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `task`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `task`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Run events ===
    /// `run()` started driving the queue.
    ///
    /// Sets:
    /// - `timeout_ms`: global timeout
    RunStarting,

    /// Run reached the terminal `end` state.
    ///
    /// Sets:
    /// - `cost_ms`: global elapsed time
    RunFinished,

    /// Run reached the terminal `fail` state.
    ///
    /// Sets:
    /// - `reason`: the single surfaced error message
    /// - `cost_ms`: global elapsed time
    RunFailed,

    /// Global elapsed time was found above the global timeout.
    ///
    /// Sets:
    /// - `stage`: stage ordinal being driven
    /// - `task`: the task whose completion revealed the overrun
    /// - `timeout_ms`: global timeout
    /// - `cost_ms`: global elapsed time
    RunnerTimeout,

    // === Stage events ===
    /// A stage is about to start its tasks.
    ///
    /// Sets:
    /// - `stage`: stage ordinal (1-based)
    StageStarting,

    /// Every task of the stage ended.
    ///
    /// Sets:
    /// - `stage`: stage ordinal
    StageFinished,

    /// The stage settled with a recorded error.
    ///
    /// Sets:
    /// - `stage`: stage ordinal
    /// - `reason`: first recorded error
    StageFailed,

    // === Task lifecycle events ===
    /// Task moved to `running`.
    ///
    /// Sets:
    /// - `task`: task id
    /// - `stage`: stage ordinal
    /// - `timeout_ms`: per-task timeout (absent when disabled)
    TaskStarting,

    /// Task ended successfully.
    ///
    /// Sets:
    /// - `task`, `stage`
    /// - `cost_ms`: measured cost
    TaskStopped,

    /// Task failed (own error, timeout or abort).
    ///
    /// Sets:
    /// - `task`, `stage`
    /// - `reason`: prefixed failure message
    /// - `cost_ms`: measured cost
    TaskFailed,

    /// Task exceeded its own timeout (always followed by `TaskFailed`).
    ///
    /// Sets:
    /// - `task`, `stage`
    /// - `timeout_ms`: per-task timeout
    TimeoutHit,

    /// Task was aborted by a sibling failure or the runner timeout
    /// (always followed by `TaskFailed`).
    ///
    /// Sets:
    /// - `task`, `stage`
    TaskAborted,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Stage ordinal (1-based), if applicable.
    pub stage: Option<u32>,
    /// Task id (`"{stage}_{index}"`) or subscriber name.
    pub task: Option<Arc<str>>,
    /// Timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Measured cost in milliseconds (compact).
    pub cost_ms: Option<u32>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            stage: None,
            task: None,
            timeout_ms: None,
            cost_ms: None,
            reason: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a task id (or subscriber name).
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a stage ordinal.
    #[inline]
    pub fn with_stage(mut self, stage: u32) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a measured cost (stored as milliseconds).
    #[inline]
    pub fn with_cost(mut self, d: Duration) -> Self {
        self.cost_ms = Some(compact_ms(d));
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    #[inline]
    pub fn is_subscriber_panic(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberPanicked)
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}
