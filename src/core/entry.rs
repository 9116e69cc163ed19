//! # Task entry: a queued task and its mutable execution record.
//!
//! A [`TaskEntry`] is created by `Runner::add` and owned by its stage. The
//! immutable half (id, timeout, run function, signal) is read freely; the
//! record (state, timing, result, error) sits behind a short-lived lock that is
//! never held across an `.await`.
//!
//! ## Rules
//! - `state` only moves `init → running → end | fail`.
//! - `result` is present iff `state == end`; `error` iff `state == fail`.
//! - `cost` is set exactly once, when the task settles.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::RuntimeError;
use crate::signal::AbortSignal;
use crate::tasks::{TaskId, TaskRef, TaskState, TaskStats};

struct TaskRecord<T> {
    state: TaskState,
    started_at: Option<Instant>,
    cost: Option<Duration>,
    result: Option<T>,
    error: Option<RuntimeError>,
}

/// One task slot of a stage.
pub(crate) struct TaskEntry<C, T> {
    pub(crate) id: TaskId,
    pub(crate) timeout: Duration,
    pub(crate) task: TaskRef<C, T>,
    pub(crate) signal: AbortSignal,
    record: Mutex<TaskRecord<T>>,
}

impl<C, T> TaskEntry<C, T> {
    pub(crate) fn new(id: TaskId, task: TaskRef<C, T>, timeout: Duration) -> Self {
        Self {
            id,
            timeout,
            task,
            signal: AbortSignal::new(),
            record: Mutex::new(TaskRecord {
                state: TaskState::Init,
                started_at: None,
                cost: None,
                result: None,
                error: None,
            }),
        }
    }

    pub(crate) fn state(&self) -> TaskState {
        self.record.lock().state
    }

    /// Moves `init → running` and starts the cost clock.
    ///
    /// Returns `false` (and changes nothing) if the task was already started.
    pub(crate) fn begin(&self) -> bool {
        let mut rec = self.record.lock();
        if rec.state != TaskState::Init {
            return false;
        }
        rec.state = TaskState::Running;
        rec.started_at = Some(Instant::now());
        true
    }

    /// Settles a running task and returns its measured cost.
    pub(crate) fn settle(&self, outcome: Result<T, RuntimeError>) -> Duration {
        let mut rec = self.record.lock();
        let cost = rec
            .started_at
            .map(|at| at.elapsed())
            .unwrap_or(Duration::ZERO);
        rec.cost = Some(cost);
        match outcome {
            Ok(value) => {
                rec.state = TaskState::End;
                rec.result = Some(value);
            }
            Err(err) => {
                rec.state = TaskState::Fail;
                rec.error = Some(err);
            }
        }
        cost
    }

    /// Fires the signal if the task has not settled yet.
    ///
    /// The check and the fire happen under the record lock so a sibling that
    /// is settling concurrently is either aborted or left untouched, never both.
    pub(crate) fn abort_if_pending(&self) -> bool {
        let rec = self.record.lock();
        if rec.state.is_pending() {
            self.signal.fire()
        } else {
            false
        }
    }

    pub(crate) fn stats(&self) -> TaskStats {
        let rec = self.record.lock();
        TaskStats {
            id: self.id,
            cost: rec.cost,
            state: rec.state,
            error_message: rec.error.as_ref().map(ToString::to_string),
        }
    }
}

impl<C, T: Clone> TaskEntry<C, T> {
    pub(crate) fn result(&self) -> Option<T> {
        self.record.lock().result.clone()
    }
}
