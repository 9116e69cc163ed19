//! # Execute a single task.
//!
//! Runs one [`TaskEntry`] to completion and publishes its lifecycle events to the [`Bus`].
//!
//! - **Start at most once**: a task whose state is not `init` is skipped
//! - **Race three outcomes**: run function vs per-task timer vs abort signal
//! - **Record the outcome** on the entry (state, cost, result or prefixed error)
//!
//! ## Event flow
//!
//! ```text
//! Success:
//!   TaskStarting → task.spawn() → Ok(value) → TaskStopped
//!
//! Failure:
//!   TaskStarting → task.spawn() → Err(e) / panic → TaskFailed
//!
//! Timeout:
//!   TaskStarting → timer fires → TimeoutHit → TaskFailed ("Task {id}: Timeout {ms}ms")
//!
//! Abort:
//!   TaskStarting → signal fired → TaskAborted → TaskFailed ("Task {id}: Aborted")
//! ```
//!
//! ## Rules
//! - Already-aborted signal at start: fails immediately with `Aborted`, run function never called
//! - Whichever outcome settles first wins; the losers are dropped (timer disarmed, work dropped)
//! - A panic in the run function is converted into `TaskError::Fail` with the panic message
//! - Always publishes **exactly one** terminal event per started task

use std::future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::time;

use crate::core::entry::TaskEntry;
use crate::error::{RuntimeError, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::signal::AbortSignal;
use crate::subscribers::panic_message;
use crate::tasks::{BoxTaskFuture, Task};

/// Executes `entry` once, recording its outcome on the entry.
///
/// ### Flow
/// 1. Wait for a stage permit (if `limiter` is set); an abort ends the wait
/// 2. Move `init → running`, or return `None` if the task was already started
/// 3. Race the run function against the timer and the signal
/// 4. Settle the entry and publish the terminal event
///
/// Returns `Some(Ok(()))` on success, `Some(Err(e))` with the id-prefixed
/// error on failure, `None` if the task was skipped.
pub(crate) async fn run_task<C, T>(
    entry: &TaskEntry<C, T>,
    ctx: Arc<C>,
    previous: Arc<[Option<T>]>,
    limiter: Option<Arc<Semaphore>>,
    bus: &Bus,
) -> Option<Result<(), RuntimeError>>
where
    C: Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    let _permit = match limiter {
        Some(sem) => {
            tokio::select! {
                permit = sem.acquire_owned() => permit.ok(),
                _ = entry.signal.aborted() => None,
            }
        }
        None => None,
    };

    if !entry.begin() {
        return None;
    }
    publish_starting(bus, entry);

    let res = if entry.signal.is_aborted() {
        Err(TaskError::Aborted)
    } else {
        race(entry, ctx, previous).await
    };

    match &res {
        Err(TaskError::Timeout { timeout }) => {
            bus.publish(task_event(EventKind::TimeoutHit, entry).with_timeout(*timeout));
        }
        Err(TaskError::Aborted) => {
            bus.publish(task_event(EventKind::TaskAborted, entry));
        }
        _ => {}
    }

    let res = res.map_err(|source| RuntimeError::Task {
        id: entry.id,
        source,
    });
    let outcome = match res {
        Ok(value) => {
            let cost = entry.settle(Ok(value));
            bus.publish(task_event(EventKind::TaskStopped, entry).with_cost(cost));
            Ok(())
        }
        Err(err) => {
            let cost = entry.settle(Err(err.clone()));
            bus.publish(
                task_event(EventKind::TaskFailed, entry)
                    .with_reason(err.to_string())
                    .with_cost(cost),
            );
            Err(err)
        }
    };
    Some(outcome)
}

/// Races the run function against the per-task timer and the abort signal.
async fn race<C, T>(
    entry: &TaskEntry<C, T>,
    ctx: Arc<C>,
    previous: Arc<[Option<T>]>,
) -> Result<T, TaskError>
where
    C: Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    let work = guarded(entry.task.as_ref(), ctx, previous, entry.signal.clone());
    let timed = async {
        time::timeout(entry.timeout, work)
            .await
            .unwrap_or(Err(TaskError::Timeout {
                timeout: entry.timeout,
            }))
    };

    tokio::select! {
        biased;
        res = timed => res,
        _ = entry.signal.aborted() => Err(TaskError::Aborted),
    }
}

/// Calls `task.spawn` and converts panics (while building or polling the future) into failures.
fn guarded<C, T>(
    task: &dyn Task<C, T>,
    ctx: Arc<C>,
    previous: Arc<[Option<T>]>,
    signal: AbortSignal,
) -> BoxTaskFuture<T>
where
    C: Send + Sync + 'static,
    T: Send + 'static,
{
    match std::panic::catch_unwind(AssertUnwindSafe(|| task.spawn(ctx, previous, signal))) {
        Ok(fut) => Box::pin(AssertUnwindSafe(fut).catch_unwind().map(|res| {
            res.unwrap_or_else(|panic| Err(TaskError::fail(panic_message(&*panic))))
        })),
        Err(panic) => Box::pin(future::ready(Err(TaskError::fail(panic_message(
            &*panic,
        ))))),
    }
}

fn task_event<C, T>(kind: EventKind, entry: &TaskEntry<C, T>) -> Event {
    Event::new(kind)
        .with_task(entry.id.to_string())
        .with_stage(entry.id.stage)
}

fn publish_starting<C, T>(bus: &Bus, entry: &TaskEntry<C, T>) {
    bus.publish(task_event(EventKind::TaskStarting, entry).with_timeout(entry.timeout));
}
