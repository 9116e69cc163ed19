//! # Run one stage: a set of tasks executed concurrently.
//!
//! A [`Stage`] is the ordered group of tasks created by one `Runner::add` call.
//! [`run_stage`] spawns every `init` task on a `JoinSet`, passing each the
//! shared context and the previous stage's results, then waits for all of
//! them to settle.
//!
//! ## Completion hook
//! ```text
//! task settles
//!   ├─ Err(e)  ──► lock slot ─► record e if slot empty ─► cascade-abort pending siblings
//!   └─ Ok      ──► elapsed = now - runner start
//!                  └─ elapsed > global_timeout:
//!                       lock slot ─► record RunnerTimeout if slot empty ─► cascade-abort
//! ```
//!
//! ## Rules
//! - **First error wins**: later failures and aborts never overwrite the recorded cause.
//! - Recording and the cascade sweep happen under one lock, atomically with respect
//!   to concurrent completions. The cause is recorded before any sibling's abort
//!   observers run.
//! - The global timeout is **sampled** when a task succeeds; there is no background timer.
//!   A stage whose tasks never settle can overrun the global budget until one of them does.
//! - The stage settles only after every task ended, failed or was aborted.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::core::entry::TaskEntry;
use crate::core::execute::run_task;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::tasks::{TaskState, TaskStats};

/// Ordered group of tasks added together.
pub(crate) struct Stage<C, T> {
    pub(crate) ordinal: u32,
    pub(crate) tasks: Vec<Arc<TaskEntry<C, T>>>,
}

impl<C, T> Stage<C, T> {
    pub(crate) fn stats(&self) -> Vec<TaskStats> {
        self.tasks
            .iter()
            .map(|t| {
                t.signal.clear_observers();
                t.stats()
            })
            .collect()
    }

    pub(crate) fn release_observers(&self) {
        for t in &self.tasks {
            t.signal.clear_observers();
        }
    }

    /// True when every task of the stage ended in `fail`.
    pub(crate) fn all_failed(&self) -> bool {
        self.tasks.iter().all(|t| t.state() == TaskState::Fail)
    }
}

impl<C, T: Clone> Stage<C, T> {
    /// Results in `add` order; `None` for tasks that did not end.
    pub(crate) fn results(&self) -> Arc<[Option<T>]> {
        self.tasks.iter().map(|t| t.result()).collect()
    }
}

/// Shared per-run-of-a-stage state: the siblings and the first-error slot.
struct StageControl<C, T> {
    ordinal: u32,
    tasks: Vec<Arc<TaskEntry<C, T>>>,
    error: Mutex<Option<RuntimeError>>,
    run_started_at: Instant,
    global_timeout: Duration,
    bus: Bus,
}

impl<C, T> StageControl<C, T> {
    /// Reacts to a settled task.
    fn on_finish(&self, finished: &TaskEntry<C, T>, outcome: Result<(), RuntimeError>) {
        match outcome {
            Err(err) => {
                let mut slot = self.error.lock();
                if slot.is_none() {
                    *slot = Some(err);
                }
                self.abort_siblings(finished);
            }
            Ok(()) => {
                let elapsed = self.run_started_at.elapsed();
                if elapsed <= self.global_timeout {
                    return;
                }
                let mut slot = self.error.lock();
                if slot.is_none() {
                    self.bus.publish(
                        Event::new(EventKind::RunnerTimeout)
                            .with_stage(self.ordinal)
                            .with_task(finished.id.to_string())
                            .with_timeout(self.global_timeout)
                            .with_cost(elapsed),
                    );
                    *slot = Some(RuntimeError::RunnerTimeout {
                        timeout: self.global_timeout,
                    });
                }
                self.abort_siblings(finished);
            }
        }
    }

    /// Fires the signal of every sibling still `init` or `running`.
    ///
    /// Skipped when the finished task was itself aborted: whoever aborted it already swept.
    fn abort_siblings(&self, finished: &TaskEntry<C, T>) {
        if finished.signal.is_aborted() {
            return;
        }
        for task in &self.tasks {
            task.abort_if_pending();
        }
    }
}

/// Drives every `init` task of `stage` concurrently and waits for all to settle.
///
/// Returns the first recorded error, if any.
pub(crate) async fn run_stage<C, T>(
    stage: &Stage<C, T>,
    ctx: &Arc<C>,
    previous: Arc<[Option<T>]>,
    run_started_at: Instant,
    global_timeout: Duration,
    parallel_limit: Option<usize>,
    bus: &Bus,
) -> Result<(), RuntimeError>
where
    C: Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    bus.publish(Event::new(EventKind::StageStarting).with_stage(stage.ordinal));

    let control = Arc::new(StageControl {
        ordinal: stage.ordinal,
        tasks: stage.tasks.clone(),
        error: Mutex::new(None),
        run_started_at,
        global_timeout,
        bus: bus.clone(),
    });
    let limiter = parallel_limit.map(|n| Arc::new(Semaphore::new(n)));

    let mut set = JoinSet::new();
    for entry in &stage.tasks {
        if entry.state() != TaskState::Init {
            continue;
        }
        let entry = Arc::clone(entry);
        let control = Arc::clone(&control);
        let ctx = Arc::clone(ctx);
        let previous = Arc::clone(&previous);
        let limiter = limiter.clone();
        let bus = bus.clone();

        set.spawn(async move {
            if let Some(outcome) = run_task(&entry, ctx, previous, limiter, &bus).await {
                control.on_finish(&entry, outcome);
            }
        });
    }
    while set.join_next().await.is_some() {}

    let recorded = control.error.lock().take();
    match recorded {
        Some(err) => {
            bus.publish(
                Event::new(EventKind::StageFailed)
                    .with_stage(stage.ordinal)
                    .with_reason(err.to_string()),
            );
            Err(err)
        }
        None => {
            bus.publish(Event::new(EventKind::StageFinished).with_stage(stage.ordinal));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::signal::AbortSignal;
    use crate::tasks::{SyncTaskFn, TaskFn, TaskId, TaskRef};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time;

    type Prev = Arc<[Option<u32>]>;

    fn sleeper(ms: u64, value: u32) -> TaskRef<(), u32> {
        TaskFn::arc(move |_c: Arc<()>, _p: Prev, _s: AbortSignal| async move {
            time::sleep(Duration::from_millis(ms)).await;
            Ok(value)
        })
    }

    fn failing(ms: u64) -> TaskRef<(), u32> {
        TaskFn::arc(move |_c: Arc<()>, _p: Prev, _s: AbortSignal| async move {
            time::sleep(Duration::from_millis(ms)).await;
            Err(TaskError::fail("boom"))
        })
    }

    fn stage(tasks: Vec<TaskRef<(), u32>>) -> Stage<(), u32> {
        Stage {
            ordinal: 1,
            tasks: tasks
                .into_iter()
                .enumerate()
                .map(|(i, t)| {
                    Arc::new(TaskEntry::new(
                        TaskId::new(1, i as u32 + 1),
                        t,
                        Duration::from_secs(5),
                    ))
                })
                .collect(),
        }
    }

    async fn drive(stage: &Stage<(), u32>, global: Duration) -> Result<(), RuntimeError> {
        run_stage(
            stage,
            &Arc::new(()),
            Arc::from(Vec::new()),
            Instant::now(),
            global,
            None,
            &Bus::new(64),
        )
        .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_succeed_results_in_order() {
        let st = stage(vec![sleeper(30, 1), sleeper(10, 2)]);
        assert_eq!(drive(&st, Duration::from_secs(1)).await, Ok(()));
        assert_eq!(&*st.results(), &[Some(1), Some(2)]);
        assert!(!st.all_failed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_aborts_siblings() {
        let st = stage(vec![failing(10), sleeper(500, 2)]);
        let err = drive(&st, Duration::from_secs(5)).await.expect_err("fails");
        assert_eq!(err.to_string(), "Task 1_1: boom");

        let stats = st.stats();
        assert_eq!(stats[1].state, TaskState::Fail);
        assert_eq!(stats[1].error_message.as_deref(), Some("Task 1_2: Aborted"));
        assert!(stats[1].cost.expect("cost") < Duration::from_millis(500));
        assert!(st.all_failed());
        assert_eq!(&*st.results(), &[None, None]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_abort_observer_keeps_first_error() {
        let fragile: TaskRef<(), u32> =
            TaskFn::arc(|_c: Arc<()>, _p: Prev, s: AbortSignal| async move {
                s.on_abort(|| panic!("observer failed"));
                time::sleep(Duration::from_millis(500)).await;
                Ok(2)
            });
        let st = stage(vec![failing(10), fragile]);

        let err = drive(&st, Duration::from_secs(5)).await.expect_err("fails");
        assert_eq!(err.to_string(), "Task 1_1: boom");

        let stats = st.stats();
        assert_eq!(stats[0].error_message.as_deref(), Some("Task 1_1: boom"));
        assert_eq!(stats[1].state, TaskState::Fail);
        assert_eq!(stats[1].error_message.as_deref(), Some("Task 1_2: Aborted"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_error_wins() {
        let st = stage(vec![failing(20), failing(10)]);
        let err = drive(&st, Duration::from_secs(5)).await.expect_err("fails");
        assert_eq!(err.to_string(), "Task 1_2: boom");
    }

    #[tokio::test(start_paused = true)]
    async fn test_global_timeout_sampled_on_success() {
        let st = stage(vec![sleeper(1, 1), sleeper(1001, 2), sleeper(2000, 3)]);
        let err = drive(&st, Duration::from_millis(1000))
            .await
            .expect_err("runner timeout");
        assert_eq!(err.to_string(), "Runner Timeout: 1000ms");

        let stats = st.stats();
        assert_eq!(stats[0].state, TaskState::End);
        assert_eq!(stats[1].state, TaskState::End);
        assert_eq!(stats[2].error_message.as_deref(), Some("Task 1_3: Aborted"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_global_timeout_not_detected_without_success() {
        // Only failures settle; the overrun is never sampled.
        let st = stage(vec![failing(1500)]);
        let err = drive(&st, Duration::from_millis(1000)).await.expect_err("fails");
        assert_eq!(err.to_string(), "Task 1_1: boom");
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_limit_queues_tasks() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let tracked = |running: Arc<AtomicUsize>, peak: Arc<AtomicUsize>| -> TaskRef<(), u32> {
            TaskFn::arc(move |_c: Arc<()>, _p: Prev, _s: AbortSignal| {
                let running = running.clone();
                let peak = peak.clone();
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    time::sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(0)
                }
            })
        };
        let st = stage(vec![
            tracked(running.clone(), peak.clone()),
            tracked(running.clone(), peak.clone()),
            tracked(running.clone(), peak.clone()),
        ]);

        let res = run_stage(
            &st,
            &Arc::new(()),
            Arc::from(Vec::new()),
            Instant::now(),
            Duration::from_secs(5),
            Some(1),
            &Bus::new(64),
        )
        .await;
        assert_eq!(res, Ok(()));
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_settled_tasks_are_not_rerun() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let task: TaskRef<(), u32> = SyncTaskFn::arc(move |_c: Arc<()>, _p: Prev, _s: AbortSignal| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        });
        let st = stage(vec![task]);
        drive(&st, Duration::from_secs(1)).await.expect("ok");
        drive(&st, Duration::from_secs(1)).await.expect("ok");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
