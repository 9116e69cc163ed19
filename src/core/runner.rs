//! # Runner: drives the stage queue.
//!
//! The [`Runner`] owns the queue of stages, the shared context, the global
//! clock and the failure policy. `run()` drives stages strictly in queue order,
//! feeding each stage the results of the one before it.
//!
//! ## State machine
//! ```text
//!   init ──run()──► running ──queue drained──► end
//!                      │    └─queue drained, EveryOne, no task ended──► fail (AllFailed)
//!                      ├──stage error, AnyOne──────────────────────────► fail (task error)
//!                      └──RunnerTimeout (any strategy)─────────────────► fail (RunnerTimeout)
//! ```
//!
//! ## Drive loop
//! ```text
//! loop {
//!   ├─► running_index += 1
//!   ├─► past the end?  → finalize (end / AllFailed) and return
//!   ├─► run_stage(queue[running_index], previous results)
//!   │       ├─ Ok                          → continue
//!   │       ├─ Err(RunnerTimeout)          → fail, return
//!   │       ├─ Err(task error) + AnyOne    → fail, return
//!   │       └─ Err(task error) + EveryOne  → swallow, continue
//!   └─► auto_next == false → return after this one stage
//! }
//! ```
//!
//! ## Rules
//! - Stages never overlap: a stage starts only after the previous one fully settled.
//! - `running_index` starts at `-1`; after a fully driven run it equals the number of stages.
//! - `end` and `fail` are terminal; `run()` on a terminal runner returns the recorded outcome.
//! - `run()` surfaces exactly one error: the first task error, the runner timeout, or `AllFailed`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::core::builder::RunnerBuilder;
use crate::core::config::RunnerConfig;
use crate::core::entry::TaskEntry;
use crate::core::stage::{run_stage, Stage};
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::policies::FailStrategy;
use crate::tasks::{IntoStage, TaskId, TaskStats};

/// Lifecycle state of a runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunnerState {
    /// No stage has run yet.
    #[default]
    Init,
    /// Driving stages.
    Running,
    /// Completed (under `EveryOne`: at least one task ended).
    End,
    /// Terminated by policy.
    Fail,
}

impl RunnerState {
    /// Returns the lowercase name (`"init"`, `"running"`, `"end"`, `"fail"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            RunnerState::Init => "init",
            RunnerState::Running => "running",
            RunnerState::End => "end",
            RunnerState::Fail => "fail",
        }
    }

    /// True for `End` and `Fail`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunnerState::End | RunnerState::Fail)
    }
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Staged task runner.
///
/// `C` is the shared context handed to every task, `T` the value tasks produce.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use stagevisor::{AbortSignal, Runner, RunnerConfig, RunnerState, SyncTaskFn, TaskFn, TaskRef};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), stagevisor::RuntimeError> {
/// let parse: TaskRef<(), u32> = SyncTaskFn::arc(|_: Arc<()>, _: Arc<[Option<u32>]>, _: AbortSignal| Ok(20));
/// let double: TaskRef<(), u32> = TaskFn::arc(|_: Arc<()>, prev: Arc<[Option<u32>]>, _: AbortSignal| async move {
///     Ok(prev[0].unwrap_or(0) * 2)
/// });
///
/// let mut runner: Runner<(), u32> = Runner::new(RunnerConfig::default(), ());
/// runner.add(parse).add(vec![double.clone(), double]);
/// runner.run().await?;
///
/// assert_eq!(runner.state(), RunnerState::End);
/// assert_eq!(runner.results(1), Some(vec![Some(40), Some(40)]));
/// # Ok(())
/// # }
/// ```
pub struct Runner<C, T> {
    cfg: RunnerConfig,
    context: Arc<C>,
    queue: Vec<Stage<C, T>>,
    started_at: Instant,
    state: RunnerState,
    running_index: isize,
    error: Option<RuntimeError>,
    bus: Bus,
    stop: CancellationToken,
    listener: Option<JoinHandle<()>>,
}

impl<C, T> Runner<C, T> {
    /// Creates a runner without subscribers.
    ///
    /// Does not require a Tokio runtime; use [`Runner::builder`] to attach subscribers.
    pub fn new(cfg: RunnerConfig, context: C) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        Self::from_parts(cfg, Arc::new(context), bus, CancellationToken::new(), None)
    }

    /// Creates a runner with a default context.
    pub fn with_config(cfg: RunnerConfig) -> Self
    where
        C: Default,
    {
        Self::new(cfg, C::default())
    }

    /// Returns a builder for a runner with subscribers or a pre-shared context.
    pub fn builder(cfg: RunnerConfig, context: C) -> RunnerBuilder<C> {
        RunnerBuilder::new(cfg, context)
    }

    pub(crate) fn from_parts(
        cfg: RunnerConfig,
        context: Arc<C>,
        bus: Bus,
        stop: CancellationToken,
        listener: Option<JoinHandle<()>>,
    ) -> Self {
        let started_at = cfg.start_time.unwrap_or_else(Instant::now);
        Self {
            cfg,
            context,
            queue: Vec::new(),
            started_at,
            state: RunnerState::Init,
            running_index: -1,
            error: None,
            bus,
            stop,
            listener,
        }
    }

    /// Appends a stage: one task descriptor or a list of them (run in parallel).
    ///
    /// Ids are assigned now: `"{stage}_{index}"`, both 1-based.
    /// Tasks without an explicit (non-zero) timeout inherit [`RunnerConfig::task_timeout`].
    pub fn add<S>(&mut self, stage: S) -> &mut Self
    where
        S: IntoStage<C, T>,
    {
        let ordinal = self.queue.len() as u32 + 1;
        let tasks = stage
            .into_stage()
            .into_iter()
            .enumerate()
            .map(|(i, spec)| {
                let (task, own) = spec.into_parts();
                let timeout = self.cfg.task_timeout_for(own);
                Arc::new(TaskEntry::new(TaskId::new(ordinal, i as u32 + 1), task, timeout))
            })
            .collect();

        self.queue.push(Stage { ordinal, tasks });
        self
    }

    /// Per-stage, per-task statistics in `add` order.
    ///
    /// Also releases every task's pending abort observers.
    pub fn stats(&self) -> Vec<Vec<TaskStats>> {
        self.queue.iter().map(Stage::stats).collect()
    }

    /// Releases all abort-observer registrations and detaches subscribers.
    ///
    /// Does not change [`state`](Runner::state). Idempotent; also called on drop.
    /// Subscribers still receive the events published before this call.
    pub fn destroy(&mut self) {
        for stage in &self.queue {
            stage.release_observers();
        }
        self.stop.cancel();
    }

    /// Destroys the runner and waits until subscribers processed the pending events.
    pub async fn close(mut self) {
        let listener = self.listener.take();
        self.destroy();
        if let Some(handle) = listener {
            let _ = handle.await;
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// Index of the stage currently or most recently driven (`-1` before the first).
    pub fn running_index(&self) -> isize {
        self.running_index
    }

    /// Number of stages in the queue.
    pub fn stage_count(&self) -> usize {
        self.queue.len()
    }

    /// The error the run failed with, if it did.
    pub fn error(&self) -> Option<&RuntimeError> {
        self.error.as_ref()
    }

    /// Shared context handed to every task.
    pub fn context(&self) -> &Arc<C> {
        &self.context
    }

    /// Global elapsed time, measured from the configured start time.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Runner configuration.
    pub fn config(&self) -> &RunnerConfig {
        &self.cfg
    }

    /// Whether every task of every stage ended in `fail` (vacuously true for an empty queue).
    fn every_task_failed(&self) -> bool {
        self.queue.iter().all(Stage::all_failed)
    }

    fn outcome(&self) -> Result<(), RuntimeError> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn finalize_end(&mut self) -> Result<(), RuntimeError> {
        if self.cfg.fail_strategy == FailStrategy::EveryOne && self.every_task_failed() {
            return self.finalize_fail(RuntimeError::AllFailed);
        }
        self.state = RunnerState::End;
        self.bus
            .publish(Event::new(EventKind::RunFinished).with_cost(self.elapsed()));
        Ok(())
    }

    fn finalize_fail(&mut self, err: RuntimeError) -> Result<(), RuntimeError> {
        self.state = RunnerState::Fail;
        self.bus.publish(
            Event::new(EventKind::RunFailed)
                .with_reason(err.to_string())
                .with_cost(self.elapsed()),
        );
        self.error = Some(err.clone());
        Err(err)
    }
}

impl<C, T> Runner<C, T>
where
    C: Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// Drives the queue.
    ///
    /// - `auto_next = true`: drives stages until the queue is drained or the run fails.
    /// - `auto_next = false`: drives exactly one stage; call again for the next one.
    ///
    /// Resolves `Ok(())` when the run ends (or pauses in `running`), and
    /// `Err` with the recorded error when it ends in `fail`.
    pub async fn run(&mut self) -> Result<(), RuntimeError> {
        match self.state {
            RunnerState::End | RunnerState::Fail => return self.outcome(),
            RunnerState::Running => {}
            RunnerState::Init => {
                self.state = RunnerState::Running;
                self.bus.publish(
                    Event::new(EventKind::RunStarting).with_timeout(self.cfg.effective_global_timeout()),
                );
            }
        }

        loop {
            self.running_index += 1;
            let index = self.running_index as usize;
            if index >= self.queue.len() {
                return self.finalize_end();
            }

            let previous = match index {
                0 => Arc::from(Vec::new()),
                _ => self.queue[index - 1].results(),
            };
            let res = run_stage(
                &self.queue[index],
                &self.context,
                previous,
                self.started_at,
                self.cfg.effective_global_timeout(),
                self.cfg.parallel_limit(),
                &self.bus,
            )
            .await;

            if let Err(err) = res {
                if err.is_runner_timeout() || self.cfg.fail_strategy.halts_on_stage_error() {
                    return self.finalize_fail(err);
                }
            }

            if !self.cfg.auto_next {
                return Ok(());
            }
        }
    }

    /// Results of the stage at `index` (0-based) in `add` order.
    ///
    /// `None` if there is no such stage; a slot is `None` for tasks that did not end.
    pub fn results(&self, index: usize) -> Option<Vec<Option<T>>> {
        self.queue.get(index).map(|s| s.results().to_vec())
    }
}

impl<C, T> Drop for Runner<C, T> {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::signal::AbortSignal;
    use crate::tasks::{SyncTaskFn, TaskFn, TaskRef, TaskSpec, TaskState};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time;

    type Prev = Arc<[Option<u32>]>;

    fn ok(value: u32) -> TaskRef<(), u32> {
        SyncTaskFn::arc(move |_c: Arc<()>, _p: Prev, _s: AbortSignal| Ok(value))
    }

    fn boom() -> TaskRef<(), u32> {
        SyncTaskFn::arc(|_c: Arc<()>, _p: Prev, _s: AbortSignal| Err(TaskError::fail("some wrong")))
    }

    fn counted(calls: Arc<AtomicUsize>) -> TaskRef<(), u32> {
        SyncTaskFn::arc(move |_c: Arc<()>, _p: Prev, _s: AbortSignal| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        })
    }

    fn cfg(strategy: FailStrategy) -> RunnerConfig {
        RunnerConfig {
            fail_strategy: strategy,
            ..RunnerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_empty_queue_ends() {
        let mut runner: Runner<(), u32> = Runner::new(
            RunnerConfig {
                auto_next: false,
                ..RunnerConfig::default()
            },
            (),
        );
        assert_eq!(runner.state(), RunnerState::Init);
        assert_eq!(runner.running_index(), -1);

        runner.run().await.expect("empty run ends");
        assert_eq!(runner.state(), RunnerState::End);
        assert_eq!(runner.running_index(), 0);
    }

    #[tokio::test]
    async fn test_ids_follow_add_order() {
        let mut runner: Runner<(), u32> = Runner::new(RunnerConfig::default(), ());
        runner.add(ok(1)).add(vec![ok(2), ok(3)]).add(vec![TaskSpec::new(ok(4))]);

        let ids: Vec<Vec<String>> = runner
            .stats()
            .iter()
            .map(|s| s.iter().map(|t| t.id.to_string()).collect())
            .collect();
        assert_eq!(ids, vec![vec!["1_1"], vec!["2_1", "2_2"], vec!["3_1"]]);
        assert_eq!(runner.stage_count(), 3);
        assert!(runner.stats()[0][0].cost.is_none());
    }

    #[tokio::test]
    async fn test_previous_results_flow_between_stages() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let collect: TaskRef<(), u32> =
            SyncTaskFn::arc(move |_c: Arc<()>, prev: Prev, _s: AbortSignal| {
                s.lock().push(prev.to_vec());
                Ok(0)
            });

        let mut runner: Runner<(), u32> = Runner::new(RunnerConfig::default(), ());
        runner
            .add(collect.clone())
            .add(vec![ok(1), ok(2)])
            .add(collect);
        runner.run().await.expect("ends");

        assert_eq!(*seen.lock(), vec![vec![], vec![Some(1), Some(2)]]);
        assert_eq!(runner.running_index(), 3);
    }

    #[tokio::test]
    async fn test_context_is_shared() {
        let ctx = Arc::new(AtomicUsize::new(0));
        let bump: TaskRef<AtomicUsize, ()> = SyncTaskFn::arc(
            |c: Arc<AtomicUsize>, _p: Arc<[Option<()>]>, _s: AbortSignal| {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        );
        let mut runner: Runner<AtomicUsize, ()> = RunnerBuilder::from_shared(RunnerConfig::default(), ctx.clone()).build();
        runner.add(bump.clone()).add(vec![bump.clone(), bump]);
        runner.run().await.expect("ends");

        assert!(Arc::ptr_eq(runner.context(), &ctx));
        assert_eq!(ctx.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_any_one_halts_on_first_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut runner: Runner<(), u32> = Runner::new(cfg(FailStrategy::AnyOne), ());
        runner.add(boom()).add(counted(calls.clone()));

        let err = runner.run().await.expect_err("fails");
        assert_eq!(err.to_string(), "Task 1_1: some wrong");
        assert_eq!(runner.state(), RunnerState::Fail);
        assert_eq!(runner.running_index(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(runner.stats()[1][0].state, TaskState::Init);
    }

    #[tokio::test]
    async fn test_every_one_continues_past_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut runner: Runner<(), u32> = Runner::new(cfg(FailStrategy::EveryOne), ());
        runner.add(boom()).add(counted(calls.clone()));

        runner.run().await.expect("one task ended");
        let stats = runner.stats();
        assert_eq!(stats[0][0].state, TaskState::Fail);
        assert_eq!(stats[1][0].state, TaskState::End);
        assert_eq!(runner.state(), RunnerState::End);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_every_one_all_failed() {
        let mut runner: Runner<(), u32> = Runner::new(cfg(FailStrategy::EveryOne), ());
        runner.add(boom()).add(boom());

        let err = runner.run().await.expect_err("all failed");
        assert_eq!(err, RuntimeError::AllFailed);
        assert_eq!(err.to_string(), "Every task is failed");
        assert_eq!(runner.state(), RunnerState::Fail);
        assert_eq!(runner.running_index(), 2);
    }

    #[tokio::test]
    async fn test_every_one_with_empty_queue_fails() {
        let mut runner: Runner<(), u32> = Runner::new(cfg(FailStrategy::EveryOne), ());
        assert_eq!(runner.run().await, Err(RuntimeError::AllFailed));
        assert_eq!(runner.state(), RunnerState::Fail);
        assert_eq!(runner.running_index(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runner_timeout_overrides_every_one() {
        let slow: TaskRef<(), u32> =
            TaskFn::arc(|_c: Arc<()>, _p: Prev, _s: AbortSignal| async move {
                time::sleep(Duration::from_millis(60)).await;
                Ok(1)
            });
        let calls = Arc::new(AtomicUsize::new(0));
        let mut runner: Runner<(), u32> = Runner::new(
            RunnerConfig {
                global_timeout: Duration::from_millis(50),
                fail_strategy: FailStrategy::EveryOne,
                ..RunnerConfig::default()
            },
            (),
        );
        runner.add(slow).add(counted(calls.clone()));

        let err = runner.run().await.expect_err("runner timeout");
        assert_eq!(err.to_string(), "Runner Timeout: 50ms");
        assert_eq!(runner.stats()[0][0].state, TaskState::End);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(runner.running_index(), 0);
    }

    #[tokio::test]
    async fn test_manual_driving_one_stage_per_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut runner: Runner<(), u32> = Runner::new(
            RunnerConfig {
                auto_next: false,
                ..RunnerConfig::default()
            },
            (),
        );
        runner.add(counted(calls.clone())).add(counted(calls.clone()));

        runner.run().await.expect("first stage");
        assert_eq!(runner.state(), RunnerState::Running);
        assert_eq!(runner.running_index(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        runner.run().await.expect("second stage");
        assert_eq!(runner.running_index(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        runner.run().await.expect("drained");
        assert_eq!(runner.state(), RunnerState::End);
        assert_eq!(runner.running_index(), 2);
    }

    #[tokio::test]
    async fn test_terminal_runner_replays_outcome() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut runner: Runner<(), u32> = Runner::new(cfg(FailStrategy::AnyOne), ());
        runner.add(boom()).add(counted(calls.clone()));

        let first = runner.run().await.expect_err("fails");
        let second = runner.run().await.expect_err("still failed");
        assert_eq!(first, second);
        assert_eq!(runner.error(), Some(&first));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stats_and_destroy_release_observers() {
        let parked = Arc::new(Mutex::new(Vec::new()));
        let p = parked.clone();
        let watch: TaskRef<(), u32> =
            SyncTaskFn::arc(move |_c: Arc<()>, _p: Prev, s: AbortSignal| {
                s.on_abort(|| {});
                p.lock().push(s);
                Ok(1)
            });

        let mut runner: Runner<(), u32> = Runner::new(RunnerConfig::default(), ());
        runner.add(watch.clone()).add(watch);
        runner.run().await.expect("ends");
        assert!(parked.lock().iter().all(|s| s.observer_count() == 1));

        let _ = runner.stats();
        assert!(parked.lock().iter().all(|s| s.observer_count() == 0));

        runner.destroy();
        runner.destroy();
        assert_eq!(runner.state(), RunnerState::End);
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_zero_timeout_uses_default() {
        let slow: TaskRef<(), u32> =
            TaskFn::arc(|_c: Arc<()>, _p: Prev, _s: AbortSignal| async move {
                time::sleep(Duration::from_millis(2000)).await;
                Ok(1)
            });
        let mut runner: Runner<(), u32> = Runner::new(
            RunnerConfig {
                global_timeout: Duration::from_secs(10),
                ..RunnerConfig::default()
            },
            (),
        );
        runner.add(TaskSpec::new(slow).with_timeout(Duration::ZERO));

        let err = runner.run().await.expect_err("times out at the default");
        assert_eq!(err.to_string(), "Task 1_1: Timeout 1000ms");
        let cost = runner.stats()[0][0].cost.expect("measured");
        assert!(cost >= Duration::from_millis(1000));
        assert!(cost < Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_task_timeout_uses_default() {
        let step: TaskRef<(), u32> =
            TaskFn::arc(|_c: Arc<()>, _p: Prev, _s: AbortSignal| async move {
                time::sleep(Duration::from_millis(1001)).await;
                Ok(1)
            });
        let mut runner: Runner<(), u32> = Runner::new(
            RunnerConfig {
                task_timeout: Duration::ZERO,
                ..RunnerConfig::default()
            },
            (),
        );
        runner.add(step);

        let err = runner.run().await.expect_err("times out at the default");
        assert_eq!(err.to_string(), "Task 1_1: Timeout 1000ms");
        assert_eq!(runner.running_index(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_global_timeout_uses_default() {
        let step: TaskRef<(), u32> =
            TaskFn::arc(|_c: Arc<()>, _p: Prev, _s: AbortSignal| async move {
                time::sleep(Duration::from_millis(1001)).await;
                Ok(1)
            });
        let mut runner: Runner<(), u32> = Runner::new(
            RunnerConfig {
                global_timeout: Duration::ZERO,
                task_timeout: Duration::from_millis(2000),
                ..RunnerConfig::default()
            },
            (),
        );
        runner.add(step.clone()).add(step.clone()).add(step);

        let err = runner.run().await.expect_err("runner timeout");
        assert_eq!(err.to_string(), "Runner Timeout: 3000ms");
        let stats = runner.stats();
        assert_eq!(stats[0][0].state, TaskState::End);
        assert_eq!(stats[1][0].state, TaskState::End);
        assert_eq!(stats[2][0].state, TaskState::End);
        assert_eq!(runner.running_index(), 2);
    }
}
