//! # stagevisor
//!
//! **Stagevisor** is a staged async task runner for Rust.
//!
//! Tasks are grouped into ordered **stages**. Tasks within a stage run
//! concurrently; stages run strictly one after another, each receiving the
//! results of the stage before it. Every task races a per-task timer and an
//! abort signal, and the whole run is bounded by a global time budget
//! (typically the deadline of a request being served).
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   runner.add(task)          runner.add(vec![a, b, c])        runner.add(task)
//!         │                             │                             │
//!         ▼                             ▼                             ▼
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │  Runner (stage queue, shared context, global clock, FailStrategy)         │
//! │   stage 1: [1_1]  ──►  stage 2: [2_1, 2_2, 2_3]  ──►  stage 3: [3_1]      │
//! │            results ───────────►         results ────────────►             │
//! └──────┬──────────────────────────────┬─────────────────────────────────────┘
//!        ▼                              ▼
//!   run_stage (JoinSet)           first-error slot + cascade abort
//!        │
//!        ├─► run_task(2_1): run fn ─┬─ per-task timer
//!        ├─► run_task(2_2): run fn ─┼─ AbortSignal
//!        └─► run_task(2_3): run fn ─┘
//!        │
//!        │ Publishes: TaskStarting / TaskStopped / TaskFailed / TimeoutHit / TaskAborted
//!        ▼
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                            │
//! │                  (capacity: RunnerConfig::bus_capacity)                   │
//! └─────────────────────────────────┬─────────────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber listener   │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                          ┌────────┼─────────┐
//!                          ▼        ▼         ▼
//!                      worker1   worker2   workerN
//! ```
//!
//! ### Failure handling
//! ```text
//! task fails / times out ──► abort every sibling still init|running
//!                            └─► first error of the stage is recorded
//!
//! stage failed:
//!   ├─ FailStrategy::AnyOne   ─► run fails with the task error ("Task 2_2: Aborted")
//!   └─ FailStrategy::EveryOne ─► next stage runs; the run fails only if
//!                                every task failed ("Every task is failed")
//!
//! task succeeds after the global budget ─► "Runner Timeout: {ms}ms", fatal for both strategies
//! ```
//!
//! ## Features
//! | Area              | Description                                                      | Key types / traits                          |
//! |-------------------|------------------------------------------------------------------|---------------------------------------------|
//! | **Runner**        | Stage queue, drive loop, statistics, teardown.                   | [`Runner`], [`RunnerBuilder`]               |
//! | **Tasks**         | Define tasks as async or sync closures, with optional timeouts.  | [`TaskRef`], [`TaskFn`], [`SyncTaskFn`], [`TaskSpec`] |
//! | **Cancellation**  | Per-task abort signal with observers.                            | [`AbortSignal`]                             |
//! | **Policies**      | Decide what a failed stage means for the run.                    | [`FailStrategy`]                            |
//! | **Subscriber API**| Hook into run, stage and task lifecycle events.                  | [`Subscribe`], [`Event`]                    |
//! | **Errors**        | Typed errors with stable messages.                               | [`TaskError`], [`RuntimeError`]             |
//! | **Configuration** | Timeouts, strategy, manual driving, concurrency.                 | [`RunnerConfig`]                            |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use stagevisor::{AbortSignal, Runner, RunnerConfig, TaskError, TaskFn, TaskRef, TaskSpec};
//!
//! #[derive(Default)]
//! struct Request {
//!     user: String,
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Build subscribers (optional)
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn stagevisor::Subscribe>> = vec![Arc::new(stagevisor::LogWriter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn stagevisor::Subscribe>> = Vec::new();
//!
//!     let ctx = Request { user: "alice".into() };
//!     let mut runner: Runner<Request, String> = Runner::<Request, String>::builder(RunnerConfig::default(), ctx)
//!         .with_subscribers(subs)
//!         .build();
//!
//!     let lookup: TaskRef<Request, String> =
//!         TaskFn::arc(|req: Arc<Request>, _prev: Arc<[Option<String>]>, signal: AbortSignal| async move {
//!             if signal.is_aborted() {
//!                 return Err(TaskError::Aborted);
//!             }
//!             Ok(format!("profile:{}", req.user))
//!         });
//!     let render: TaskRef<Request, String> =
//!         TaskFn::arc(|_req: Arc<Request>, prev: Arc<[Option<String>]>, _signal: AbortSignal| async move {
//!             Ok(format!("<p>{}</p>", prev[0].as_deref().unwrap_or("-")))
//!         });
//!
//!     runner
//!         .add(TaskSpec::new(lookup).with_timeout(Duration::from_millis(500)))
//!         .add(render);
//!     runner.run().await?;
//!
//!     assert_eq!(runner.results(1), Some(vec![Some("<p>profile:alice</p>".to_string())]));
//!     runner.close().await;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod policies;
mod signal;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use core::{Runner, RunnerBuilder, RunnerConfig, RunnerState};
pub use error::{RuntimeError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use policies::FailStrategy;
pub use signal::AbortSignal;
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{
    BoxTaskFuture, IntoStage, SyncTaskFn, Task, TaskFn, TaskId, TaskRef, TaskSpec, TaskState,
    TaskStats,
};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
