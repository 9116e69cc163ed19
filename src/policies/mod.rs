//! Run-level policies.
//!
//! This module groups the knobs that control **how failures propagate**
//! from tasks to the whole run.
//!
//! ## Contents
//! - [`FailStrategy`] whether a failed stage halts the run (any one / every one)
//!
//! ## Quick wiring
//! ```text
//! RunnerConfig { fail_strategy: FailStrategy, .. }
//!      └─► core::runner::Runner uses:
//!           - halts_on_stage_error() after each failed stage
//!           - EveryOne to decide AllFailed when the queue is drained
//! ```
//!
//! Tasks are never retried: a failed task is terminal.

mod fail;

pub use fail::FailStrategy;
