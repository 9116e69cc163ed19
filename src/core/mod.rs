//! Runtime core: the staged runner.
//!
//! The public API from this module is [`Runner`] (with [`RunnerBuilder`],
//! [`RunnerConfig`] and [`RunnerState`]); everything else is internal.
//!
//! Internal modules:
//! - [`runner`]: drives the stage queue, applies the failure strategy;
//! - [`stage`]: runs one stage concurrently, records the first error, cascades aborts;
//! - [`execute`]: runs one task against its timer and abort signal, publishes task events;
//! - [`entry`]: per-task record (state, cost, result, error);
//! - [`config`]: construction options;
//! - [`builder`]: wires subscribers to the event bus.

mod builder;
mod config;
mod entry;
mod execute;
mod runner;
mod stage;

pub use builder::RunnerBuilder;
pub use config::RunnerConfig;
pub use runner::{Runner, RunnerState};
