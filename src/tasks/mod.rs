//! # Task abstractions and descriptors.
//!
//! This module provides the core task-related types:
//! - [`Task`] - trait for implementing abortable tasks
//! - [`TaskFn`] / [`SyncTaskFn`] - function-based task implementations
//! - [`TaskRef`] - shared reference to a task (`Arc<dyn Task>`)
//! - [`TaskSpec`] - descriptor bundling a task with its timeout
//! - [`IntoStage`] - one descriptor or a list of them, as accepted by `Runner::add`
//! - [`TaskId`], [`TaskState`], [`TaskStats`] - identity and bookkeeping

mod spec;
mod state;
mod task;
mod task_fn;

pub use spec::{IntoStage, TaskSpec};
pub use state::{TaskId, TaskState, TaskStats};
pub use task::{BoxTaskFuture, Task, TaskRef};
pub use task_fn::{SyncTaskFn, TaskFn};
