//! # Task descriptors and stage composition.
//!
//! A task descriptor is either a bare [`TaskRef`] (inherits the runner's
//! default per-task timeout) or a [`TaskSpec`] with an explicit timeout.
//!
//! [`IntoStage`] lets [`Runner::add`](crate::Runner::add) accept one descriptor
//! (a single-task stage) or a `Vec` of descriptors (a parallel stage).
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use stagevisor::{AbortSignal, IntoStage, SyncTaskFn, TaskRef, TaskSpec};
//!
//! let noop: TaskRef<(), ()> = SyncTaskFn::arc(|_: Arc<()>, _: Arc<[Option<()>]>, _: AbortSignal| Ok(()));
//!
//! let spec = TaskSpec::new(noop.clone()).with_timeout(Duration::from_millis(200));
//! assert_eq!(spec.timeout(), Some(Duration::from_millis(200)));
//!
//! let stage = vec![spec, TaskSpec::from(noop)].into_stage();
//! assert_eq!(stage.len(), 2);
//! ```

use std::time::Duration;

use crate::tasks::task::TaskRef;

/// Task descriptor: the task plus an optional per-task timeout override.
pub struct TaskSpec<C, T> {
    task: TaskRef<C, T>,
    timeout: Option<Duration>,
}

impl<C, T> TaskSpec<C, T> {
    /// Creates a descriptor that inherits the runner's default timeout.
    pub fn new(task: TaskRef<C, T>) -> Self {
        Self {
            task,
            timeout: None,
        }
    }

    /// Returns a new spec with an explicit per-task timeout.
    ///
    /// `Duration::ZERO` counts as not set: the runner's default timeout applies.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns reference to the task.
    pub fn task(&self) -> &TaskRef<C, T> {
        &self.task
    }

    /// Returns the timeout override, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub(crate) fn into_parts(self) -> (TaskRef<C, T>, Option<Duration>) {
        (self.task, self.timeout)
    }
}

impl<C, T> Clone for TaskSpec<C, T> {
    fn clone(&self) -> Self {
        Self {
            task: self.task.clone(),
            timeout: self.timeout,
        }
    }
}

impl<C, T> From<TaskRef<C, T>> for TaskSpec<C, T> {
    fn from(task: TaskRef<C, T>) -> Self {
        Self::new(task)
    }
}

/// Conversion into the ordered descriptors of one stage.
pub trait IntoStage<C, T> {
    /// Returns the stage's descriptors in execution-slot order.
    fn into_stage(self) -> Vec<TaskSpec<C, T>>;
}

impl<C, T> IntoStage<C, T> for TaskSpec<C, T> {
    fn into_stage(self) -> Vec<TaskSpec<C, T>> {
        vec![self]
    }
}

impl<C, T> IntoStage<C, T> for TaskRef<C, T> {
    fn into_stage(self) -> Vec<TaskSpec<C, T>> {
        vec![TaskSpec::new(self)]
    }
}

impl<C, T> IntoStage<C, T> for Vec<TaskSpec<C, T>> {
    fn into_stage(self) -> Vec<TaskSpec<C, T>> {
        self
    }
}

impl<C, T> IntoStage<C, T> for Vec<TaskRef<C, T>> {
    fn into_stage(self) -> Vec<TaskSpec<C, T>> {
        self.into_iter().map(TaskSpec::new).collect()
    }
}
