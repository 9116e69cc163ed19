//! # Task abstraction.
//!
//! This module defines the [`Task`] trait: a run function over the shared
//! context, the ordered results of the previous stage and the task's own
//! [`AbortSignal`]. The common handle type is [`TaskRef`], an `Arc<dyn Task>`
//! suitable for sharing across stages and runners.
//!
//! A task should watch its signal (`signal.aborted().await` or
//! `signal.on_abort(..)`) to release in-flight work when a sibling fails.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::TaskError;
use crate::signal::AbortSignal;

/// Boxed future returned by [`Task::spawn`].
pub type BoxTaskFuture<T> = Pin<Box<dyn Future<Output = Result<T, TaskError>> + Send + 'static>>;

/// Shared handle to a task.
pub type TaskRef<C, T> = Arc<dyn Task<C, T>>;

/// # Asynchronous, abortable unit of work.
///
/// `C` is the shared context type, `T` the value a task produces.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use stagevisor::{AbortSignal, BoxTaskFuture, Task, TaskError};
///
/// struct Double;
///
/// impl Task<(), u32> for Double {
///     fn spawn(&self, _ctx: Arc<()>, prev: Arc<[Option<u32>]>, _signal: AbortSignal) -> BoxTaskFuture<u32> {
///         let input = prev.first().copied().flatten().unwrap_or(1);
///         Box::pin(async move { Ok::<_, TaskError>(input * 2) })
///     }
/// }
/// ```
pub trait Task<C, T>: Send + Sync + 'static {
    /// Creates the future for one execution.
    ///
    /// - `ctx`: the runner's shared context (no locking is added by the runner)
    /// - `previous`: results of the preceding stage in `add` order (`None` for tasks that did not end)
    /// - `signal`: fired when the task must stop
    fn spawn(&self, ctx: Arc<C>, previous: Arc<[Option<T>]>, signal: AbortSignal)
        -> BoxTaskFuture<T>;
}
