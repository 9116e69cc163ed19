//! # Function-backed tasks (`TaskFn`, `SyncTaskFn`)
//!
//! [`TaskFn`] wraps a closure `F: Fn(Arc<C>, Arc<[Option<T>]>, AbortSignal) -> Fut`,
//! producing a fresh future per execution.
//! [`SyncTaskFn`] wraps a closure that computes its value synchronously.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use stagevisor::{AbortSignal, SyncTaskFn, TaskError, TaskFn, TaskRef};
//!
//! let fetch: TaskRef<(), String> = TaskFn::arc(|_ctx: Arc<()>, _prev: Arc<[Option<String>]>, _signal: AbortSignal| async move {
//!     Ok::<_, TaskError>("rows".to_string())
//! });
//!
//! let format: TaskRef<(), String> = SyncTaskFn::arc(|_ctx: Arc<()>, prev: Arc<[Option<String>]>, _signal: AbortSignal| {
//!     Ok(format!("{} rows", prev.len()))
//! });
//! ```

use std::future::{self, Future};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::TaskError;
use crate::signal::AbortSignal;
use crate::tasks::task::{BoxTaskFuture, Task};

/// Function-backed asynchronous task.
pub struct TaskFn<F, C, T> {
    f: F,
    _marker: PhantomData<fn(Arc<C>) -> T>,
}

impl<F, C, T> TaskFn<F, C, T> {
    /// Creates a new function-backed task.
    ///
    /// Prefer [`TaskFn::arc`] when you immediately need a [`TaskRef`](crate::TaskRef).
    pub fn new<Fut>(f: F) -> Self
    where
        F: Fn(Arc<C>, Arc<[Option<T>]>, AbortSignal) -> Fut,
        Fut: Future<Output = Result<T, TaskError>>,
    {
        Self {
            f,
            _marker: PhantomData,
        }
    }

    /// Creates the task and returns it as a shared handle.
    pub fn arc<Fut>(f: F) -> Arc<Self>
    where
        F: Fn(Arc<C>, Arc<[Option<T>]>, AbortSignal) -> Fut,
        Fut: Future<Output = Result<T, TaskError>>,
    {
        Arc::new(Self::new(f))
    }
}

impl<F, Fut, C, T> Task<C, T> for TaskFn<F, C, T>
where
    F: Fn(Arc<C>, Arc<[Option<T>]>, AbortSignal) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    C: 'static,
    T: 'static,
{
    fn spawn(
        &self,
        ctx: Arc<C>,
        previous: Arc<[Option<T>]>,
        signal: AbortSignal,
    ) -> BoxTaskFuture<T> {
        Box::pin((self.f)(ctx, previous, signal))
    }
}

/// Function-backed task that produces its value synchronously.
pub struct SyncTaskFn<F, C, T> {
    f: F,
    _marker: PhantomData<fn(Arc<C>) -> T>,
}

impl<F, C, T> SyncTaskFn<F, C, T>
where
    F: Fn(Arc<C>, Arc<[Option<T>]>, AbortSignal) -> Result<T, TaskError>,
{
    /// Creates a new synchronous task.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }

    /// Creates the task and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

impl<F, C, T> Task<C, T> for SyncTaskFn<F, C, T>
where
    F: Fn(Arc<C>, Arc<[Option<T>]>, AbortSignal) -> Result<T, TaskError> + Send + Sync + 'static,
    C: 'static,
    T: Send + 'static,
{
    fn spawn(
        &self,
        ctx: Arc<C>,
        previous: Arc<[Option<T>]>,
        signal: AbortSignal,
    ) -> BoxTaskFuture<T> {
        Box::pin(future::ready((self.f)(ctx, previous, signal)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskRef;

    #[tokio::test]
    async fn test_async_fn_receives_arguments() {
        let task: TaskRef<u32, u32> =
            TaskFn::arc(|ctx: Arc<u32>, prev: Arc<[Option<u32>]>, _s: AbortSignal| async move {
                Ok(*ctx + prev.iter().flatten().sum::<u32>())
            });

        let prev: Arc<[Option<u32>]> = Arc::from(vec![Some(1), None, Some(2)]);
        let out = task.spawn(Arc::new(10), prev, AbortSignal::new()).await;
        assert_eq!(out, Ok(13));
    }

    #[tokio::test]
    async fn test_sync_fn_error_is_returned() {
        let task: TaskRef<(), u32> =
            SyncTaskFn::arc(|_ctx: Arc<()>, _prev: Arc<[Option<u32>]>, _s: AbortSignal| {
                Err(TaskError::fail("some wrong"))
            });

        let out = task
            .spawn(Arc::new(()), Arc::from(Vec::new()), AbortSignal::new())
            .await;
        assert_eq!(out, Err(TaskError::fail("some wrong")));
    }
}
