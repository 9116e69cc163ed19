//! # Runner builder and subscriber listener.
//!
//! [`RunnerBuilder`] assembles a [`Runner`] from a config, a context (owned or
//! already shared) and a list of subscribers. When subscribers are given it
//! spawns one listener that forwards every bus event to a [`SubscriberSet`].
//!
//! ```text
//! Bus ──► subscriber_listener ──► SubscriberSet::emit(&Event)
//!               │
//!               └─ stop cancelled (Runner::destroy) ─► drain buffered events ─► set.shutdown()
//! ```

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{config::RunnerConfig, runner::Runner};
use crate::{
    events::{Bus, Event},
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing a [`Runner`] with optional event subscribers.
pub struct RunnerBuilder<C> {
    cfg: RunnerConfig,
    context: Arc<C>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl<C> RunnerBuilder<C> {
    /// Creates a new builder owning `context`.
    pub fn new(cfg: RunnerConfig, context: C) -> Self {
        Self::from_shared(cfg, Arc::new(context))
    }

    /// Creates a new builder around a context the caller keeps a handle to.
    pub fn from_shared(cfg: RunnerConfig, context: Arc<C>) -> Self {
        Self {
            cfg,
            context,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive run, stage and task lifecycle events through
    /// dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the runner.
    ///
    /// With subscribers configured this spawns the listener and the subscriber
    /// workers, so it must be called from within a Tokio runtime.
    pub fn build<T>(self) -> Runner<C, T> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let stop = CancellationToken::new();

        let listener = if self.subscribers.is_empty() {
            None
        } else {
            let set = SubscriberSet::new(self.subscribers, bus.clone());
            Some(subscriber_listener(bus.subscribe(), set, stop.clone()))
        };
        Runner::from_parts(self.cfg, self.context, bus, stop, listener)
    }
}

/// Forwards bus events to the subscriber set until `stop` is cancelled.
///
/// On stop, events already buffered on the bus are still delivered before the
/// subscriber workers are shut down.
fn subscriber_listener(
    mut rx: broadcast::Receiver<Event>,
    set: SubscriberSet,
    stop: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                res = rx.recv() => match res {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                },
                _ = stop.cancelled() => {
                    loop {
                        match rx.try_recv() {
                            Ok(ev) => set.emit(&ev),
                            Err(TryRecvError::Lagged(_)) => continue,
                            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
                        }
                    }
                    break;
                }
            }
        }
        set.shutdown().await;
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::signal::AbortSignal;
    use crate::tasks::{SyncTaskFn, TaskRef};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct Recorder(Arc<Mutex<Vec<EventKind>>>);

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, event: &Event) {
            self.0.lock().push(event.kind);
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    #[tokio::test]
    async fn test_subscribers_see_lifecycle_after_close() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder: Arc<dyn Subscribe> = Arc::new(Recorder(seen.clone()));
        let mut runner: Runner<(), u8> = RunnerBuilder::new(Default::default(), ())
            .with_subscribers(vec![recorder])
            .build();
        let task: TaskRef<(), u8> =
            SyncTaskFn::arc(|_c: Arc<()>, _p: Arc<[Option<u8>]>, _s: AbortSignal| Ok(1));
        runner.add(task);
        runner.run().await.expect("ends");
        runner.close().await;

        let seen = seen.lock();
        assert_eq!(seen.first(), Some(&EventKind::RunStarting));
        assert_eq!(seen.last(), Some(&EventKind::RunFinished));
        assert!(seen.contains(&EventKind::StageStarting));
        assert!(seen.contains(&EventKind::TaskStarting));
        assert!(seen.contains(&EventKind::TaskStopped));
    }

    #[test]
    fn test_build_without_subscribers_needs_no_runtime() {
        let runner: Runner<(), u8> = RunnerBuilder::new(RunnerConfig::default(), ()).build();
        assert_eq!(runner.stage_count(), 0);
    }
}
