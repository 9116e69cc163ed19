//! # Event bus.
//!
//! [`Bus`] wraps a [`tokio::sync::broadcast`] channel. Tasks, stages and the
//! runner publish into it; the runner's listener (present only when
//! subscribers are configured) is the single receiver.
//!
//! ```text
//!   run_task(1_1) ──┐
//!   run_task(1_2) ──┼──► Bus ──► listener ──► SubscriberSet
//!   run_stage     ──┤
//!   Runner        ──┘
//! ```
//!
//! Publishing never waits. With no receiver attached the event is discarded;
//! a receiver that falls more than `capacity` events behind sees
//! `RecvError::Lagged(n)` and resumes from the oldest retained event.

use tokio::sync::broadcast;

use super::event::Event;

/// Cloneable publishing handle over a broadcast channel of [`Event`]s.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus retaining at most `capacity` undelivered events (min 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes `ev` to every receiver; dropped silently when there is none.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Attaches a receiver that observes events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Whether any receiver is attached.
    pub fn has_receivers(&self) -> bool {
        self.tx.receiver_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn test_subscriber_sees_events_after_subscribe() {
        let bus = Bus::new(0);
        bus.publish(Event::new(EventKind::RunStarting));
        assert!(!bus.has_receivers());

        let mut rx = bus.subscribe();
        assert!(bus.has_receivers());
        bus.publish(Event::new(EventKind::StageStarting).with_stage(1));

        let ev = rx.recv().await.expect("event");
        assert_eq!(ev.kind, EventKind::StageStarting);
        assert_eq!(ev.stage, Some(1));
    }

    #[tokio::test]
    async fn test_lagging_receiver_skips_oldest() {
        let bus = Bus::new(2);
        let mut rx = bus.subscribe();
        for stage in 1..=3 {
            bus.publish(Event::new(EventKind::StageStarting).with_stage(stage));
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
        assert_eq!(rx.recv().await.expect("event").stage, Some(2));
    }
}
