//! Broadcast channel for domain events.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. Every post
//! mutation publishes a [`PostEvent`] through the bus; the owner notifier
//! and tests subscribe to it.

use tokio::sync::broadcast;

use super::PostEvent;

/// Broadcast bus for [`PostEvent`]s.
///
/// Backed by a `tokio::broadcast` channel with a configurable capacity. When
/// the ring buffer is full, the oldest events are dropped for lagging
/// receivers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PostEvent>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of receivers that received the event.
    /// If there are no active receivers, the event is silently dropped.
    pub fn publish(&self, event: PostEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Creates a new receiver that will receive all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PostEvent> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::Utc;
    use tokio::sync::broadcast::error::RecvError;

    use super::*;
    use crate::domain::PostId;

    fn queued(id: i64, position: u32) -> PostEvent {
        PostEvent::PostQueued {
            post_id: PostId::new(id),
            position,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn events_without_subscribers_are_dropped() {
        let bus = EventBus::new(4);
        assert_eq!(bus.publish(queued(1, 1)), 0);
        assert_eq!(bus.receiver_count(), 0);
    }

    #[tokio::test]
    async fn every_subscriber_sees_lifecycle_in_order() {
        let bus = EventBus::new(16);
        let mut notifier = bus.subscribe();
        let mut audit = bus.subscribe();

        assert_eq!(bus.publish(queued(1, 1)), 2);
        bus.publish(PostEvent::QueueRenumbered {
            queue_len: 1,
            timestamp: Utc::now(),
        });

        for rx in [&mut notifier, &mut audit] {
            let Ok(first) = rx.recv().await else {
                panic!("expected queued event");
            };
            assert_eq!(first.post_id(), Some(PostId::new(1)));
            let Ok(second) = rx.recv().await else {
                panic!("expected renumber event");
            };
            assert_eq!(second.post_id(), None);
        }
    }

    #[tokio::test]
    async fn slow_subscriber_is_told_how_much_it_missed() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for id in 1..=5 {
            bus.publish(queued(id, 1));
        }

        let Err(RecvError::Lagged(missed)) = rx.recv().await else {
            panic!("expected lag");
        };
        assert_eq!(missed, 3);
        let Ok(next) = rx.recv().await else {
            panic!("expected oldest retained event");
        };
        assert_eq!(next.post_id(), Some(PostId::new(4)));
    }
}
