//! Topic-keyed broadcast bus for distributing `TranscriptEvent` to sessions.
//!
//! Each topic is one `tokio::sync::broadcast` channel, so events published to
//! a topic reach every subscriber in publish order. Publishing to a topic
//! with no subscribers is a no-op. A topic whose last receiver is gone is
//! dropped from the table on the next subscribe or publish.

use std::sync::Arc;

use dashmap::DashMap;
use threadline_types::event::TranscriptEvent;
use tokio::sync::broadcast;
use tracing::debug;

/// Multi-consumer event bus shared by every session.
///
/// Cloning the bus shares the underlying topic table, allowing multiple
/// producers and consumers.
#[derive(Clone)]
pub struct BroadcastBus {
    topics: Arc<DashMap<String, broadcast::Sender<TranscriptEvent>>>,
    capacity: usize,
}

impl BroadcastBus {
    /// Create a new bus whose topic channels hold `capacity` events each.
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to a topic, creating it if needed.
    ///
    /// The receiver sees every event published after this call. Dropping it
    /// releases the subscription.
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<TranscriptEvent> {
        self.prune_except(topic);
        let entry = self.topics.entry(topic.to_string()).or_insert_with(|| {
            let (tx, _) = broadcast::channel(self.capacity);
            tx
        });
        debug!(%topic, "subscribed to transcript topic");
        entry.subscribe()
    }

    /// Publish an event to every current subscriber of `topic`.
    ///
    /// Returns how many subscribers the event was queued for.
    pub fn publish(&self, topic: &str, event: TranscriptEvent) -> usize {
        let Some(sender) = self.topics.get(topic) else {
            debug!(%topic, event = event.name(), "topic has no subscribers, event dropped");
            return 0;
        };
        let sent = sender.send(event);
        drop(sender);
        match sent {
            Ok(count) => count,
            Err(_) => {
                self.topics
                    .remove_if(topic, |_, tx| tx.receiver_count() == 0);
                debug!(%topic, "no active subscribers on topic, topic removed");
                0
            }
        }
    }

    /// Drop every topic that has no receivers left, other than `keep`.
    fn prune_except(&self, keep: &str) {
        self.topics
            .retain(|name, tx| name == keep || tx.receiver_count() > 0);
    }

    /// Number of topics currently held.
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// Number of live subscriptions on a topic.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .get(topic)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for BroadcastBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastBus")
            .field("topics", &self.topics.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
