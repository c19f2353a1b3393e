//! `BroadcastingStore` -- a `MessageStore` decorator that echoes every
//! successful mutation onto a `BroadcastBus` topic.
//!
//! The event is published only after the wrapped store returns `Ok`, so a
//! rejected operation never reaches subscribers. Mutations run one at a time
//! with their publish, so subscribers see them in the order they were
//! written.

use threadline_types::error::RepositoryError;
use threadline_types::event::TranscriptEvent;
use threadline_types::message::{ChatMessage, MessageId, NewMessage};
use tokio::sync::Mutex;
use tracing::debug;

use super::bus::BroadcastBus;
use crate::repository::MessageStore;

/// Store wrapper that publishes a `TranscriptEvent` per successful mutation.
pub struct BroadcastingStore<S> {
    inner: S,
    bus: BroadcastBus,
    topic: String,
    announce_truncate: bool,
    /// Held from the inner write until its event is published.
    write_lock: Mutex<()>,
}

impl<S: MessageStore> BroadcastingStore<S> {
    pub fn new(inner: S, bus: BroadcastBus, topic: impl Into<String>) -> Self {
        Self {
            inner,
            bus,
            topic: topic.into(),
            announce_truncate: true,
            write_lock: Mutex::new(()),
        }
    }

    /// Whether `truncate` publishes `Cleared`. Defaults to `true`.
    pub fn with_truncate_announcement(mut self, announce: bool) -> Self {
        self.announce_truncate = announce;
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn bus(&self) -> &BroadcastBus {
        &self.bus
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn announce(&self, event: TranscriptEvent) {
        let name = event.name();
        let delivered = self.bus.publish(&self.topic, event);
        debug!(topic = %self.topic, event = name, delivered, "store mutation broadcast");
    }
}

impl<S: MessageStore> MessageStore for BroadcastingStore<S> {
    async fn list_all(&self) -> Result<Vec<ChatMessage>, RepositoryError> {
        self.inner.list_all().await
    }

    async fn create(&self, message: &NewMessage) -> Result<ChatMessage, RepositoryError> {
        let _write = self.write_lock.lock().await;
        let created = self.inner.create(message).await?;
        self.announce(TranscriptEvent::Created {
            message: created.clone(),
        });
        Ok(created)
    }

    async fn update(&self, id: &MessageId, content: &str) -> Result<(), RepositoryError> {
        let _write = self.write_lock.lock().await;
        self.inner.update(id, content).await?;
        self.announce(TranscriptEvent::Updated {
            id: *id,
            content: content.to_string(),
        });
        Ok(())
    }

    async fn delete(&self, id: &MessageId) -> Result<(), RepositoryError> {
        let _write = self.write_lock.lock().await;
        self.inner.delete(id).await?;
        self.announce(TranscriptEvent::Deleted { id: *id });
        Ok(())
    }

    async fn truncate(&self) -> Result<(), RepositoryError> {
        let _write = self.write_lock.lock().await;
        self.inner.truncate().await?;
        if self.announce_truncate {
            self.announce(TranscriptEvent::Cleared);
        }
        Ok(())
    }
}
