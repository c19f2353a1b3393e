//! Message store trait definition.
//!
//! The message store is the durable source of truth for chat history. Only
//! its contract lives here; the infrastructure layer (threadline-infra)
//! implements it with SQLite persistence.

use threadline_types::error::RepositoryError;
use threadline_types::message::{ChatMessage, MessageId, NewMessage};

/// Repository trait for chat message persistence.
///
/// Ids are assigned by the implementation in `create`, exactly once.
/// `list_all` returns messages in insertion order.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait MessageStore: Send + Sync {
    /// Load the complete history in insertion order.
    fn list_all(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, RepositoryError>> + Send;

    /// Persist a new message and return the stored record with its id.
    fn create(
        &self,
        message: &NewMessage,
    ) -> impl std::future::Future<Output = Result<ChatMessage, RepositoryError>> + Send;

    /// Replace the content of an existing message. Returns `NotFound` for an unknown id.
    fn update(
        &self,
        id: &MessageId,
        content: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Remove a message. Returns `NotFound` for an unknown id.
    fn delete(
        &self,
        id: &MessageId,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Remove every message.
    fn truncate(&self) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}

impl<T: MessageStore> MessageStore for std::sync::Arc<T> {
    async fn list_all(&self) -> Result<Vec<ChatMessage>, RepositoryError> {
        (**self).list_all().await
    }

    async fn create(&self, message: &NewMessage) -> Result<ChatMessage, RepositoryError> {
        (**self).create(message).await
    }

    async fn update(&self, id: &MessageId, content: &str) -> Result<(), RepositoryError> {
        (**self).update(id, content).await
    }

    async fn delete(&self, id: &MessageId) -> Result<(), RepositoryError> {
        (**self).delete(id).await
    }

    async fn truncate(&self) -> Result<(), RepositoryError> {
        (**self).truncate().await
    }
}
