//! SQLite message store implementation.
//!
//! Implements `MessageStore` from `threadline-core` using sqlx with split
//! read/write pools: raw queries, a private Row struct, reads on the reader
//! pool and every mutation on the single-connection writer.

use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

use threadline_core::repository::MessageStore;
use threadline_types::error::RepositoryError;
use threadline_types::message::{ChatMessage, MessageId, MessageKind, NewMessage};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `MessageStore`.
pub struct SqliteMessageStore {
    pool: DatabasePool,
}

impl SqliteMessageStore {
    /// Create a new store backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for mapping SQLite rows to domain ChatMessage.
struct ChatMessageRow {
    id: String,
    kind: String,
    content: String,
}

impl ChatMessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            kind: row.try_get("kind")?,
            content: row.try_get("content")?,
        })
    }

    fn into_message(self) -> Result<ChatMessage, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid message id: {e}")))?;
        let kind: MessageKind = self
            .kind
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(ChatMessage {
            id: MessageId::from_uuid(id),
            kind,
            content: self.content,
        })
    }
}

impl MessageStore for SqliteMessageStore {
    async fn list_all(&self) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows = sqlx::query("SELECT id, kind, content FROM chat_messages ORDER BY seq ASC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                ChatMessageRow::from_row(row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?
                    .into_message()
            })
            .collect()
    }

    async fn create(&self, message: &NewMessage) -> Result<ChatMessage, RepositoryError> {
        let id = MessageId::from_uuid(Uuid::now_v7());
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO chat_messages (id, kind, content, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(message.kind.to_string())
        .bind(&message.content)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint failed") {
                RepositoryError::Conflict(format!("message id {id} already exists"))
            } else {
                RepositoryError::Query(e.to_string())
            }
        })?;

        tracing::debug!(message_id = %id, kind = %message.kind, "message created");
        Ok(ChatMessage {
            id,
            kind: message.kind,
            content: message.content.clone(),
        })
    }

    async fn update(&self, id: &MessageId, content: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE chat_messages SET content = ?, updated_at = ? WHERE id = ?")
            .bind(content)
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: &MessageId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM chat_messages WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn truncate(&self) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM chat_messages")
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        tracing::info!(removed = result.rows_affected(), "chat history truncated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> (SqliteMessageStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = DatabasePool::new(&url).await.unwrap();
        (SqliteMessageStore::new(pool), dir)
    }

    #[tokio::test]
    async fn test_create_assigns_distinct_ids() {
        let (store, _dir) = test_store().await;

        let a = store.create(&NewMessage::user("2+2?")).await.unwrap();
        let b = store.create(&NewMessage::bot("<Loading>")).await.unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(a.kind, MessageKind::User);
        assert_eq!(b.content, "<Loading>");
    }

    #[tokio::test]
    async fn test_list_all_in_insertion_order() {
        let (store, _dir) = test_store().await;

        for content in ["first", "second", "third"] {
            store.create(&NewMessage::user(content)).await.unwrap();
        }

        let listed: Vec<String> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(listed, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_update_replaces_content() {
        let (store, _dir) = test_store().await;
        let placeholder = store.create(&NewMessage::bot("<Loading>")).await.unwrap();

        store.update(&placeholder.id, "4!").await.unwrap();

        let listed = store.list_all().await.unwrap();
        assert_eq!(listed[0].id, placeholder.id);
        assert_eq!(listed[0].content, "4!");
        assert_eq!(listed[0].kind, MessageKind::Bot);
    }

    #[tokio::test]
    async fn test_update_and_delete_unknown_id_not_found() {
        let (store, _dir) = test_store().await;
        let missing = MessageId::from_uuid(Uuid::now_v7());

        assert!(matches!(
            store.update(&missing, "x").await,
            Err(RepositoryError::NotFound)
        ));
        assert!(matches!(
            store.delete(&missing).await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_single_message() {
        let (store, _dir) = test_store().await;
        let keep = store.create(&NewMessage::user("keep")).await.unwrap();
        let gone = store.create(&NewMessage::user("gone")).await.unwrap();

        store.delete(&gone.id).await.unwrap();

        let listed = store.list_all().await.unwrap();
        assert_eq!(listed, vec![keep]);
    }

    #[tokio::test]
    async fn test_truncate_empties_history() {
        let (store, _dir) = test_store().await;
        store.create(&NewMessage::user("a")).await.unwrap();
        store.create(&NewMessage::bot("b")).await.unwrap();

        store.truncate().await.unwrap();

        assert!(store.list_all().await.unwrap().is_empty());
        // Truncating an empty table is fine.
        store.truncate().await.unwrap();
    }

    #[tokio::test]
    async fn test_unicode_content_round_trips() {
        let (store, _dir) = test_store().await;
        let text = "caf\u{e9} \u{2615} \u{1F600}";
        let created = store.create(&NewMessage::bot(text)).await.unwrap();

        let listed = store.list_all().await.unwrap();
        assert_eq!(listed[0].id, created.id);
        assert_eq!(listed[0].content, text);
    }
}
