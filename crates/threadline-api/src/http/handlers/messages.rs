//! Message CRUD HTTP handlers.
//!
//! Endpoints:
//! - GET    /api/messages      - List the full history in order
//! - POST   /api/messages      - Create a message, store assigns the id
//! - PUT    /api/messages/{id} - Replace a bot message's content
//! - DELETE /api/messages/{id} - Delete one message
//! - DELETE /api/messages      - Truncate the history
//!
//! Every mutation goes through the broadcasting store, so connected chat
//! sessions and WebSocket observers see it as an event.

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;

use threadline_core::repository::MessageStore;
use threadline_types::error::{RepositoryError, ValidationError};
use threadline_types::message::{ChatMessage, MessageId, MessageKind, NewMessage};

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Request body for PUT /api/messages/{id}.
#[derive(Debug, Deserialize)]
pub struct UpdateMessageRequest {
    pub content: String,
}

/// Parse a message id from a path parameter, returning a 400 error on invalid format.
fn parse_id(s: &str) -> Result<MessageId, AppError> {
    s.parse::<MessageId>()
        .map_err(|_| AppError::Validation(format!("Invalid message id: {s}")))
}

/// GET /api/messages - List all messages.
pub async fn list_messages(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<ChatMessage>>>, AppError> {
    let start = Instant::now();
    let messages = state.store.list_all().await?;

    Ok(Json(
        ApiResponse::timed(messages, start).with_link("self", "/api/messages"),
    ))
}

/// POST /api/messages - Create a message.
pub async fn create_message(
    State(state): State<AppState>,
    Json(body): Json<NewMessage>,
) -> Result<(StatusCode, Json<ApiResponse<ChatMessage>>), AppError> {
    let start = Instant::now();
    let message = state.store.create(&body).await?;
    tracing::debug!(message_id = %message.id, kind = %message.kind, "message created via API");

    let link = format!("/api/messages/{}", message.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::timed(message, start).with_link("self", &link)),
    ))
}

/// PUT /api/messages/{id} - Replace a message's content.
///
/// User messages are immutable and answer 400.
pub async fn update_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateMessageRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let id = parse_id(&id)?;

    let kind = state
        .store
        .list_all()
        .await?
        .into_iter()
        .find(|m| m.id == id)
        .map(|m| m.kind)
        .ok_or(RepositoryError::NotFound)?;
    if kind == MessageKind::User {
        return Err(AppError::Validation(ValidationError::ImmutableMessage(id).to_string()));
    }

    state.store.update(&id, &body.content).await?;

    Ok(Json(ApiResponse::timed(
        serde_json::json!({ "id": id, "updated": true }),
        start,
    )))
}

/// DELETE /api/messages/{id} - Delete a single message.
pub async fn delete_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let id = parse_id(&id)?;

    state.store.delete(&id).await?;

    Ok(Json(ApiResponse::timed(
        serde_json::json!({ "id": id, "deleted": true }),
        start,
    )))
}

/// DELETE /api/messages - Remove every message.
pub async fn truncate_messages(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    state.store.truncate().await?;

    Ok(Json(ApiResponse::timed(
        serde_json::json!({ "cleared": true }),
        start,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use threadline_types::event::{DEFAULT_TOPIC, TranscriptEvent};
    use tokio::sync::broadcast::error::TryRecvError;

    async fn test_state() -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::init_in(dir.path()).await.unwrap();
        (state, dir)
    }

    #[tokio::test]
    async fn test_create_then_list() {
        let (state, _dir) = test_state().await;

        let (status, Json(created)) =
            create_message(State(state.clone()), Json(NewMessage::user("2+2?")))
                .await
                .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        let created = created.data.unwrap();
        assert_eq!(created.kind, MessageKind::User);

        let Json(listed) = list_messages(State(state)).await.unwrap();
        assert_eq!(listed.data.unwrap(), vec![created]);
    }

    #[tokio::test]
    async fn test_update_broadcasts_to_observers() {
        let (state, _dir) = test_state().await;
        let created = state.store.create(&NewMessage::bot("<Loading>")).await.unwrap();
        let mut rx = state.bus.subscribe(DEFAULT_TOPIC);

        update_message(
            State(state.clone()),
            Path(created.id.to_string()),
            Json(UpdateMessageRequest {
                content: "4!".to_string(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            TranscriptEvent::Updated {
                id: created.id,
                content: "4!".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_not_found() {
        let (state, _dir) = test_state().await;
        let missing = uuid::Uuid::now_v7().to_string();

        let err = update_message(
            State(state),
            Path(missing),
            Json(UpdateMessageRequest {
                content: "x".to_string(),
            }),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Repository(RepositoryError::NotFound)));
    }

    #[tokio::test]
    async fn test_update_rejects_user_message() {
        let (state, _dir) = test_state().await;
        let question = state.store.create(&NewMessage::user("2+2?")).await.unwrap();
        let mut rx = state.bus.subscribe(DEFAULT_TOPIC);

        let err = update_message(
            State(state.clone()),
            Path(question.id.to_string()),
            Json(UpdateMessageRequest {
                content: "rewritten".to_string(),
            }),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Validation(ref msg) if msg.contains("cannot be edited")));
        assert_eq!(state.store.list_all().await.unwrap(), vec![question]);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_delete_rejects_malformed_id() {
        let (state, _dir) = test_state().await;

        let err = delete_message(State(state), Path("not-a-uuid".to_string()))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_delete_and_truncate() {
        let (state, _dir) = test_state().await;
        let a = state.store.create(&NewMessage::user("a")).await.unwrap();
        state.store.create(&NewMessage::bot("b")).await.unwrap();

        delete_message(State(state.clone()), Path(a.id.to_string()))
            .await
            .unwrap();
        assert_eq!(state.store.list_all().await.unwrap().len(), 1);

        let mut rx = state.bus.subscribe(DEFAULT_TOPIC);
        truncate_messages(State(state.clone())).await.unwrap();

        assert!(state.store.list_all().await.unwrap().is_empty());
        assert_eq!(rx.recv().await.unwrap(), TranscriptEvent::Cleared);
    }
}
