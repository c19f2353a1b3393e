//! `/ws/events`: every [`TranscriptEvent`] on a topic as a JSON text frame.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;

use threadline_types::event::{DEFAULT_TOPIC, TranscriptEvent};

use crate::state::AppState;

/// Query parameters for `/ws/events`.
#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    pub topic: Option<String>,
}

impl EventsQuery {
    fn topic(&self) -> &str {
        match self.topic.as_deref() {
            Some(topic) if !topic.trim().is_empty() => topic,
            _ => DEFAULT_TOPIC,
        }
    }
}

/// Upgrade an HTTP request to a WebSocket connection for transcript events.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> impl IntoResponse {
    let topic = query.topic().to_string();
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state, topic))
}

/// Serialize one event as a text frame payload.
fn event_frame(event: &TranscriptEvent) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(json) => Some(json),
        Err(err) => {
            tracing::warn!(event = event.name(), "Failed to serialize TranscriptEvent: {err}");
            None
        }
    }
}

/// Multiplex bus events and incoming client frames in one task.
///
/// Client text frames are ignored; the feed is one-way. A close frame or a
/// send failure ends the connection.
async fn handle_ws_connection(socket: WebSocket, state: AppState, topic: String) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let mut event_rx = state.bus.subscribe(&topic);
    tracing::debug!(%topic, "WebSocket observer connected");

    loop {
        tokio::select! {
            event_result = event_rx.recv() => {
                match event_result {
                    Ok(event) => {
                        let Some(json) = event_frame(&event) else { continue };
                        if ws_sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(%topic, skipped = n, "WebSocket subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            msg_result = ws_receiver.next() => {
                match msg_result {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!("WebSocket receive error: {err}");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    tracing::debug!(%topic, "WebSocket connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use threadline_types::message::MessageId;

    #[test]
    fn test_topic_defaults_when_missing_or_blank() {
        assert_eq!(EventsQuery::default().topic(), DEFAULT_TOPIC);
        let blank = EventsQuery {
            topic: Some("  ".to_string()),
        };
        assert_eq!(blank.topic(), DEFAULT_TOPIC);
        let named = EventsQuery {
            topic: Some("room-2".to_string()),
        };
        assert_eq!(named.topic(), "room-2");
    }

    #[test]
    fn test_event_frame_is_tagged_json() {
        let id = MessageId::from_uuid(uuid::Uuid::now_v7());
        let frame = event_frame(&TranscriptEvent::Deleted { id }).unwrap();
        let json: serde_json::Value = serde_json::from_str(&frame).unwrap();

        assert_eq!(json["type"], "deleted");
        assert_eq!(json["id"], id.to_string());
        assert_eq!(
            event_frame(&TranscriptEvent::Cleared).unwrap(),
            r#"{"type":"cleared"}"#
        );
    }
}
