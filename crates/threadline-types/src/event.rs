//! Event types carried by the broadcast bus.
//!
//! Every successful store mutation produces exactly one `TranscriptEvent`.
//! All variants are Clone + Send + Sync for use with tokio broadcast channels.

use serde::{Deserialize, Serialize};

use crate::message::{ChatMessage, MessageId};

/// Topic every session joins unless told otherwise.
pub const DEFAULT_TOPIC: &str = "default";

/// A store mutation echoed to every subscribed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TranscriptEvent {
    /// A message was created. Carries the full stored record.
    Created { message: ChatMessage },

    /// A message's content was replaced.
    Updated { id: MessageId, content: String },

    /// A message was removed.
    Deleted { id: MessageId },

    /// The whole history was truncated.
    Cleared,
}

impl TranscriptEvent {
    /// The message this event concerns, if it concerns exactly one.
    pub fn message_id(&self) -> Option<MessageId> {
        match self {
            TranscriptEvent::Created { message } => Some(message.id),
            TranscriptEvent::Updated { id, .. } | TranscriptEvent::Deleted { id } => Some(*id),
            TranscriptEvent::Cleared => None,
        }
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            TranscriptEvent::Created { .. } => "created",
            TranscriptEvent::Updated { .. } => "updated",
            TranscriptEvent::Deleted { .. } => "deleted",
            TranscriptEvent::Cleared => "cleared",
        }
    }
}
