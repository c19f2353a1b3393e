//! Chat message types for Threadline.
//!
//! A `ChatMessage` is one transcript entry. Its `id` is always assigned by the
//! message store at creation; clients never mint ids themselves.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Content of a bot message that has been created but not yet streamed into.
pub const LOADING_PLACEHOLDER: &str = "<Loading>";

/// Prefix of the content written to a bot message whose generation failed.
pub const ERROR_MARKER: &str = "<Error>";

/// Opaque, store-assigned identifier of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl MessageId {
    /// Wrap an id handed out by a store.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Who authored a message.
///
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (kind IN ('user', 'bot'))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    User,
    Bot,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::User => write!(f, "user"),
            MessageKind::Bot => write!(f, "bot"),
        }
    }
}

impl FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(MessageKind::User),
            "bot" => Ok(MessageKind::Bot),
            other => Err(format!("invalid message kind: '{other}'")),
        }
    }
}

/// A single transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub kind: MessageKind,
    pub content: String,
}

/// Payload for creating a message. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub kind: MessageKind,
    pub content: String,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::User,
            content: content.into(),
        }
    }

    pub fn bot(content: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Bot,
            content: content.into(),
        }
    }
}

/// Build the final content of a bot message whose generation failed.
///
/// Any text that had already streamed in is kept ahead of the marker.
pub fn error_content(partial: &str, reason: &str) -> String {
    if partial.is_empty() {
        format!("{ERROR_MARKER} {reason}")
    } else {
        format!("{partial}\n\n{ERROR_MARKER} {reason}")
    }
}
