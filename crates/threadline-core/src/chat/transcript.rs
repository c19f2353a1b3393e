//! The ordered, in-memory chat transcript owned by a session.
//!
//! Every mutator reports whether it changed anything so callers can drive
//! `watch::Sender::send_if_modified` and skip spurious notifications.

use threadline_types::event::TranscriptEvent;
use threadline_types::message::{ChatMessage, MessageId};

/// Messages in insertion order, unique by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole transcript with an authoritative listing.
    ///
    /// Later duplicates of an id are dropped.
    pub fn replace_all(&mut self, messages: Vec<ChatMessage>) -> bool {
        let mut deduped: Vec<ChatMessage> = Vec::with_capacity(messages.len());
        for message in messages {
            if !deduped.iter().any(|m| m.id == message.id) {
                deduped.push(message);
            }
        }
        if deduped == self.messages {
            return false;
        }
        self.messages = deduped;
        true
    }

    /// Append a newly created message unless its id is already present.
    pub fn apply_created(&mut self, message: ChatMessage) -> bool {
        if self.contains(&message.id) {
            return false;
        }
        self.messages.push(message);
        true
    }

    /// Replace the content of an existing message. Unknown ids are ignored.
    pub fn apply_updated(&mut self, id: &MessageId, content: &str) -> bool {
        match self.messages.iter_mut().find(|m| m.id == *id) {
            Some(message) if message.content != content => {
                message.content = content.to_string();
                true
            }
            _ => false,
        }
    }

    /// Remove a message. Unknown ids are ignored.
    pub fn apply_deleted(&mut self, id: &MessageId) -> bool {
        let before = self.messages.len();
        self.messages.retain(|m| m.id != *id);
        self.messages.len() != before
    }

    pub fn clear(&mut self) -> bool {
        if self.messages.is_empty() {
            return false;
        }
        self.messages.clear();
        true
    }

    /// Apply one broadcast event.
    pub fn apply(&mut self, event: TranscriptEvent) -> bool {
        match event {
            TranscriptEvent::Created { message } => self.apply_created(message),
            TranscriptEvent::Updated { id, content } => self.apply_updated(&id, &content),
            TranscriptEvent::Deleted { id } => self.apply_deleted(&id),
            TranscriptEvent::Cleared => self.clear(),
        }
    }

    pub fn get(&self, id: &MessageId) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == *id)
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.get(id).is_some()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
