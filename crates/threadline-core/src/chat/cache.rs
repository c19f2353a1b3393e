//! Local transcript cache port. Blocking; sessions call it on the blocking
//! pool.

use std::sync::Mutex;

use threadline_types::error::CacheError;
use threadline_types::message::ChatMessage;

/// One snapshot of the full transcript, shown at start-up until the store's
/// listing replaces it.
pub trait TranscriptCache: Send + Sync {
    /// Last saved snapshot, or `None` when nothing usable is cached.
    fn load(&self) -> Option<Vec<ChatMessage>>;

    /// Overwrite the slot with `messages`.
    fn save(&self, messages: &[ChatMessage]) -> Result<(), CacheError>;

    /// Empty the slot.
    fn clear(&self) -> Result<(), CacheError>;
}

/// Cache that stores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl TranscriptCache for NoopCache {
    fn load(&self) -> Option<Vec<ChatMessage>> {
        None
    }

    fn save(&self, _messages: &[ChatMessage]) -> Result<(), CacheError> {
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Process-local cache, for tests and embedders without a data directory.
#[derive(Debug, Default)]
pub struct MemoryCache {
    slot: Mutex<Option<Vec<ChatMessage>>>,
}

impl MemoryCache {
    pub fn with_snapshot(messages: Vec<ChatMessage>) -> Self {
        Self {
            slot: Mutex::new(Some(messages)),
        }
    }
}

impl TranscriptCache for MemoryCache {
    fn load(&self) -> Option<Vec<ChatMessage>> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }

    fn save(&self, messages: &[ChatMessage]) -> Result<(), CacheError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|e| CacheError::Io(e.to_string()))?;
        *slot = Some(messages.to_vec());
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|e| CacheError::Io(e.to_string()))?;
        *slot = None;
        Ok(())
    }
}
