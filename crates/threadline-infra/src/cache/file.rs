//! JSON file implementation of `TranscriptCache`.
//!
//! The snapshot is written to a sibling temp file and renamed over the
//! target, so readers never observe a half-written cache. Missing, unreadable
//! or malformed files load as "no snapshot".

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use threadline_core::chat::TranscriptCache;
use threadline_types::error::CacheError;
use threadline_types::message::ChatMessage;

/// File name of the cache inside the data directory.
pub const CACHE_FILE: &str = "transcript-cache.json";

const CACHE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct CachedTranscript {
    version: u32,
    messages: Vec<ChatMessage>,
}

/// Transcript cache stored as a single JSON document.
#[derive(Debug, Clone)]
pub struct FileTranscriptCache {
    path: PathBuf,
}

impl FileTranscriptCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Cache at `{data_dir}/transcript-cache.json`.
    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(CACHE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| CACHE_FILE.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl TranscriptCache for FileTranscriptCache {
    fn load(&self) -> Option<Vec<ChatMessage>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!("No transcript cache at {}", self.path.display());
                return None;
            }
            Err(err) => {
                tracing::warn!("Failed to read {}: {err}, ignoring cache", self.path.display());
                return None;
            }
        };

        match serde_json::from_str::<CachedTranscript>(&content) {
            Ok(cached) if cached.version == CACHE_VERSION => Some(cached.messages),
            Ok(cached) => {
                tracing::warn!(
                    version = cached.version,
                    "Unsupported transcript cache version in {}, ignoring cache",
                    self.path.display()
                );
                None
            }
            Err(err) => {
                tracing::warn!("Failed to parse {}: {err}, ignoring cache", self.path.display());
                None
            }
        }
    }

    fn save(&self, messages: &[ChatMessage]) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::Io(e.to_string()))?;
        }

        let json = serde_json::to_vec(&CachedTranscript {
            version: CACHE_VERSION,
            messages: messages.to_vec(),
        })
        .map_err(|e| CacheError::Encoding(e.to_string()))?;

        let temp = self.temp_path();
        std::fs::write(&temp, json).map_err(|e| CacheError::Io(e.to_string()))?;
        std::fs::rename(&temp, &self.path).map_err(|e| CacheError::Io(e.to_string()))?;
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(CacheError::Io(err.to_string())),
        }
    }
}
