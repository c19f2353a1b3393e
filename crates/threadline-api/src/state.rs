//! Shared application state for CLI and REST API.
//!
//! `AppState` owns the broadcast bus and the broadcasting message store that
//! every chat session, HTTP handler and WebSocket observer in this process
//! shares.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use threadline_core::chat::{ChatSession, PreparedSession};
use threadline_core::event::{BroadcastBus, BroadcastingStore};
use threadline_core::generation::BoxGenerationBackend;
use threadline_infra::cache::FileTranscriptCache;
use threadline_infra::config::{load_config, resolve_data_dir};
use threadline_infra::generation::HttpGenerationBackend;
use threadline_infra::sqlite::pool::database_url;
use threadline_infra::sqlite::{DatabasePool, SqliteMessageStore};
use threadline_types::config::ChatConfig;
use threadline_types::event::DEFAULT_TOPIC;

/// The store every part of the process writes through.
pub type SharedStore = BroadcastingStore<SqliteMessageStore>;

/// Shared application state, cloned into every axum handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ChatConfig>,
    pub data_dir: PathBuf,
    pub bus: BroadcastBus,
    pub store: Arc<SharedStore>,
}

impl AppState {
    /// Initialize from the resolved data directory.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        Self::init_in(&data_dir).await
    }

    /// Initialize in an explicit data directory.
    ///
    /// Creates the directory if needed, loads `config.toml`, opens the
    /// database (running migrations) and wires the store to a fresh bus.
    pub async fn init_in(data_dir: &Path) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;

        let config = load_config(data_dir).await;
        let db_url = format!("{}?mode=rwc", database_url(data_dir));
        let pool = DatabasePool::new(&db_url).await?;

        let bus = BroadcastBus::new(config.bus_capacity);
        let store = BroadcastingStore::new(SqliteMessageStore::new(pool), bus.clone(), DEFAULT_TOPIC)
            .with_truncate_announcement(config.broadcast_truncate);

        tracing::debug!(data_dir = %data_dir.display(), "application state initialized");
        Ok(Self {
            config: Arc::new(config),
            data_dir: data_dir.to_path_buf(),
            bus,
            store: Arc::new(store),
        })
    }

    /// Build the HTTP generation backend from config.
    pub fn backend(&self) -> anyhow::Result<Arc<BoxGenerationBackend>> {
        let backend = HttpGenerationBackend::new(&self.config.generation)?;
        Ok(Arc::new(BoxGenerationBackend::new(backend)))
    }

    /// Prefill a session on the default topic from the on-disk cache.
    pub async fn prepare_session(
        &self,
        backend: Arc<BoxGenerationBackend>,
    ) -> PreparedSession<SharedStore> {
        ChatSession::builder(Arc::clone(&self.store), backend, self.bus.clone())
            .config(self.config.as_ref().clone())
            .topic(DEFAULT_TOPIC)
            .cache(Arc::new(FileTranscriptCache::in_data_dir(&self.data_dir)))
            .prepare()
            .await
    }

}
