//! ChatSession: one in-memory transcript kept in step with the store.
//!
//! Messages enter the transcript only through `created` events from the bus,
//! the session's own included.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::BoxFuture;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use threadline_types::config::ChatConfig;
use threadline_types::error::{GenerationError, SessionError, ValidationError};
use threadline_types::event::{DEFAULT_TOPIC, TranscriptEvent};
use threadline_types::message::{ChatMessage, LOADING_PLACEHOLDER, MessageId, MessageKind, NewMessage};

use super::cache::{NoopCache, TranscriptCache};
use super::command::{CommandDispatcher, CommandHost, Dispatch};
use super::stream_reader::{StreamOutcome, StreamingReader};
use super::transcript::Transcript;
use crate::event::BroadcastBus;
use crate::generation::{BoxGenerationBackend, GenerationRequest};
use crate::repository::MessageStore;

/// Check a submission before anything is persisted.
pub fn validate_submission(
    config: &ChatConfig,
    text: &str,
    model_id: &str,
    credential: &SecretString,
) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::EmptyInput);
    }
    if !credential
        .expose_secret()
        .starts_with(config.credential_prefix.as_str())
    {
        return Err(ValidationError::MalformedCredential {
            expected_prefix: config.credential_prefix.clone(),
        });
    }
    let max = config.max_input_chars(model_id);
    let actual = text.chars().count();
    if actual > max {
        return Err(ValidationError::InputTooLong {
            model: model_id.to_string(),
            max,
            actual,
        });
    }
    Ok(())
}

/// Handle on a running generation.
#[derive(Debug)]
pub struct GenerationHandle {
    placeholder: MessageId,
    cancel: CancellationToken,
    task: JoinHandle<StreamOutcome>,
}

impl GenerationHandle {
    /// Id of the bot message being streamed into.
    pub fn placeholder_id(&self) -> MessageId {
        self.placeholder
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the generation to end.
    pub async fn outcome(self) -> StreamOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => StreamOutcome::Failed {
                error: GenerationError::Stream(format!("generation task failed: {e}")),
                content: String::new(),
            },
        }
    }
}

/// What `submit` did with the input.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// A generation was started.
    Generating(GenerationHandle),
    /// The input was a command and was handled locally.
    Command,
}

struct PendingGeneration {
    seq: u64,
    cancel: CancellationToken,
}

struct SessionState<S> {
    store: Arc<S>,
    backend: Arc<BoxGenerationBackend>,
    cache: Arc<dyn TranscriptCache>,
    commands: CommandDispatcher,
    config: ChatConfig,
    topic: String,
    transcript: watch::Sender<Transcript>,
    loading: watch::Sender<bool>,
    pending: Mutex<Option<PendingGeneration>>,
    generation_seq: AtomicU64,
}

impl<S> SessionState<S> {
    /// Lock the pending slot, recovering it if a holder panicked.
    fn pending_slot(&self) -> MutexGuard<'_, Option<PendingGeneration>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_loading(&self, loading: bool) {
        self.loading.send_if_modified(|current| {
            let changed = *current != loading;
            *current = loading;
            changed
        });
    }

    /// Register a new pending generation, cancelling any previous one.
    fn begin_pending(&self) -> (u64, CancellationToken) {
        let seq = self.generation_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();
        let previous = self.pending_slot().replace(PendingGeneration {
            seq,
            cancel: cancel.clone(),
        });
        if let Some(previous) = previous {
            debug!(topic = %self.topic, seq = previous.seq, "cancelling previous generation");
            previous.cancel.cancel();
        }
        self.set_loading(true);
        (seq, cancel)
    }

    /// Clear the pending slot if it still belongs to generation `seq`.
    fn end_pending(&self, seq: u64) {
        let finished = {
            let mut pending = self.pending_slot();
            if pending.as_ref().is_some_and(|p| p.seq == seq) {
                pending.take()
            } else {
                None
            }
        };
        if finished.is_some() {
            self.set_loading(false);
        }
    }

    fn cancel_pending(&self) -> bool {
        let pending = self.pending_slot().take();
        match pending {
            Some(pending) => {
                pending.cancel.cancel();
                self.set_loading(false);
                true
            }
            None => false,
        }
    }

    fn snapshot(&self) -> Vec<ChatMessage> {
        self.transcript.borrow().messages().to_vec()
    }
}

impl<S: MessageStore + 'static> SessionState<S> {
    async fn reload(&self) -> Result<usize, SessionError> {
        let messages = self.store.list_all().await?;
        let count = messages.len();
        self.transcript.send_if_modified(|t| t.replace_all(messages));
        debug!(topic = %self.topic, count, "transcript reloaded from store");
        Ok(count)
    }

    fn apply_event(&self, event: TranscriptEvent) {
        let name = event.name();
        let id = event.message_id();
        let changed = self.transcript.send_if_modified(|t| t.apply(event));
        debug!(topic = %self.topic, event = name, message_id = ?id, changed, "applied transcript event");
    }

    async fn clear_history(&self) -> Result<(), SessionError> {
        self.cancel_pending();
        if let Err(e) = self.store.truncate().await {
            warn!(topic = %self.topic, error = %e, "truncate rejected, transcript left untouched");
            return Err(e.into());
        }
        self.transcript.send_if_modified(|t| t.clear());

        let cache = Arc::clone(&self.cache);
        match tokio::task::spawn_blocking(move || cache.clear()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "failed to clear transcript cache"),
            Err(e) => warn!(error = %e, "transcript cache task failed"),
        }
        info!(topic = %self.topic, "history cleared");
        Ok(())
    }

    /// Open the request, create the placeholder, and spawn the reader.
    async fn start_generation(
        state: &Arc<Self>,
        text: &str,
        model_id: &str,
        credential: &SecretString,
    ) -> Result<GenerationHandle, SessionError> {
        let (seq, cancel) = state.begin_pending();

        let request = GenerationRequest {
            text: text.to_string(),
            model_id: model_id.to_string(),
            credential: credential.clone(),
        };
        let body = match state.backend.open(&request).await {
            Ok(body) => body,
            Err(e) => {
                warn!(backend = state.backend.name(), model = model_id, error = %e, "generation request failed");
                state.end_pending(seq);
                return Err(e.into());
            }
        };

        let placeholder = match state.store.create(&NewMessage::bot(LOADING_PLACEHOLDER)).await {
            Ok(message) => message.id,
            Err(e) => {
                warn!(error = %e, "failed to create placeholder message");
                state.end_pending(seq);
                return Err(e.into());
            }
        };
        debug!(message_id = %placeholder, model = model_id, "generation started");

        let reader = StreamingReader::new(placeholder, cancel.clone());
        let task_state = Arc::clone(state);
        let task = tokio::spawn(async move {
            let progress = Arc::clone(&task_state);
            let outcome = reader
                .run(body, task_state.store.as_ref(), move |text: &str| {
                    progress
                        .transcript
                        .send_if_modified(|t| t.apply_updated(&placeholder, text));
                })
                .await;
            task_state.end_pending(seq);
            outcome
        });

        Ok(GenerationHandle {
            placeholder,
            cancel,
            task,
        })
    }
}

impl<S: MessageStore + 'static> CommandHost for SessionState<S> {
    fn emit_bot_message(&self, content: String) -> BoxFuture<'_, Result<MessageId, SessionError>> {
        Box::pin(async move {
            let message = self.store.create(&NewMessage::bot(content)).await?;
            Ok(message.id)
        })
    }

    fn set_loading(&self, loading: bool) {
        SessionState::set_loading(self, loading);
    }

    fn clear_history(&self) -> BoxFuture<'_, Result<(), SessionError>> {
        Box::pin(SessionState::clear_history(self))
    }

    fn update_message(
        &self,
        id: MessageId,
        content: String,
    ) -> BoxFuture<'_, Result<(), SessionError>> {
        Box::pin(async move {
            self.transcript
                .send_if_modified(|t| t.apply_updated(&id, &content));
            self.store.update(&id, &content).await?;
            Ok(())
        })
    }

    fn snapshot(&self) -> Vec<ChatMessage> {
        SessionState::snapshot(self)
    }

    fn history(&self) -> BoxFuture<'_, Result<Vec<ChatMessage>, SessionError>> {
        Box::pin(async move { Ok(self.store.list_all().await?) })
    }
}

/// Builder for [`ChatSession`].
pub struct ChatSessionBuilder<S> {
    store: Arc<S>,
    backend: Arc<BoxGenerationBackend>,
    bus: BroadcastBus,
    cache: Arc<dyn TranscriptCache>,
    commands: Option<CommandDispatcher>,
    config: ChatConfig,
    topic: String,
}

impl<S: MessageStore + 'static> ChatSessionBuilder<S> {
    /// `store` should publish its mutations to `bus` (see `BroadcastingStore`),
    /// otherwise new messages never reach the transcript.
    pub fn new(store: Arc<S>, backend: Arc<BoxGenerationBackend>, bus: BroadcastBus) -> Self {
        Self {
            store,
            backend,
            bus,
            cache: Arc::new(NoopCache),
            commands: None,
            config: ChatConfig::default(),
            topic: DEFAULT_TOPIC.to_string(),
        }
    }

    pub fn config(mut self, config: ChatConfig) -> Self {
        self.config = config;
        self
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    pub fn cache(mut self, cache: Arc<dyn TranscriptCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Replace the default dispatcher built from the config.
    pub fn commands(mut self, commands: CommandDispatcher) -> Self {
        self.commands = Some(commands);
        self
    }

    /// Prefill from cache, subscribe, load the authoritative history, and
    /// spawn the background tasks.
    pub async fn start(self) -> Result<ChatSession<S>, SessionError> {
        self.prepare().await.load().await
    }

    /// Prefill the transcript from cache and subscribe to the topic, without
    /// touching the store yet.
    ///
    /// The returned session shows the cached snapshot until
    /// [`PreparedSession::load`] replaces it with the store's listing.
    pub async fn prepare(self) -> PreparedSession<S> {
        let commands = self.commands.unwrap_or_else(|| {
            CommandDispatcher::new(self.config.command_marker, self.config.unknown_command)
        });

        let mut transcript = Transcript::new();
        let cache = Arc::clone(&self.cache);
        match tokio::task::spawn_blocking(move || cache.load()).await {
            Ok(Some(cached)) => {
                transcript.replace_all(cached);
                debug!(count = transcript.len(), "transcript prefilled from cache");
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "transcript cache task failed"),
        }

        let (transcript_tx, _) = watch::channel(transcript);
        let (loading_tx, _) = watch::channel(false);

        // Subscribe before listing so nothing published in between is lost.
        let events = self.bus.subscribe(&self.topic);

        let state = Arc::new(SessionState {
            store: self.store,
            backend: self.backend,
            cache: self.cache,
            commands,
            config: self.config,
            topic: self.topic,
            transcript: transcript_tx,
            loading: loading_tx,
            pending: Mutex::new(None),
            generation_seq: AtomicU64::new(0),
        });
        PreparedSession { state, events }
    }
}

/// A session whose transcript holds only the cached snapshot.
pub struct PreparedSession<S> {
    state: Arc<SessionState<S>>,
    events: broadcast::Receiver<TranscriptEvent>,
}

impl<S: MessageStore + 'static> PreparedSession<S> {
    /// The receiver stays valid after `load`, so a display can render the
    /// cached snapshot first and follow the session from there.
    pub fn subscribe_transcript(&self) -> watch::Receiver<Transcript> {
        self.state.transcript.subscribe()
    }

    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.state.snapshot()
    }

    /// Replace the prefill with the store's listing and spawn the background
    /// tasks. Events published since `prepare` are applied after the listing.
    ///
    /// If the listing fails the error is returned, and existing receivers
    /// keep the cached snapshot as their last value.
    pub async fn load(self) -> Result<ChatSession<S>, SessionError> {
        let Self { state, events } = self;
        let count = state.reload().await?;

        let shutdown = CancellationToken::new();
        let listener = tokio::spawn(run_listener(
            Arc::clone(&state),
            events,
            shutdown.clone(),
        ));
        let cache_writer = tokio::spawn(run_cache_writer(
            Arc::clone(&state.cache),
            state.transcript.subscribe(),
            shutdown.clone(),
        ));

        info!(topic = %state.topic, messages = count, "chat session started");
        Ok(ChatSession {
            state,
            shutdown,
            tasks: vec![listener, cache_writer],
        })
    }
}

/// A live chat session bound to one bus topic.
pub struct ChatSession<S> {
    state: Arc<SessionState<S>>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl<S: MessageStore + 'static> ChatSession<S> {
    pub fn builder(
        store: Arc<S>,
        backend: Arc<BoxGenerationBackend>,
        bus: BroadcastBus,
    ) -> ChatSessionBuilder<S> {
        ChatSessionBuilder::new(store, backend, bus)
    }

    /// Validate and persist `text`, then run it as a command or start a
    /// generation.
    ///
    /// The user message is not appended here; it appears when its `created`
    /// echo arrives.
    pub async fn submit(
        &self,
        text: &str,
        model_id: &str,
        credential: &SecretString,
    ) -> Result<SubmitOutcome, SessionError> {
        validate_submission(&self.state.config, text, model_id, credential)?;

        let user = self.state.store.create(&NewMessage::user(text)).await?;
        debug!(message_id = %user.id, kind = %MessageKind::User, "user message persisted");

        if self.state.commands.is_command(text) {
            let host: &dyn CommandHost = &*self.state;
            match self.state.commands.dispatch(text, host).await? {
                Dispatch::Handled => return Ok(SubmitOutcome::Command),
                Dispatch::PassThrough => {}
            }
        }

        let handle = SessionState::start_generation(&self.state, text, model_id, credential).await?;
        Ok(SubmitOutcome::Generating(handle))
    }

    /// Truncate the store, then empty the local transcript and cache.
    ///
    /// On failure the transcript is left as it was.
    pub async fn clear_history(&self) -> Result<(), SessionError> {
        self.state.clear_history().await
    }

    /// Replace a bot message's content locally right away and persist it in
    /// the background.
    pub fn edit_message(&self, id: MessageId, content: impl Into<String>) -> Result<(), SessionError> {
        let kind = self.state.transcript.borrow().get(&id).map(|m| m.kind);
        match kind {
            None => return Err(SessionError::UnknownMessage(id)),
            Some(MessageKind::User) => return Err(ValidationError::ImmutableMessage(id).into()),
            Some(MessageKind::Bot) => {}
        }

        let content = content.into();
        self.state
            .transcript
            .send_if_modified(|t| t.apply_updated(&id, &content));

        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            match state.store.update(&id, &content).await {
                Ok(()) => debug!(message_id = %id, "edit persisted"),
                Err(e) => warn!(message_id = %id, error = %e, "failed to persist edit"),
            }
        });
        Ok(())
    }

    /// Ask the store to delete a message. It leaves the transcript when the
    /// `deleted` echo arrives.
    pub async fn delete_message(&self, id: MessageId) -> Result<(), SessionError> {
        self.state.store.delete(&id).await?;
        Ok(())
    }

    /// Replace the transcript with the store's listing.
    pub async fn reload(&self) -> Result<usize, SessionError> {
        self.state.reload().await
    }

    /// Cancel the pending generation. Returns whether one was running.
    pub fn cancel_generation(&self) -> bool {
        self.state.cancel_pending()
    }

    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.state.snapshot()
    }

    pub fn subscribe_transcript(&self) -> watch::Receiver<Transcript> {
        self.state.transcript.subscribe()
    }

    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.state.loading.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        *self.state.loading.borrow()
    }

    pub fn topic(&self) -> &str {
        &self.state.topic
    }

    pub fn config(&self) -> &ChatConfig {
        &self.state.config
    }

    pub fn commands(&self) -> &CommandDispatcher {
        &self.state.commands
    }

    /// Cancel any generation, stop the background tasks, and release the
    /// bus subscription.
    pub async fn shutdown(mut self) {
        self.state.cancel_pending();
        self.shutdown.cancel();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                warn!(error = %e, "session task ended abnormally");
            }
        }
        info!(topic = %self.state.topic, "chat session stopped");
    }
}

impl<S> Drop for ChatSession<S> {
    fn drop(&mut self) {
        self.state.cancel_pending();
        self.shutdown.cancel();
    }
}

async fn run_listener<S: MessageStore + 'static>(
    state: Arc<SessionState<S>>,
    mut events: broadcast::Receiver<TranscriptEvent>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            received = events.recv() => match received {
                Ok(event) => state.apply_event(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(topic = %state.topic, skipped, "transcript subscriber lagged, reloading");
                    if let Err(e) = state.reload().await {
                        warn!(topic = %state.topic, error = %e, "reload after lag failed");
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    debug!(topic = %state.topic, "transcript listener stopped");
}

async fn run_cache_writer(
    cache: Arc<dyn TranscriptCache>,
    mut transcript: watch::Receiver<Transcript>,
    shutdown: CancellationToken,
) {
    let initial = transcript.borrow_and_update().messages().to_vec();
    save_snapshot(&cache, initial).await;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            changed = transcript.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = transcript.borrow_and_update().messages().to_vec();
                save_snapshot(&cache, snapshot).await;
            }
        }
    }
}

async fn save_snapshot(cache: &Arc<dyn TranscriptCache>, snapshot: Vec<ChatMessage>) {
    let cache = Arc::clone(cache);
    match tokio::task::spawn_blocking(move || cache.save(&snapshot)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "failed to write transcript cache"),
        Err(e) => warn!(error = %e, "transcript cache task failed"),
    }
}
