//! StreamingReader -- drives one pending generation from raw bytes to a
//! persisted bot message.
//!
//! While the body streams, each chunk is decoded and the full accumulated
//! text is pushed to a local-only progress callback (no store call, no
//! broadcast). When the body ends, exactly one `MessageStore::update` writes
//! the final text, which the broadcasting store echoes as `updated`.

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use threadline_types::error::GenerationError;
use threadline_types::message::{MessageId, error_content};

use super::decoder::Utf8StreamDecoder;
use crate::generation::ByteStream;
use crate::repository::MessageStore;

/// How a pending generation ended.
#[derive(Debug)]
pub enum StreamOutcome {
    /// Body fully consumed and the final text persisted.
    Completed(String),
    /// Stopped by cancellation. Nothing was persisted.
    Cancelled(String),
    /// The stream or the final persist failed. `content` is what the
    /// placeholder was finalized with (or the local text, if persisting
    /// failed).
    Failed {
        error: GenerationError,
        content: String,
    },
}

impl StreamOutcome {
    /// Text the placeholder ended with locally.
    pub fn content(&self) -> &str {
        match self {
            StreamOutcome::Completed(content) | StreamOutcome::Cancelled(content) => content,
            StreamOutcome::Failed { content, .. } => content,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, StreamOutcome::Completed(_))
    }
}

/// Reader for a single placeholder message.
#[derive(Debug, Clone)]
pub struct StreamingReader {
    placeholder: MessageId,
    cancel: CancellationToken,
}

impl StreamingReader {
    pub fn new(placeholder: MessageId, cancel: CancellationToken) -> Self {
        Self {
            placeholder,
            cancel,
        }
    }

    pub fn placeholder(&self) -> MessageId {
        self.placeholder
    }

    /// Consume `body` until it ends, fails, or the token is cancelled.
    pub async fn run<S, F>(self, mut body: ByteStream, store: &S, mut on_progress: F) -> StreamOutcome
    where
        S: MessageStore + ?Sized,
        F: FnMut(&str) + Send,
    {
        let mut decoder = Utf8StreamDecoder::new();
        let mut text = String::new();
        let mut chunks = 0usize;

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(message_id = %self.placeholder, chunks, "generation cancelled");
                    return StreamOutcome::Cancelled(text);
                }
                next = body.next() => next,
            };

            match next {
                Some(Ok(bytes)) => {
                    chunks += 1;
                    text.push_str(&decoder.decode(&bytes));
                    on_progress(&text);
                }
                Some(Err(error)) => {
                    text.push_str(&decoder.finish());
                    return self.finalize_failure(store, error, &text, &mut on_progress).await;
                }
                None => break,
            }
        }

        let tail = decoder.finish();
        if !tail.is_empty() {
            text.push_str(&tail);
            on_progress(&text);
        }

        match store.update(&self.placeholder, &text).await {
            Ok(()) => {
                debug!(message_id = %self.placeholder, chunks, len = text.len(), "generation persisted");
                StreamOutcome::Completed(text)
            }
            Err(e) => {
                warn!(message_id = %self.placeholder, error = %e, "failed to persist generated message");
                StreamOutcome::Failed {
                    error: GenerationError::Persist(e.to_string()),
                    content: text,
                }
            }
        }
    }

    async fn finalize_failure<S, F>(
        &self,
        store: &S,
        error: GenerationError,
        partial: &str,
        on_progress: &mut F,
    ) -> StreamOutcome
    where
        S: MessageStore + ?Sized,
        F: FnMut(&str) + Send,
    {
        warn!(message_id = %self.placeholder, error = %error, "generation stream failed");
        let content = error_content(partial, &error.to_string());
        on_progress(&content);
        if let Err(e) = store.update(&self.placeholder, &content).await {
            warn!(message_id = %self.placeholder, error = %e, "failed to persist error marker");
        }
        StreamOutcome::Failed { error, content }
    }
}
