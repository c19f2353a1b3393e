//! Hand-written doubles for the core traits, shared by unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use threadline_types::error::{GenerationError, RepositoryError};
use threadline_types::message::{ChatMessage, MessageId, NewMessage};
use tokio::sync::{Semaphore, mpsc};
use uuid::Uuid;

use crate::generation::{ByteStream, GenerationBackend, GenerationRequest};
use crate::repository::MessageStore;

/// In-memory `MessageStore` that counts every call.
#[derive(Default)]
pub struct MockStore {
    messages: Mutex<Vec<ChatMessage>>,
    creates: AtomicUsize,
    updates: Mutex<Vec<(MessageId, String)>>,
    deletes: AtomicUsize,
    truncates: AtomicUsize,
    lists: AtomicUsize,
    fail_truncate: AtomicBool,
    fail_updates: AtomicBool,
    slow_ack: Mutex<Option<(String, Duration)>>,
    list_gate: Mutex<Option<Arc<Semaphore>>>,
}

impl MockStore {
    pub fn fail_truncate(&self, fail: bool) {
        self.fail_truncate.store(fail, Ordering::SeqCst);
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Apply updates carrying `content` immediately but return only after `delay`.
    pub fn slow_ack(&self, content: &str, delay: Duration) {
        *self.slow_ack.lock().unwrap() = Some((content.to_string(), delay));
    }

    /// Hold every `list_all` until the returned semaphore gets a permit.
    pub fn hold_listing(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.list_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Insert records directly, bypassing call counters.
    pub fn seed(&self, messages: Vec<ChatMessage>) {
        self.messages.lock().unwrap().extend(messages);
    }

    pub fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> Vec<(MessageId, String)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn delete_calls(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn truncate_calls(&self) -> usize {
        self.truncates.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    /// Every mutating call made so far.
    pub fn mutation_calls(&self) -> usize {
        self.create_calls() + self.update_calls().len() + self.delete_calls() + self.truncate_calls()
    }

    pub fn contents(&self) -> Vec<ChatMessage> {
        self.messages.lock().unwrap().clone()
    }
}

impl MessageStore for MockStore {
    async fn list_all(&self) -> Result<Vec<ChatMessage>, RepositoryError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        let gate = self.list_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await.map_err(|_| RepositoryError::Connection)?;
        }
        Ok(self.contents())
    }

    async fn create(&self, message: &NewMessage) -> Result<ChatMessage, RepositoryError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let created = ChatMessage {
            id: MessageId(Uuid::now_v7()),
            kind: message.kind,
            content: message.content.clone(),
        };
        self.messages.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update(&self, id: &MessageId, content: &str) -> Result<(), RepositoryError> {
        self.updates
            .lock()
            .unwrap()
            .push((*id, content.to_string()));
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(RepositoryError::Query("update rejected".to_string()));
        }
        {
            let mut messages = self.messages.lock().unwrap();
            let entry = messages
                .iter_mut()
                .find(|m| m.id == *id)
                .ok_or(RepositoryError::NotFound)?;
            entry.content = content.to_string();
        }
        let delay = match &*self.slow_ack.lock().unwrap() {
            Some((slow, delay)) if slow == content => Some(*delay),
            _ => None,
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn delete(&self, id: &MessageId) -> Result<(), RepositoryError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        let mut messages = self.messages.lock().unwrap();
        let before = messages.len();
        messages.retain(|m| m.id != *id);
        if messages.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn truncate(&self) -> Result<(), RepositoryError> {
        self.truncates.fetch_add(1, Ordering::SeqCst);
        if self.fail_truncate.load(Ordering::SeqCst) {
            return Err(RepositoryError::Connection);
        }
        self.messages.lock().unwrap().clear();
        Ok(())
    }
}

enum Script {
    Items(Vec<Result<Vec<u8>, String>>),
    Reject { status: u16, body: String },
    Channel(Mutex<Option<mpsc::UnboundedReceiver<Result<Vec<u8>, GenerationError>>>>),
}

/// `GenerationBackend` that replays a fixed script.
pub struct ScriptedBackend {
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn chunks<I, T>(chunks: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        Self::bytes(chunks.into_iter().map(|c| c.as_ref().to_vec()).collect())
    }

    pub fn bytes(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            script: Script::Items(chunks.into_iter().map(Ok).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Yields `chunks`, then fails mid-stream with `reason`.
    pub fn failing_after<I, T>(chunks: I, reason: &str) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut items: Vec<Result<Vec<u8>, String>> =
            chunks.into_iter().map(|c| Ok(c.as_ref().to_vec())).collect();
        items.push(Err(reason.to_string()));
        Self {
            script: Script::Items(items),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn rejecting(status: u16, body: &str) -> Self {
        Self {
            script: Script::Reject {
                status,
                body: body.to_string(),
            },
            calls: AtomicUsize::new(0),
        }
    }

    /// Body driven by the returned sender; it ends when the sender drops.
    /// Only the first `open` receives the body.
    pub fn channel() -> (Self, mpsc::UnboundedSender<Result<Vec<u8>, GenerationError>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                script: Script::Channel(Mutex::new(Some(rx))),
                calls: AtomicUsize::new(0),
            },
            tx,
        )
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn open(&self, _request: &GenerationRequest) -> Result<ByteStream, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Reject { status, body } => Err(GenerationError::Rejected {
                status: *status,
                body: body.clone(),
            }),
            Script::Items(items) => {
                let items = items.clone();
                Ok(Box::pin(async_stream::stream! {
                    for item in items {
                        yield item.map_err(GenerationError::Stream);
                    }
                }))
            }
            Script::Channel(slot) => {
                let mut rx = slot
                    .lock()
                    .unwrap()
                    .take()
                    .ok_or_else(|| GenerationError::Request("body already taken".to_string()))?;
                Ok(Box::pin(async_stream::stream! {
                    while let Some(item) = rx.recv().await {
                        yield item;
                    }
                }))
            }
        }
    }
}
