//! BoxGenerationBackend -- object-safe dynamic dispatch wrapper for
//! GenerationBackend.
//!
//! 1. `GenerationBackendDyn` is the object-safe mirror with a boxed future
//! 2. Blanket-impl `GenerationBackendDyn` for all `T: GenerationBackend`
//! 3. `BoxGenerationBackend` wraps `Box<dyn GenerationBackendDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use threadline_types::error::GenerationError;

use super::backend::{ByteStream, GenerationBackend, GenerationRequest};

/// Object-safe version of [`GenerationBackend`] with boxed futures.
pub trait GenerationBackendDyn: Send + Sync {
    fn name(&self) -> &str;

    fn open_boxed<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ByteStream, GenerationError>> + Send + 'a>>;
}

impl<T: GenerationBackend> GenerationBackendDyn for T {
    fn name(&self) -> &str {
        GenerationBackend::name(self)
    }

    fn open_boxed<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ByteStream, GenerationError>> + Send + 'a>> {
        Box::pin(self.open(request))
    }
}

/// Type-erased generation backend for runtime backend selection.
pub struct BoxGenerationBackend {
    inner: Box<dyn GenerationBackendDyn + Send + Sync>,
}

impl BoxGenerationBackend {
    pub fn new<T: GenerationBackend + 'static>(backend: T) -> Self {
        Self {
            inner: Box::new(backend),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn open(&self, request: &GenerationRequest) -> Result<ByteStream, GenerationError> {
        self.inner.open_boxed(request).await
    }
}

impl std::fmt::Debug for BoxGenerationBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxGenerationBackend")
            .field("name", &self.inner.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedBackend;
    use futures_util::StreamExt;
    use secrecy::SecretString;

    #[tokio::test]
    async fn boxed_backend_delegates_open() {
        let backend = BoxGenerationBackend::new(ScriptedBackend::chunks(["4", "!"]));
        assert_eq!(backend.name(), "scripted");

        let request = GenerationRequest {
            text: "2+2?".to_string(),
            model_id: "gpt-3.5-turbo".to_string(),
            credential: SecretString::from("sk-test".to_string()),
        };
        let mut body = backend.open(&request).await.unwrap();

        let mut collected = Vec::new();
        while let Some(chunk) = body.next().await {
            collected.extend(chunk.unwrap());
        }
        assert_eq!(collected, b"4!");
    }

    #[tokio::test]
    async fn boxed_backend_propagates_rejection() {
        let backend = BoxGenerationBackend::new(ScriptedBackend::rejecting(401, "invalid key"));
        let request = GenerationRequest {
            text: "hi".to_string(),
            model_id: "gpt-3.5-turbo".to_string(),
            credential: SecretString::from("sk-test".to_string()),
        };
        match backend.open(&request).await {
            Err(GenerationError::Rejected { status, body }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "invalid key");
            }
            Err(other) => panic!("expected Rejected, got {other:?}"),
            Ok(_) => panic!("expected Rejected, got a stream"),
        }
    }
}
