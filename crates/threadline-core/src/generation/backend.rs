//! GenerationBackend trait definition.
//!
//! A backend turns a `GenerationRequest` into a raw byte stream. Rejection
//! before any bytes arrive is reported by `open` itself; failures after that
//! surface as `Err` items inside the stream.

use std::pin::Pin;

use futures_util::Stream;
use secrecy::SecretString;

use threadline_types::error::GenerationError;

/// Incremental response body. Ends when the backend has no more data.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, GenerationError>> + Send + 'static>>;

/// One request to generate a reply.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub text: String,
    pub model_id: String,
    pub credential: SecretString,
}

/// Trait for generation backends (HTTP endpoint, test doubles).
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition). Wrap in
/// `BoxGenerationBackend` for dynamic dispatch.
pub trait GenerationBackend: Send + Sync {
    /// Human-readable backend name, used in logs.
    fn name(&self) -> &str;

    /// Open the request and hand back the response body.
    fn open(
        &self,
        request: &GenerationRequest,
    ) -> impl std::future::Future<Output = Result<ByteStream, GenerationError>> + Send;
}

impl<T: GenerationBackend> GenerationBackend for std::sync::Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn open(&self, request: &GenerationRequest) -> Result<ByteStream, GenerationError> {
        (**self).open(request).await
    }
}
