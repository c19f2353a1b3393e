//! Generation backend port.
//!
//! The infrastructure layer (threadline-infra) provides the HTTP
//! implementation; sessions hold a type-erased `BoxGenerationBackend`.

pub mod backend;
pub mod box_backend;

pub use backend::{ByteStream, GenerationBackend, GenerationRequest};
pub use box_backend::BoxGenerationBackend;
