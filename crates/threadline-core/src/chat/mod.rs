//! Chat session orchestration.
//!
//! `ChatSession` owns the transcript and coordinates the message store, the
//! broadcast bus, local commands, and streamed generation.

pub mod cache;
pub mod command;
pub mod decoder;
pub mod session;
pub mod stream_reader;
pub mod transcript;

pub use cache::{MemoryCache, NoopCache, TranscriptCache};
pub use command::{CommandContext, CommandDispatcher, CommandHandler, CommandHost, CommandInfo, Dispatch};
pub use decoder::Utf8StreamDecoder;
pub use session::{
    ChatSession, ChatSessionBuilder, GenerationHandle, PreparedSession, SubmitOutcome, validate_submission,
};
pub use stream_reader::{StreamOutcome, StreamingReader};
pub use transcript::Transcript;
