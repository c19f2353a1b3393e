//! Local transcript cache implementations.

pub mod file;

pub use file::FileTranscriptCache;
