//! Infrastructure layer for Threadline.
//!
//! Contains implementations of the ports defined in `threadline-core`:
//! SQLite message storage, the streaming HTTP generation backend, the JSON
//! transcript cache, and the `config.toml` loader.

pub mod cache;
pub mod config;
pub mod generation;
pub mod sqlite;
