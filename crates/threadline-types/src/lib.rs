//! Shared domain types for Threadline.
//!
//! This crate contains the core domain types used across the workspace:
//! chat messages, transcript events, configuration, and their error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod message;
