//! Session orchestration and port definitions for Threadline.
//!
//! This crate defines the "ports" (store, generation backend and cache
//! traits) that the infrastructure layer implements, plus the broadcast bus
//! and the chat session engine built on top of them. It depends only on
//! `threadline-types` -- never on `threadline-infra` or any database/IO crate.

pub mod chat;
pub mod event;
pub mod generation;
pub mod repository;

#[cfg(test)]
pub(crate) mod test_support;
