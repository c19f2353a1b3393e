//! Broadcast fan-out of store mutations.
//!
//! `BroadcastBus` distributes `TranscriptEvent` to every subscribed session;
//! `BroadcastingStore` wraps a `MessageStore` so each successful mutation is
//! published to the bus.

pub mod broadcasting;
pub mod bus;

pub use broadcasting::BroadcastingStore;
pub use bus::BroadcastBus;
