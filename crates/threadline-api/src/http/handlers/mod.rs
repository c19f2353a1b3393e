//! HTTP request handlers for the REST API and the event feed.

pub mod messages;
pub mod ws;
