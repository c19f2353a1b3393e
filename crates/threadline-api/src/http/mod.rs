//! HTTP/WebSocket surface for Threadline.
//!
//! Axum-based REST API at `/api/` over the shared message store, a
//! WebSocket event feed at `/ws/events`, envelope response format and CORS.

pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
