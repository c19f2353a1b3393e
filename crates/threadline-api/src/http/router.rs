//! Axum router configuration with middleware.
//!
//! REST routes live under `/api/`, the event feed at `/ws/events`.
//! Middleware: CORS, tracing.

use axum::Router;
use axum::routing::{get, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route(
            "/messages",
            get(handlers::messages::list_messages)
                .post(handlers::messages::create_message)
                .delete(handlers::messages::truncate_messages),
        )
        .route(
            "/messages/{id}",
            put(handlers::messages::update_message).delete(handlers::messages::delete_message),
        );

    Router::new()
        .nest("/api", api_routes)
        .route("/ws/events", get(handlers::ws::ws_handler))
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint.
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Bind `addr` and serve the router until `shutdown` resolves.
pub async fn serve(
    state: AppState,
    addr: &str,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "HTTP server listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_health_and_list_over_tcp() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::init_in(dir.path()).await.unwrap();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, build_router(state)).await.unwrap();
        });

        for (path, needle) in [("/health", "\"status\":\"ok\""), ("/api/messages", "\"data\":[]")] {
            let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
            let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
            stream.write_all(request.as_bytes()).await.unwrap();
            let mut response = String::new();
            stream.read_to_string(&mut response).await.unwrap();

            assert!(response.starts_with("HTTP/1.1 200"), "{path}: {response}");
            assert!(response.contains(needle), "{path}: {response}");
        }
    }
}
