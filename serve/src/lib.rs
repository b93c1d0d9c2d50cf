//! HTTP server for the streaming RAG chat backend (axum).
//!
//! Routes: `POST /api/chat/stream` (SSE), `POST /api/chat/` (buffered),
//! session CRUD under `/api/sessions`, and `/api/health/`.
//!
//! **Public API**: [`run_serve`], [`app::router`], [`app::AppState`].

pub mod app;
mod chat;
mod chat_stream;
mod health;
mod sessions;

use tokio::net::TcpListener;
use tracing::info;

pub use app::AppState;

const DEFAULT_ADDR: &str = "0.0.0.0:8080";

/// Runs the HTTP server on `addr` (default `0.0.0.0:8080`) until the process
/// receives a shutdown signal.
pub async fn run_serve(addr: Option<&str>, state: AppState) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = addr.unwrap_or(DEFAULT_ADDR);
    let listener = TcpListener::bind(addr).await?;
    run_serve_on_listener(listener, state).await
}

/// Runs the HTTP server on an already-bound listener. Used by tests (bind to
/// `127.0.0.1:0`, then pass the listener, so the OS picks a free port).
pub async fn run_serve_on_listener(
    listener: TcpListener,
    state: AppState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = listener.local_addr()?;
    info!("listening on http://{addr}");
    let app = app::router(state);
    axum::serve(listener, app).await?;
    Ok(())
}
