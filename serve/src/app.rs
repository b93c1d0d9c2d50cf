//! Axum app: shared state and router.

use std::sync::Arc;

use axum::routing::{delete, get, patch, post};
use axum::Router;
use ragcore::{CacheStore, GraphEngine, Orchestrator, RowStore, SessionStore, TextIndex};

use crate::{chat, chat_stream, health, sessions};

/// Shared state, constructed once at startup and cloned (cheaply, via `Arc`
/// fields) into every request.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub sessions: Arc<SessionStore>,
    pub cache_store: Arc<dyn CacheStore>,
    pub row_store: Arc<dyn RowStore>,
    pub text_index: Arc<dyn TextIndex>,
    pub graph_engine: Arc<dyn GraphEngine>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat/stream", post(chat_stream::handle_stream))
        .route("/api/chat/", post(chat::handle_chat))
        .route("/api/sessions", post(sessions::create).get(sessions::list))
        .route("/api/sessions/:session_id", delete(sessions::delete_session))
        .route("/api/sessions/:session_id/rename", patch(sessions::rename))
        .route("/api/sessions/:session_id/messages", get(sessions::messages).delete(sessions::clear_messages))
        .route("/api/health/", get(health::health))
        .route("/api/health/detailed", get(health::detailed))
        .with_state(state)
}
