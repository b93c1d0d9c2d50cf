//! `/api/health/` (liveness) and `/api/health/detailed` (per-backend status).

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::app::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(Serialize)]
pub struct BackendStatus {
    pub ok: bool,
    pub error: Option<String>,
}

impl BackendStatus {
    fn from_result<E: std::fmt::Display>(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self { ok: true, error: None },
            Err(e) => Self { ok: false, error: Some(e.to_string()) },
        }
    }
}

#[derive(Serialize)]
pub struct DetailedHealthResponse {
    pub cache: BackendStatus,
    pub row_store: BackendStatus,
    pub text_index: BackendStatus,
    pub graph_engine: BackendStatus,
    pub intent_route_cache: ragcore::CacheStats,
}

pub async fn detailed(State(state): State<AppState>) -> Json<DetailedHealthResponse> {
    let (cache, row_store, text_index, graph_engine) = tokio::join!(
        state.cache_store.ping(),
        state.row_store.ping(),
        state.text_index.ping(),
        state.graph_engine.ping(),
    );

    Json(DetailedHealthResponse {
        cache: BackendStatus::from_result(cache),
        row_store: BackendStatus::from_result(row_store),
        text_index: BackendStatus::from_result(text_index),
        graph_engine: BackendStatus::from_result(graph_engine),
        intent_route_cache: state.orchestrator.router_cache_stats(),
    })
}
