//! `POST /api/chat/stream`: streams the pipeline's frames as they're produced,
//! one `data:{json}\n\n` record per [`frame::Frame`].

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use tokio_stream::StreamExt;

use crate::app::AppState;
use crate::chat::{mode_from_request, ChatRequest};

pub async fn handle_stream(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Response, (StatusCode, String)> {
    let mode = mode_from_request(&req)?;
    let frames = state.orchestrator.run(mode, req.user_id, req.session_id, req.question);

    let wire = frames.map(|f| {
        let encoded = f.to_wire().unwrap_or_else(|_| "data:{}\n\n".to_string());
        Ok::<_, std::io::Error>(encoded)
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(wire))
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
