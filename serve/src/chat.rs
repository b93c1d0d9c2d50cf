//! `POST /api/chat/`: same pipeline as the streaming endpoint, buffered into
//! one JSON response for callers that don't want SSE.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;

use ragcore::Mode;

use crate::app::AppState;

#[derive(Deserialize)]
pub struct ChatRequest {
    pub user_id: String,
    pub session_id: String,
    pub question: String,
    /// `1 = hybrid, 2 = graph_only, 3 = text_only`.
    pub scene_id: i32,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub knowledge: serde_json::Value,
}

pub(crate) fn mode_from_request(req: &ChatRequest) -> Result<Mode, (StatusCode, String)> {
    Mode::from_scene_id(req.scene_id).ok_or_else(|| {
        (StatusCode::BAD_REQUEST, format!("unknown scene_id: {}", req.scene_id))
    })
}

pub async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    let mode = mode_from_request(&req)?;
    let mut stream = state.orchestrator.run(mode, req.user_id, req.session_id, req.question);

    let mut answer = String::new();
    let mut citations = Vec::new();
    while let Some(frame) = stream.next().await {
        if frame.is_data() {
            if frame.content != "<data>" && frame.content != "</data>" {
                answer.push_str(&frame.content);
            }
        } else if frame.is_knowledge() {
            if frame.content != "<knowledge>" && frame.content != "</knowledge>" {
                citations.push(serde_json::Value::String(frame.content));
            }
        } else if frame.is_error() {
            return Err((StatusCode::BAD_GATEWAY, frame.content));
        }
    }

    Ok(Json(ChatResponse { answer, knowledge: serde_json::Value::Array(citations) }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_from_request_rejects_unknown_scene_id() {
        let req = ChatRequest { user_id: "u".into(), session_id: "s".into(), question: "q".into(), scene_id: 99 };
        assert!(mode_from_request(&req).is_err());
    }

    #[test]
    fn mode_from_request_accepts_known_scene_ids() {
        for (scene_id, expected) in [(1, Mode::Hybrid), (2, Mode::GraphOnly), (3, Mode::TextOnly)] {
            let req = ChatRequest { user_id: "u".into(), session_id: "s".into(), question: "q".into(), scene_id };
            assert_eq!(mode_from_request(&req).unwrap(), expected);
        }
    }
}
