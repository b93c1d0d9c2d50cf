//! Session CRUD: create, list, rename, delete, and message-history endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use ragcore::{Session, StoredMessage};

use crate::app::AppState;

fn db_error(e: impl std::fmt::Display) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: String,
}

#[derive(Deserialize)]
pub struct CreateSessionRequest {
    pub user_id: String,
    pub name: String,
}

pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<Session>, (StatusCode, String)> {
    let session = state.sessions.create_session(&req.user_id, &req.name).await.map_err(db_error)?;
    Ok(Json(session))
}

pub async fn list(
    State(state): State<AppState>,
    Query(q): Query<UserIdQuery>,
) -> Result<Json<Vec<Session>>, (StatusCode, String)> {
    let sessions = state.sessions.list_sessions(&q.user_id).await.map_err(db_error)?;
    Ok(Json(sessions))
}

#[derive(Deserialize)]
pub struct RenameRequest {
    pub user_id: String,
    pub name: String,
}

#[derive(Serialize)]
pub struct RenameResponse {
    pub renamed: bool,
}

pub async fn rename(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<RenameRequest>,
) -> Result<Json<RenameResponse>, (StatusCode, String)> {
    let renamed = state.sessions.rename_session(&req.user_id, &session_id, &req.name).await.map_err(db_error)?;
    Ok(Json(RenameResponse { renamed }))
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(q): Query<UserIdQuery>,
) -> Result<Json<DeleteResponse>, (StatusCode, String)> {
    let deleted = state.sessions.delete_session(&q.user_id, &session_id).await.map_err(db_error)?;
    Ok(Json(DeleteResponse { deleted }))
}

pub async fn messages(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(q): Query<UserIdQuery>,
) -> Result<Json<Vec<StoredMessage>>, (StatusCode, String)> {
    let messages = state.sessions.get_messages(&q.user_id, &session_id).await.map_err(db_error)?;
    Ok(Json(messages))
}

#[derive(Serialize)]
pub struct ClearMessagesResponse {
    pub deleted: u64,
}

pub async fn clear_messages(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(q): Query<UserIdQuery>,
) -> Result<Json<ClearMessagesResponse>, (StatusCode, String)> {
    let deleted = state.sessions.clear_messages(&q.user_id, &session_id).await.map_err(db_error)?;
    Ok(Json(ClearMessagesResponse { deleted }))
}
