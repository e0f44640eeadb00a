use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::info;

use crate::models::chat::{CreateSessionRequest, SessionResponse};
use crate::services::conversation::{ConversationManager, Session};
use crate::utils::error::ApiError;

pub async fn create_session(
    State(manager): State<Arc<ConversationManager>>,
    payload: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;

    let session = manager.create_session(&request.owner_identifier).await?;
    Ok((StatusCode::CREATED, Json(session.into())))
}

pub async fn list_sessions(
    State(manager): State<Arc<ConversationManager>>,
    Path(owner_identifier): Path<String>,
) -> Result<Json<Vec<Session>>, ApiError> {
    let sessions = manager.list_sessions(&owner_identifier).await?;
    info!("Listing {} sessions for {}", sessions.len(), owner_identifier);
    Ok(Json(sessions))
}
