use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::models::chat::{ChatRequest, ChatResponse, SummaryResponse};
use crate::services::conversation::{ConversationManager, Turn};
use crate::utils::error::ApiError;

pub async fn chat_handler(
    State(manager): State<Arc<ConversationManager>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;
    let start_time = Instant::now();

    info!(
        "Chat request: session={}, message_len={}",
        request.session_id,
        request.text.len()
    );

    let outcome = manager.chat(&request.session_id, &request.text).await?;

    info!(
        "Chat completed: session={}, retrieval_used={}, processing_time_ms={}",
        request.session_id,
        outcome.retrieval_used,
        start_time.elapsed().as_millis()
    );

    Ok(Json(outcome.into()))
}

pub async fn history_handler(
    State(manager): State<Arc<ConversationManager>>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<Turn>>, ApiError> {
    let turns = manager.history(&session_id).await?;
    Ok(Json(turns))
}

pub async fn summary_handler(
    State(manager): State<Arc<ConversationManager>>,
    Path(session_id): Path<String>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let summary = manager.summary(&session_id).await?;
    Ok(Json(SummaryResponse {
        session_id,
        summary,
    }))
}
