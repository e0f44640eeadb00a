use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::models::chat::WelcomeResponse;
use crate::services::conversation::SessionStore;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
}

pub async fn root() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: "Welcome to the chat API. Create a session with POST /session, then POST /chat."
            .to_string(),
    })
}

pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

pub async fn readiness_check(State(session_store): State<Arc<dyn SessionStore>>) -> StatusCode {
    match session_store.ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            warn!("Readiness check failed: {:#}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
