use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Message returned to clients for collaborator failures; details stay in the logs.
pub const GENERIC_FAILURE: &str = "An error occurred while processing the request.";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Model, embedding, store or document loader failure.
    #[error("Service error: {0}")]
    Service(String),
}

impl ApiError {
    pub fn service(context: &str, err: impl std::fmt::Display) -> Self {
        ApiError::Service(format!("{}: {:#}", context, err))
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Service(format!("{:#}", err))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::NotFound(msg) => {
                tracing::warn!("Not found: {}", msg);
                (StatusCode::NOT_FOUND, "NotFound", msg)
            }
            ApiError::Validation(msg) => {
                tracing::warn!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, "ValidationError", msg)
            }
            ApiError::Service(msg) => {
                tracing::error!("Service error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "ServiceError",
                    GENERIC_FAILURE.to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}
