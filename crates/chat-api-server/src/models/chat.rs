use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::conversation::{ChatOutcome, Session};

// ===== REQUEST MODELS =====

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(alias = "email_id")]
    pub owner_identifier: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub text: String,
    pub session_id: String,
}

// ===== RESPONSE MODELS =====

#[derive(Debug, Serialize)]
pub struct WelcomeResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub owner_identifier: String,
    pub created_at: DateTime<Utc>,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            session_id: session.session_id,
            owner_identifier: session.owner_identifier,
            created_at: session.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub retrieval_used: bool,
}

impl From<ChatOutcome> for ChatResponse {
    fn from(outcome: ChatOutcome) -> Self {
        Self {
            reply: outcome.reply,
            retrieval_used: outcome.retrieval_used,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub session_id: String,
    pub summary: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: String,
    pub pages: usize,
    pub chunks: usize,
}
