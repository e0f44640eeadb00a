use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "human")]
    Human,
    #[serde(rename = "ai")]
    Assistant,
}

impl Role {
    /// Storage / wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Human => "human",
            Role::Assistant => "ai",
        }
    }

    /// Prefix used when rendering a transcript line.
    pub fn label(&self) -> &'static str {
        match self {
            Role::Human => "Human",
            Role::Assistant => "AI",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "human" | "user" => Some(Role::Human),
            "ai" | "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// One message in a conversation. Never edited after it joins a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
        }
    }
}

/// A conversation owned by one user identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub owner_identifier: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Session {
    pub fn new(owner_identifier: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            owner_identifier: owner_identifier.into(),
            created_at,
            last_updated: created_at,
        }
    }

    /// Moves `last_updated` forward; never backwards.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        if at > self.last_updated {
            self.last_updated = at;
        }
    }
}

/// A vector-store hit, ordered by descending similarity by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedDocument {
    pub content: String,
    pub similarity_score: f32,
}

/// A chunk of an uploaded document ready to be written to the vector store.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub id: Uuid,
    pub content: String,
    pub metadata: serde_json::Value,
    pub embedding: Vec<f32>,
}

/// Result of one chat exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatOutcome {
    pub reply: String,
    pub retrieval_used: bool,
}
