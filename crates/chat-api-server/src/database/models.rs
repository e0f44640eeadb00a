use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::services::conversation::{Role, Session, Turn};

#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub session_id: String,
    pub owner_identifier: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            session_id: row.session_id,
            owner_identifier: row.owner_identifier,
            created_at: row.created_at,
            last_updated: row.last_updated,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ChatHistoryRow {
    pub id: i64,
    pub role: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl TryFrom<ChatHistoryRow> for Turn {
    type Error = anyhow::Error;

    fn try_from(row: ChatHistoryRow) -> Result<Self> {
        let role = Role::parse(&row.role)
            .ok_or_else(|| anyhow!("Unknown role '{}' in chat_history row {}", row.role, row.id))?;
        Ok(Turn::new(role, row.message, row.timestamp))
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DocumentMatchRow {
    pub content: String,
    pub similarity: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(role: &str) -> ChatHistoryRow {
        ChatHistoryRow {
            id: 7,
            role: role.to_string(),
            message: "hello".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_history_row_to_turn() {
        let turn = Turn::try_from(row("ai")).unwrap();
        assert_eq!(turn.role, Role::Assistant);
        assert_eq!(turn.content, "hello");
    }

    #[test]
    fn test_history_row_with_unknown_role() {
        let err = Turn::try_from(row("system")).unwrap_err();
        assert!(err.to_string().contains("row 7"));
    }
}
