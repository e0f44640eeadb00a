use super::{ChatHistoryRow, DbPool, DocumentMatchRow, SessionRow};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use pgvector::Vector;
use tracing::debug;

use crate::services::conversation::manager::{SessionStore, VectorStore};
use crate::services::conversation::{NewDocument, RetrievedDocument, Session, Turn};

pub struct Repository {
    pub pool: DbPool,
}

impl Repository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SessionStore for Repository {
    async fn insert_session(&self, session: &Session) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO sessions (session_id, owner_identifier, created_at, last_updated)
               VALUES ($1, $2, $3, $4)"#,
        )
        .bind(&session.session_id)
        .bind(&session.owner_identifier)
        .bind(session.created_at)
        .bind(session.last_updated)
        .execute(self.pool.get_pool())
        .await
        .context("Failed to insert session")?;

        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"SELECT session_id, owner_identifier, created_at, last_updated
               FROM sessions
               WHERE session_id = $1"#,
        )
        .bind(session_id)
        .fetch_optional(self.pool.get_pool())
        .await?;

        Ok(row.map(Session::from))
    }

    async fn get_sessions_by_owner(&self, owner_identifier: &str) -> Result<Vec<Session>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            r#"SELECT session_id, owner_identifier, created_at, last_updated
               FROM sessions
               WHERE owner_identifier = $1
               ORDER BY created_at DESC"#,
        )
        .bind(owner_identifier)
        .fetch_all(self.pool.get_pool())
        .await?;

        debug!("Found {} sessions for {}", rows.len(), owner_identifier);

        Ok(rows.into_iter().map(Session::from).collect())
    }

    async fn insert_turns(&self, session_id: &str, turns: &[Turn]) -> Result<()> {
        let mut tx = self.pool.get_pool().begin().await?;

        for turn in turns {
            sqlx::query(
                r#"INSERT INTO chat_history (session_id, role, message, timestamp)
                   VALUES ($1, $2, $3, $4)"#,
            )
            .bind(session_id)
            .bind(turn.role.as_str())
            .bind(&turn.content)
            .bind(turn.timestamp)
            .execute(&mut *tx)
            .await
            .context("Failed to insert chat turn")?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_turns_by_session(&self, session_id: &str) -> Result<Vec<Turn>> {
        let rows = sqlx::query_as::<_, ChatHistoryRow>(
            r#"SELECT id, role, message, timestamp
               FROM chat_history
               WHERE session_id = $1
               ORDER BY timestamp ASC, id ASC"#,
        )
        .bind(session_id)
        .fetch_all(self.pool.get_pool())
        .await?;

        rows.into_iter().map(Turn::try_from).collect()
    }

    async fn update_session_timestamp(&self, session_id: &str, at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query("UPDATE sessions SET last_updated = GREATEST(last_updated, $2) WHERE session_id = $1")
            .bind(session_id)
            .bind(at)
            .execute(self.pool.get_pool())
            .await?;

        if result.rows_affected() == 0 {
            anyhow::bail!("Session {} disappeared before its timestamp update", session_id);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(self.pool.get_pool()).await?;
        Ok(())
    }
}

/// `match_documents` takes an `int`; oversized limits saturate.
fn match_count(limit: usize) -> i32 {
    i32::try_from(limit).unwrap_or(i32::MAX)
}

#[async_trait::async_trait]
impl VectorStore for Repository {
    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_similarity: f32,
    ) -> Result<Vec<RetrievedDocument>> {
        let rows = sqlx::query_as::<_, DocumentMatchRow>(
            r#"SELECT content, similarity
               FROM match_documents($1, $2, $3)"#,
        )
        .bind(Vector::from(query_embedding.to_vec()))
        .bind(min_similarity as f64)
        .bind(match_count(limit))
        .persistent(false)
        .fetch_all(self.pool.get_pool())
        .await
        .context("match_documents failed")?;

        debug!("match_documents returned {} rows", rows.len());

        Ok(rows
            .into_iter()
            .map(|row| RetrievedDocument {
                content: row.content,
                similarity_score: row.similarity as f32,
            })
            .collect())
    }

    async fn insert_documents(&self, documents: Vec<NewDocument>) -> Result<usize> {
        let count = documents.len();
        let mut tx = self.pool.get_pool().begin().await?;

        for doc in documents {
            sqlx::query(
                r#"INSERT INTO documents (id, content, metadata, embedding)
                   VALUES ($1, $2, $3, $4)"#,
            )
            .bind(doc.id)
            .bind(doc.content)
            .bind(doc.metadata)
            .bind(Vector::from(doc.embedding))
            .execute(&mut *tx)
            .await
            .context("Failed to insert document chunk")?;
        }

        tx.commit().await?;
        debug!("Inserted {} document chunks", count);

        Ok(count)
    }
}
