use anyhow::Result;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

use crate::services::conversation::manager::{SessionStore, VectorStore};
use crate::services::conversation::{NewDocument, RetrievedDocument, Session, Turn};
use crate::utils::cosine_similarity;

/// In-process implementation of both stores.
///
/// Sessions and their turns are keyed by session id (DashMap); documents live
/// behind a single lock so a batch insert is all-or-nothing. Nothing survives
/// a restart.
#[derive(Clone, Default)]
pub struct MemoryStore {
    sessions: Arc<DashMap<String, Session>>,
    turns: Arc<DashMap<String, Vec<Turn>>>,
    documents: Arc<RwLock<Vec<NewDocument>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        info!("Initializing in-memory session and document store");
        Self::default()
    }

    pub fn document_count(&self) -> usize {
        self.documents.read().len()
    }
}

#[async_trait::async_trait]
impl SessionStore for MemoryStore {
    async fn insert_session(&self, session: &Session) -> Result<()> {
        if self.sessions.contains_key(&session.session_id) {
            anyhow::bail!("Session {} already exists", session.session_id);
        }
        self.sessions
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.get(session_id).map(|entry| entry.value().clone()))
    }

    async fn get_sessions_by_owner(&self, owner_identifier: &str) -> Result<Vec<Session>> {
        let mut sessions: Vec<Session> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().owner_identifier == owner_identifier)
            .map(|entry| entry.value().clone())
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn insert_turns(&self, session_id: &str, turns: &[Turn]) -> Result<()> {
        if !self.sessions.contains_key(session_id) {
            anyhow::bail!("Cannot insert turns for unknown session {}", session_id);
        }
        self.turns
            .entry(session_id.to_string())
            .or_default()
            .extend_from_slice(turns);
        debug!("Stored {} turns for session {}", turns.len(), session_id);
        Ok(())
    }

    async fn get_turns_by_session(&self, session_id: &str) -> Result<Vec<Turn>> {
        let mut turns = self
            .turns
            .get(session_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        turns.sort_by_key(|t| t.timestamp);
        Ok(turns)
    }

    async fn update_session_timestamp(&self, session_id: &str, at: DateTime<Utc>) -> Result<()> {
        match self.sessions.get_mut(session_id) {
            Some(mut entry) => {
                entry.value_mut().touch(at);
                Ok(())
            }
            None => anyhow::bail!("Session {} not found", session_id),
        }
    }
}

#[async_trait::async_trait]
impl VectorStore for MemoryStore {
    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_similarity: f32,
    ) -> Result<Vec<RetrievedDocument>> {
        let documents = self.documents.read();

        let mut hits: Vec<RetrievedDocument> = documents
            .iter()
            .filter_map(|doc| {
                // Chunks embedded with another model/dimension are skipped
                let score = cosine_similarity(query_embedding, &doc.embedding).ok()?;
                (score >= min_similarity).then(|| RetrievedDocument {
                    content: doc.content.clone(),
                    similarity_score: score,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn insert_documents(&self, documents: Vec<NewDocument>) -> Result<usize> {
        let count = documents.len();
        self.documents.write().extend(documents);
        Ok(count)
    }
}
