use anyhow::Result;
use chrono::{DateTime, SubsecRound, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::ChatConfig;
use crate::utils::error::ApiError;

use super::context_builder::ContextBuilder;
use super::retrieval::{augment_reply, RetrievalPolicy};
use super::transcript::Conversation;
use super::types::{ChatOutcome, NewDocument, RetrievedDocument, Role, Session, Turn};

/// Trait for the language-model completion service
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Trait for embedding service
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Trait for the vector similarity store
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Hits with similarity >= `min_similarity`, best first, at most `limit`.
    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_similarity: f32,
    ) -> Result<Vec<RetrievedDocument>>;

    /// Inserts the whole batch or nothing.
    async fn insert_documents(&self, documents: Vec<NewDocument>) -> Result<usize>;
}

/// Trait for the relational persistence store
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert_session(&self, session: &Session) -> Result<()>;
    async fn get_session(&self, session_id: &str) -> Result<Option<Session>>;
    /// Newest first.
    async fn get_sessions_by_owner(&self, owner_identifier: &str) -> Result<Vec<Session>>;
    async fn insert_turns(&self, session_id: &str, turns: &[Turn]) -> Result<()>;
    /// Ordered by timestamp.
    async fn get_turns_by_session(&self, session_id: &str) -> Result<Vec<Turn>>;
    /// Moves `last_updated` forward only; an older `at` leaves it unchanged.
    async fn update_session_timestamp(&self, session_id: &str, at: DateTime<Utc>) -> Result<()>;

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Owns the per-request conversation flow: load history, build the prompt,
/// call the model, optionally augment from the document store, persist.
pub struct ConversationManager {
    context_builder: ContextBuilder,
    retrieval_policy: RetrievalPolicy,
    retrieval_top_k: usize,
    match_threshold: f32,
    session_store: Arc<dyn SessionStore>,
    vector_store: Arc<dyn VectorStore>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    llm_provider: Arc<dyn LlmProvider>,
}

impl ConversationManager {
    pub fn new(
        config: &ChatConfig,
        session_store: Arc<dyn SessionStore>,
        vector_store: Arc<dyn VectorStore>,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        llm_provider: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            context_builder: ContextBuilder::new(config.memory, config.summary_char_budget),
            retrieval_policy: RetrievalPolicy::new(&config.retrieval_keywords),
            retrieval_top_k: config.retrieval_top_k.max(1),
            match_threshold: config.match_threshold,
            session_store,
            vector_store,
            embedding_provider,
            llm_provider,
        }
    }

    pub async fn create_session(&self, owner_identifier: &str) -> Result<Session, ApiError> {
        let owner = owner_identifier.trim();
        if owner.is_empty() {
            return Err(ApiError::Validation("owner_identifier is required".to_string()));
        }

        let session = Session::new(owner, Utc::now().trunc_subsecs(6));
        self.session_store
            .insert_session(&session)
            .await
            .map_err(|e| ApiError::service("Failed to create session", e))?;

        info!("Created session {} for {}", session.session_id, session.owner_identifier);
        Ok(session)
    }

    pub async fn list_sessions(&self, owner_identifier: &str) -> Result<Vec<Session>, ApiError> {
        let sessions = self
            .session_store
            .get_sessions_by_owner(owner_identifier)
            .await
            .map_err(|e| ApiError::service("Failed to list sessions", e))?;

        if sessions.is_empty() {
            return Err(ApiError::NotFound(format!(
                "No sessions found for {}",
                owner_identifier
            )));
        }

        Ok(sessions)
    }

    /// Ordered turns of an existing session (empty when nothing was said yet).
    pub async fn history(&self, session_id: &str) -> Result<Vec<Turn>, ApiError> {
        let conversation = self.load_conversation(session_id).await?;
        Ok(conversation.transcript().turns().to_vec())
    }

    /// On-demand, stateless summary of a session's transcript.
    pub async fn summary(&self, session_id: &str) -> Result<String, ApiError> {
        let conversation = self.load_conversation(session_id).await?;
        Ok(self.context_builder.summarize(conversation.transcript()))
    }

    pub async fn chat(&self, session_id: &str, text: &str) -> Result<ChatOutcome, ApiError> {
        if text.trim().is_empty() {
            return Err(ApiError::Validation("text must not be empty".to_string()));
        }

        let mut conversation = self.load_conversation(session_id).await?;
        let prior_len = conversation.transcript().len();
        debug!("Session {} has {} prior turns", session_id, prior_len);

        let prompt = self
            .context_builder
            .build_prompt(conversation.transcript(), text);
        conversation.append(Role::Human, text, Utc::now());

        let reply = self
            .llm_provider
            .complete(&prompt)
            .await
            .map_err(|e| ApiError::service("Language model call failed", e))?;
        debug!("Model replied with {} chars", reply.len());

        let (reply, retrieval_used) = self.augment(text, reply).await?;
        conversation.append(Role::Assistant, reply.as_str(), Utc::now());

        self.session_store
            .insert_turns(session_id, conversation.turns_since(prior_len))
            .await
            .map_err(|e| ApiError::service("Failed to store chat history", e))?;

        self.session_store
            .update_session_timestamp(session_id, conversation.session().last_updated)
            .await
            .map_err(|e| ApiError::service("Failed to update session timestamp", e))?;

        info!(
            "Chat turn stored: session={}, retrieval_used={}",
            session_id, retrieval_used
        );

        Ok(ChatOutcome {
            reply,
            retrieval_used,
        })
    }

    async fn augment(&self, message: &str, reply: String) -> Result<(String, bool), ApiError> {
        if !self.retrieval_policy.should_retrieve(message) {
            return Ok((reply, false));
        }

        let documents = self.retrieve(message).await?;
        if documents.is_empty() {
            debug!("Retrieval triggered but no documents matched");
            return Ok((reply, false));
        }

        info!("Augmenting reply with {} documents", documents.len());
        Ok((augment_reply(&reply, &documents), true))
    }

    async fn retrieve(&self, message: &str) -> Result<Vec<RetrievedDocument>, ApiError> {
        let query_embedding = self
            .embedding_provider
            .embed(message)
            .await
            .map_err(|e| ApiError::service("Failed to embed query", e))?;

        self.vector_store
            .search(&query_embedding, self.retrieval_top_k, self.match_threshold)
            .await
            .map_err(|e| ApiError::service("Vector search failed", e))
    }

    async fn load_conversation(&self, session_id: &str) -> Result<Conversation, ApiError> {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(ApiError::Validation("session_id is required".to_string()));
        }

        let session = self
            .session_store
            .get_session(session_id)
            .await
            .map_err(|e| ApiError::service("Failed to load session", e))?
            .ok_or_else(|| {
                warn!("Unknown session {}", session_id);
                ApiError::NotFound(format!("Session {} not found", session_id))
            })?;

        let turns = self
            .session_store
            .get_turns_by_session(session_id)
            .await
            .map_err(|e| ApiError::service("Failed to load chat history", e))?;

        Ok(Conversation::new(session, turns))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryMode;
    use crate::database::MemoryStore;
    use mockall::predicate::eq;

    fn chat_config() -> ChatConfig {
        ChatConfig {
            memory: MemoryMode::Buffer,
            ..ChatConfig::default()
        }
    }

    fn manager_with(
        store: &MemoryStore,
        llm: MockLlmProvider,
        embedder: MockEmbeddingProvider,
    ) -> ConversationManager {
        let config = ChatConfig {
            match_threshold: 0.0,
            ..chat_config()
        };
        ConversationManager::new(
            &config,
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(embedder),
            Arc::new(llm),
        )
    }

    fn echo_llm() -> MockLlmProvider {
        let mut llm = MockLlmProvider::new();
        llm.expect_complete().returning(|_| Ok("model reply".to_string()));
        llm
    }

    #[tokio::test]
    async fn test_create_session_requires_owner() {
        let store = MemoryStore::new();
        let manager = manager_with(&store, MockLlmProvider::new(), MockEmbeddingProvider::new());

        let err = manager.create_session("   ").await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn test_list_sessions_unknown_owner_is_not_found() {
        let store = MemoryStore::new();
        let manager = manager_with(&store, MockLlmProvider::new(), MockEmbeddingProvider::new());

        manager.create_session("a@example.com").await.unwrap();

        assert_eq!(manager.list_sessions("a@example.com").await.unwrap().len(), 1);
        assert!(matches!(
            manager.list_sessions("b@example.com").await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_history_unknown_session_is_not_found() {
        let store = MemoryStore::new();
        let manager = manager_with(&store, MockLlmProvider::new(), MockEmbeddingProvider::new());

        assert!(matches!(
            manager.history("no-such-session").await,
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            manager.chat("no-such-session", "hi").await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_chat_persists_both_turns_and_touches_session() {
        let store = MemoryStore::new();
        let manager = manager_with(&store, echo_llm(), MockEmbeddingProvider::new());
        let session = manager.create_session("owner").await.unwrap();

        let outcome = manager.chat(&session.session_id, "hello there").await.unwrap();
        assert_eq!(outcome.reply, "model reply");
        assert!(!outcome.retrieval_used);

        let history = manager.history(&session.session_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::Human);
        assert_eq!(history[0].content, "hello there");
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[1].content, "model reply");

        let stored = store.get_session(&session.session_id).await.unwrap().unwrap();
        assert_eq!(stored.last_updated, history[1].timestamp);
        assert!(history.iter().all(|t| t.timestamp <= stored.last_updated));
    }

    #[tokio::test]
    async fn test_second_turn_prompt_carries_buffer_memory() {
        let store = MemoryStore::new();
        let mut llm = MockLlmProvider::new();
        llm.expect_complete()
            .with(eq("Human: first\nAI:"))
            .times(1)
            .returning(|_| Ok("one".to_string()));
        llm.expect_complete()
            .with(eq("Human: first\nAI: one\nHuman: second\nAI:"))
            .times(1)
            .returning(|_| Ok("two".to_string()));

        let manager = manager_with(&store, llm, MockEmbeddingProvider::new());
        let session = manager.create_session("owner").await.unwrap();

        manager.chat(&session.session_id, "first").await.unwrap();
        let outcome = manager.chat(&session.session_id, "second").await.unwrap();

        assert_eq!(outcome.reply, "two");
        assert_eq!(manager.history(&session.session_id).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_keyword_message_is_augmented_from_vector_store() {
        let store = MemoryStore::new();
        store
            .insert_documents(vec![NewDocument {
                id: uuid::Uuid::new_v4(),
                content: "Quarterly revenue grew 12%".to_string(),
                metadata: serde_json::json!({"source": "q.pdf", "page": 1}),
                embedding: vec![1.0, 0.0],
            }])
            .await
            .unwrap();

        let mut embedder = MockEmbeddingProvider::new();
        embedder
            .expect_embed()
            .with(eq("show me the report"))
            .times(1)
            .returning(|_| Ok(vec![1.0, 0.0]));

        let manager = manager_with(&store, echo_llm(), embedder);
        let session = manager.create_session("owner").await.unwrap();

        let outcome = manager.chat(&session.session_id, "show me the report").await.unwrap();

        assert!(outcome.retrieval_used);
        assert!(outcome.reply.starts_with("model reply\n\nI found some relevant information"));
        assert!(outcome.reply.contains("- Quarterly revenue grew 12%\n"));

        let history = manager.history(&session.session_id).await.unwrap();
        assert_eq!(history[1].content, outcome.reply);
    }

    #[tokio::test]
    async fn test_keyword_message_with_empty_store_is_not_augmented() {
        let store = MemoryStore::new();
        let mut embedder = MockEmbeddingProvider::new();
        embedder.expect_embed().returning(|_| Ok(vec![0.3, 0.4]));

        let manager = manager_with(&store, echo_llm(), embedder);
        let session = manager.create_session("owner").await.unwrap();

        let outcome = manager.chat(&session.session_id, "which file?").await.unwrap();
        assert!(!outcome.retrieval_used);
        assert_eq!(outcome.reply, "model reply");
    }

    #[tokio::test]
    async fn test_model_failure_surfaces_and_persists_nothing() {
        let store = MemoryStore::new();
        let mut llm = MockLlmProvider::new();
        llm.expect_complete()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("upstream 503")));

        let manager = manager_with(&store, llm, MockEmbeddingProvider::new());
        let session = manager.create_session("owner").await.unwrap();

        let err = manager.chat(&session.session_id, "hi").await.unwrap_err();
        assert!(matches!(err, ApiError::Service(ref m) if m.contains("upstream 503")));
        assert!(manager.history(&session.session_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_embedding_failure_surfaces() {
        let store = MemoryStore::new();
        let mut embedder = MockEmbeddingProvider::new();
        embedder
            .expect_embed()
            .returning(|_| Err(anyhow::anyhow!("embedding endpoint down")));

        let manager = manager_with(&store, echo_llm(), embedder);
        let session = manager.create_session("owner").await.unwrap();

        assert!(matches!(
            manager.chat(&session.session_id, "open the document").await,
            Err(ApiError::Service(_))
        ));
    }

    #[tokio::test]
    async fn test_blank_text_is_rejected_before_any_call() {
        let store = MemoryStore::new();
        let manager = manager_with(&store, MockLlmProvider::new(), MockEmbeddingProvider::new());
        let session = manager.create_session("owner").await.unwrap();

        assert!(matches!(
            manager.chat(&session.session_id, "  \n").await,
            Err(ApiError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_summary_is_prefix_of_history() {
        let store = MemoryStore::new();
        let manager = manager_with(&store, echo_llm(), MockEmbeddingProvider::new());
        let session = manager.create_session("owner").await.unwrap();

        assert_eq!(manager.summary(&session.session_id).await.unwrap(), "Summary: ...");

        manager.chat(&session.session_id, "hi").await.unwrap();
        let summary = manager.summary(&session.session_id).await.unwrap();
        assert_eq!(summary, "Summary: Human: hi\nAI: model reply...");
    }
}
