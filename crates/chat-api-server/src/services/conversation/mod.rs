//! Conversation flow: session transcripts, prompt memory, keyword-gated
//! retrieval and the manager tying them to the stores.

mod context_builder;
pub mod manager;
mod retrieval;
mod transcript;
pub mod types;

pub use context_builder::{summarize, ContextBuilder};
pub use manager::{ConversationManager, EmbeddingProvider, LlmProvider, SessionStore, VectorStore};
pub use retrieval::{augment_reply, RetrievalPolicy, AUGMENT_HEADER};
pub use transcript::{render_transcript, Conversation, Transcript};
pub use types::{ChatOutcome, NewDocument, RetrievedDocument, Role, Session, Turn};
