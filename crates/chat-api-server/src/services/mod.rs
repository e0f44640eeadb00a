pub mod conversation;
pub mod document_service;
pub mod embedding_service;
pub mod llm_service;

pub use document_service::{DocumentService, IngestReport};
pub use embedding_service::EmbeddingService;
pub use llm_service::LlmService;
