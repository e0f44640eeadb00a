use anyhow::Context;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::UploadConfig;
use crate::document::{PdfLoader, PdfPage, TextChunker};
use crate::services::conversation::{EmbeddingProvider, NewDocument, VectorStore};
use crate::utils::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub pages: usize,
    pub chunks: usize,
}

/// PDF ingestion: parse -> chunk -> embed -> store as one batch.
pub struct DocumentService {
    vector_store: Arc<dyn VectorStore>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    chunker: TextChunker,
}

impl DocumentService {
    pub fn new(
        config: &UploadConfig,
        vector_store: Arc<dyn VectorStore>,
        embedding_provider: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            vector_store,
            embedding_provider,
            chunker: TextChunker::new(config.chunk_size, config.chunk_overlap),
        }
    }

    pub async fn ingest_pdf(&self, filename: &str, data: Vec<u8>) -> Result<IngestReport, ApiError> {
        info!("Processing upload: {} ({} bytes)", filename, data.len());

        if data.is_empty() {
            return Err(ApiError::Validation("Uploaded file is empty".to_string()));
        }
        if !has_pdf_extension(filename) || !PdfLoader::is_pdf(&data) {
            return Err(ApiError::Validation(format!(
                "Only PDF files are supported: {}",
                filename
            )));
        }

        // lopdf is CPU-bound
        let pages = tokio::task::spawn_blocking(move || PdfLoader::load_pages(&data))
            .await
            .context("PDF parser task panicked")?
            .map_err(|e| ApiError::service("Failed to parse PDF", e))?;

        self.ingest_pages(filename, &pages).await
    }

    /// Every chunk is embedded before anything is stored; the first failure
    /// aborts the batch.
    pub async fn ingest_pages(&self, source: &str, pages: &[PdfPage]) -> Result<IngestReport, ApiError> {
        let mut batch = Vec::new();

        for page in pages {
            for (index, chunk) in self.chunker.chunk(&page.text).into_iter().enumerate() {
                let embedding = self
                    .embedding_provider
                    .embed(&chunk.content)
                    .await
                    .map_err(|e| {
                        ApiError::service(&format!("Failed to embed page {} chunk {}", page.number, index), e)
                    })?;

                batch.push(NewDocument {
                    id: Uuid::new_v4(),
                    content: chunk.content,
                    metadata: json!({
                        "source": source,
                        "page": page.number,
                        "chunk": index,
                    }),
                    embedding,
                });
            }
        }

        if batch.is_empty() {
            return Err(ApiError::Validation(
                "No text content found in document".to_string(),
            ));
        }

        debug!("Embedded {} chunks from {} pages", batch.len(), pages.len());

        let chunks = self
            .vector_store
            .insert_documents(batch)
            .await
            .map_err(|e| ApiError::service("Error inserting documents", e))?;

        info!("Document {} stored: pages={}, chunks={}", source, pages.len(), chunks);

        Ok(IngestReport {
            pages: pages.len(),
            chunks,
        })
    }
}

fn has_pdf_extension(filename: &str) -> bool {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}
