use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::config::EmbeddingConfig;
use crate::services::conversation::EmbeddingProvider;
use crate::utils::limiters::Limiters;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Clone)]
pub struct EmbeddingService {
    client: Client,
    config: EmbeddingConfig,
    limiters: Arc<Limiters>,
}

impl EmbeddingService {
    pub fn new(config: EmbeddingConfig, limiters: Arc<Limiters>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            config,
            limiters,
        })
    }

    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    async fn embed_internal(&self, text: &str) -> Result<Vec<f32>> {
        let (_permit, _wait) = Limiters::acquire_timed(
            self.limiters.embedding.clone(),
            self.limiters.acquire_timeout,
            "embedding",
        )
        .await?;

        debug!("Generating embedding for {} chars", text.len());

        let url = format!("{}/embeddings", self.config.base_url.trim_end_matches('/'));
        let request = EmbeddingRequest {
            input: text,
            model: &self.config.model,
        };

        let mut builder = self.client.post(&url).json(&request);
        if !self.config.api_key.is_empty() {
            builder = builder.bearer_auth(&self.config.api_key);
        }

        let response = builder
            .send()
            .await
            .context("Failed to connect to embedding server")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Embedding API error ({}): {}", status, body);
        }

        let json_value: Value = response
            .json()
            .await
            .context("Failed to parse embedding response as JSON")?;

        let embedding = parse_embedding(&json_value)?;

        if embedding.len() != self.config.dimension {
            anyhow::bail!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.config.dimension,
                embedding.len()
            );
        }

        Ok(embedding)
    }
}

fn floats(values: &[Value]) -> Vec<f32> {
    values
        .iter()
        .filter_map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}

/// Accepts the shapes served by common embedding servers:
/// `{"data": [{"embedding": [..]}]}`, `{"embedding": [..]}`,
/// `[{"embedding": [..]}]` and a bare `[..]`.
pub fn parse_embedding(json_value: &Value) -> Result<Vec<f32>> {
    let embedding = match json_value {
        Value::Object(map) => {
            if let Some(Value::Array(data)) = map.get("data") {
                match data.first().and_then(|d| d.get("embedding")) {
                    Some(Value::Array(values)) => floats(values),
                    _ => anyhow::bail!("Unrecognized embedding response format: {}", json_value),
                }
            } else if let Some(Value::Array(values)) = map.get("embedding") {
                floats(values)
            } else {
                anyhow::bail!("Unrecognized embedding response format: {}", json_value);
            }
        }
        Value::Array(arr) => match arr.first() {
            None => anyhow::bail!("Empty array returned from embedding server"),
            Some(first) => match first.get("embedding") {
                Some(Value::Array(values)) => floats(values),
                _ => floats(arr),
            },
        },
        _ => anyhow::bail!("Unrecognized embedding response format: {}", json_value),
    };

    if embedding.is_empty() {
        anyhow::bail!("Generated embedding is empty");
    }

    Ok(embedding)
}

#[async_trait::async_trait]
impl EmbeddingProvider for EmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_internal(text).await
    }
}
