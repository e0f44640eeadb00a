use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::config::LlmConfig;
use crate::services::conversation::LlmProvider;
use crate::utils::limiters::Limiters;

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: usize,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub struct LlmService {
    client: Client,
    config: LlmConfig,
    limiters: Arc<Limiters>,
}

impl LlmService {
    pub fn new(config: LlmConfig, limiters: Arc<Limiters>) -> Result<Self> {
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

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// Sends the whole prompt as one user message and waits for the full reply.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let (_permit, waited) = Limiters::acquire_timed(
            self.limiters.llm.clone(),
            self.limiters.acquire_timeout,
            "llm_complete",
        )
        .await?;

        debug!(
            "Calling model {} ({} prompt chars, waited {:?})",
            self.config.model,
            prompt.len(),
            waited
        );

        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            stream: false,
        };

        let mut builder = self.client.post(self.endpoint()).json(&request);
        if !self.config.api_key.is_empty() {
            builder = builder.bearer_auth(&self.config.api_key);
        }

        let response = builder
            .send()
            .await
            .context("Failed to call LLM API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("LLM API error: {} - {}", status, body);
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .context("Failed to parse LLM response")?;

        extract_reply(body)
    }
}

fn extract_reply(body: ChatCompletionResponse) -> Result<String> {
    body.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| anyhow::anyhow!("No choices returned from LLM"))
}

#[async_trait::async_trait]
impl LlmProvider for LlmService {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.generate(prompt).await
    }
}
