use anyhow::Result;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CorsConfig {
    /// `"*"` allows any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
    #[serde(default = "default_pool_timeout_seconds")]
    pub pool_timeout_seconds: u64,
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    pub model: String,
    pub timeout_seconds: u64,
    pub max_tokens: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    pub model: String,
    pub dimension: usize,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_seconds: u64,
}

/// How prior turns are folded into the prompt sent to the model.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemoryMode {
    /// Full transcript rendering.
    #[default]
    Buffer,
    /// Length-bounded summary excerpt of the transcript.
    Summary,
    /// Current message only.
    None,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ChatConfig {
    pub memory: MemoryMode,
    pub retrieval_keywords: Vec<String>,
    pub summary_char_budget: usize,
    pub retrieval_top_k: usize,
    pub match_threshold: f32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            memory: MemoryMode::Buffer,
            retrieval_keywords: ["document", "pdf", "file", "report"]
                .iter()
                .map(|k| k.to_string())
                .collect(),
            summary_char_budget: 200,
            retrieval_top_k: 5,
            match_threshold: 0.5,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LimitsConfig {
    pub llm_concurrency: usize,
    pub embedding_concurrency: usize,
    pub acquire_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            llm_concurrency: 8,
            embedding_concurrency: 16,
            acquire_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UploadConfig {
    pub max_file_mb: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_mb: 50,
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// `RUST_LOG`, when set, wins over `level`.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    /// Daily-rolling file output; `None` keeps logs on stdout only.
    pub directory: Option<String>,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info,chat_api_server=debug,tower_http=info".to_string(),
            format: LogFormat::Pretty,
            directory: Some("logs".to_string()),
            file_prefix: "chat-api-server".to_string(),
        }
    }
}

fn default_pool_max_size() -> u32 {
    10
}

fn default_pool_timeout_seconds() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_temperature() -> f32 {
    0.7
}

fn default_embedding_timeout() -> u64 {
    60
}

impl Settings {
    /// `config/settings.toml` overlaid by `APP__SECTION__KEY` environment variables.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name("config/settings").required(true))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.upload.max_file_mb * 1024 * 1024
    }
}
