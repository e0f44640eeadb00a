pub mod settings;

pub use settings::{
    ChatConfig, CorsConfig, DatabaseConfig, EmbeddingConfig, LimitsConfig, LlmConfig,
    LogFormat, LoggingConfig, MemoryMode, ServerConfig, Settings, StoreBackend, UploadConfig,
};
