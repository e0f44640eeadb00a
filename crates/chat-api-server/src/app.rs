use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::{info, warn};

use crate::config::{CorsConfig, DatabaseConfig, Settings, StoreBackend};
use crate::database::{DbPool, MemoryStore, Repository};
use crate::handlers;
use crate::services::conversation::{
    ConversationManager, EmbeddingProvider, LlmProvider, SessionStore, VectorStore,
};
use crate::services::{DocumentService, EmbeddingService, LlmService};
use crate::state::AppState;
use crate::utils::limiters::Limiters;

/// The two persistence seams, backed by the same store instance.
#[derive(Clone)]
pub struct Stores {
    pub session_store: Arc<dyn SessionStore>,
    pub vector_store: Arc<dyn VectorStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            session_store: store.clone(),
            vector_store: store,
        }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        match config.backend {
            StoreBackend::Memory => Ok(Self::in_memory()),
            StoreBackend::Postgres => {
                let pool = DbPool::new(config).await?;
                info!("✅ Database connection established");
                let repository = Arc::new(Repository::new(pool));
                Ok(Self {
                    session_store: repository.clone(),
                    vector_store: repository,
                })
            }
        }
    }
}

/// Wires the services from already-built collaborators.
pub fn assemble_state(
    settings: &Settings,
    stores: Stores,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    llm_provider: Arc<dyn LlmProvider>,
) -> AppState {
    let conversation_manager = Arc::new(ConversationManager::new(
        &settings.chat,
        stores.session_store.clone(),
        stores.vector_store.clone(),
        embedding_provider.clone(),
        llm_provider,
    ));

    let document_service = Arc::new(DocumentService::new(
        &settings.upload,
        stores.vector_store,
        embedding_provider,
    ));

    AppState {
        conversation_manager,
        document_service,
        session_store: stores.session_store,
    }
}

pub async fn build_state(settings: &Settings) -> Result<AppState> {
    let stores = Stores::connect(&settings.database).await?;
    let limiters = Arc::new(Limiters::new(&settings.limits));

    let embedding_service = Arc::new(EmbeddingService::new(
        settings.embedding.clone(),
        limiters.clone(),
    )?);
    let llm_service = Arc::new(LlmService::new(settings.llm.clone(), limiters)?);

    info!(
        "Services ready: backend={:?}, model={}, embedding_model={} (dim {})",
        settings.database.backend,
        settings.llm.model,
        settings.embedding.model,
        embedding_service.dimension()
    );

    Ok(assemble_state(settings, stores, embedding_service, llm_service))
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if config.allowed_origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    base.allow_origin(origins)
}

pub fn build_router(state: AppState, cors: &CorsConfig, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::readiness_check))
        .route("/session", post(handlers::session::create_session))
        .route("/sessions/{owner_identifier}", get(handlers::session::list_sessions))
        .route("/chat", post(handlers::chat::chat_handler))
        .route("/history/{session_id}", get(handlers::chat::history_handler))
        .route("/summary/{session_id}", get(handlers::chat::summary_handler))
        .route("/add_pdf", post(handlers::upload::add_pdf_handler))
        .with_state(state)
        .layer(cors_layer(cors))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CatchPanicLayer::new())
}
