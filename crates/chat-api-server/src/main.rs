use anyhow::Result;
use std::net::SocketAddr;
use tracing::{error, info};

use chat_api_server::app::{build_router, build_state};
use chat_api_server::config::Settings;
use chat_api_server::utils::logger::init_logger;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load()?;
    let _log_guard = init_logger(&settings.logging)?;

    info!("🚀 Starting chat API server...");
    info!("✅ Configuration loaded");

    let state = build_state(&settings).await?;
    let app = build_router(state, &settings.cors, settings.max_upload_bytes());

    let listener =
        tokio::net::TcpListener::bind((settings.server.host.as_str(), settings.server.port)).await?;
    let addr = listener.local_addr()?;
    info!("🌐 Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
