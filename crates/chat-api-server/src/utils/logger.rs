use anyhow::{Context, Result};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use crate::config::{LogFormat, LoggingConfig};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// `RUST_LOG` overrides the configured directive when it is set and non-blank.
pub fn resolve_directive(env_override: Option<String>, configured: &str) -> String {
    env_override
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| configured.to_string())
}

fn stdout_layer(format: LogFormat) -> BoxedLayer {
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stdout)
            .with_target(true)
            .with_thread_ids(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_writer(std::io::stdout)
            .with_target(true)
            .boxed(),
    }
}

fn file_layer(config: &LoggingConfig, directory: &str) -> Result<(BoxedLayer, WorkerGuard)> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(&config.file_prefix)
        .filename_suffix("log")
        .build(directory)
        .with_context(|| format!("Failed to open log directory {}", directory))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = match config.format {
        LogFormat::Json => fmt::layer().json().with_writer(writer).with_target(true).boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .boxed(),
    };

    Ok((layer, guard))
}

/// Installs the global subscriber. Keep the returned guard alive for the
/// lifetime of the process or buffered file lines are lost.
pub fn init_logger(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let directive = resolve_directive(std::env::var("RUST_LOG").ok(), &config.level);
    let filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("Invalid log directive '{}'", directive))?;

    let mut layers: Vec<BoxedLayer> = vec![stdout_layer(config.format)];
    let mut guard = None;

    if let Some(directory) = config.directory.as_deref() {
        let (layer, file_guard) = file_layer(config, directory)?;
        layers.push(layer);
        guard = Some(file_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()?;

    Ok(guard)
}
