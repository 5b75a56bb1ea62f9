//! Farnsworth Server
//!
//! Serves a personal video and audio library with chunked ZIP uploads.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use farnsworth_server::{logging::RotatingLog, routes, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let dotenv = dotenvy::dotenv();

    let config = Config::from_env();
    let log_settings = config
        .as_ref()
        .map(|c| c.log.clone())
        .unwrap_or_else(|_| Config::default().log);

    // Initialize tracing
    let log_file = RotatingLog::open(&log_settings.file, log_settings.max_entries);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "farnsworth_server=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .with(log_file.as_ref().ok().map(|writer| {
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer.clone())
        }))
        .init();

    if let Err(e) = &dotenv {
        tracing::info!("No .env loaded: {}", e);
    }
    if let Err(e) = &log_file {
        tracing::warn!("Log file {} unavailable: {}", log_settings.file.display(), e);
    }

    let config = config.context("Invalid configuration")?;

    tracing::info!("Starting Farnsworth Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Media root: {}", config.storage.media_root.display());
    tracing::info!("Chunk staging: {}", config.storage.staging_root.display());

    // Create application state
    let state = AppState::connect(config.clone()).await;
    state
        .library()
        .ensure_layout()
        .await
        .context("Failed to create media directories")?;

    state.tokens().clone().start_cleanup_task();
    state.library().assembler().clone().start_cleanup_task(std::time::Duration::from_secs(
        config.storage.staging_ttl_hours.saturating_mul(3600),
    ));

    let app = routes::router(state);

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid SERVER_HOST/SERVER_PORT")?;
    tracing::info!("Farnsworth Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
