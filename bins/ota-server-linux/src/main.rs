mod config;

use std::sync::Arc;

use anyhow::Context;
use ota_core::{FileFirmwareStore, FirmwareStore};
use ota_web::{create_router, ServerState, UploadSettings};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,ota_core=debug,ota_web=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("OTA server starting...");

    let config = ServerConfig::from_env()?;

    let store = FileFirmwareStore::open(&config.storage_dir).with_context(|| {
        format!(
            "Failed to open firmware storage at {}",
            config.storage_dir.display()
        )
    })?;
    let current = store.current_version();

    let state = ServerState::new(
        Arc::new(store),
        UploadSettings {
            max_upload_bytes: config.max_upload_bytes,
            ..Default::default()
        },
    );
    let app = create_router(Arc::new(state)).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

    tracing::info!("OTA server ready!");
    tracing::info!("   Listening:       http://{}", config.bind_addr);
    tracing::info!("   Storage:         {}", config.storage_dir.display());
    tracing::info!("   Current version: {}", current);
    tracing::info!("");
    tracing::info!("Try these commands:");
    tracing::info!("   curl -F file=@firmware.bin http://localhost:{}/upload", config.bind_addr.port());
    tracing::info!("   curl http://localhost:{}/version", config.bind_addr.port());
    tracing::info!("   curl -O http://localhost:{}/firmware.bin", config.bind_addr.port());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolve on Ctrl+C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        // Without a signal handler, keep serving until the process is killed.
        std::future::pending::<()>().await;
    }
    tracing::info!("Received Ctrl+C, shutting down...");
}
