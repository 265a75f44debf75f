//! Serve command: run the catalog HTTP API

use crate::api::{build_router, AppState};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::CatalogStore;
use std::sync::Arc;
use tracing::info;

/// Bind the configured address and serve the API until shutdown.
pub async fn cmd_serve(config: &Config, store: CatalogStore) -> Result<()> {
    let state = Arc::new(AppState::new(store, config));
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.api.listen)
        .await
        .map_err(|e| Error::Config(format!("cannot bind {}: {}", config.api.listen, e)))?;
    info!(
        "Serving catalog API on http://{}{}",
        config.api.listen, config.api.base_path
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    // Serve until interrupted; shutdown drains in-flight requests.
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
}
