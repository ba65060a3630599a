//! Token Ledger Service - HTTP API for token grants, consumption, and pricing
//!
//! This is the main entry point for the ledger service.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ledger_service::{create_router, AppState, ServiceConfig};
use ledger_store::RocksStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ledger=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Token Ledger Service");

    // Load configuration from environment
    let config = ServiceConfig::from_env();
    config.validate()?;

    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir,
        quote_currency = %config.quote_currency,
        rate_source_configured = %config.rate_source_url.is_some(),
        profit_margin = %config.policy.profit_margin,
        "Service configuration loaded"
    );

    // Initialize RocksDB store
    tracing::info!(path = %config.data_dir, "Opening RocksDB store");
    let store = Arc::new(RocksStore::open(&config.data_dir)?);

    // Build app state
    let state = AppState::new(store, config.clone())?;

    // Refresh the exchange rate on a schedule
    spawn_rate_refresh(&state);

    // Create the router
    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Spawn the background rate-refresh task, if configured.
fn spawn_rate_refresh(state: &AppState) {
    let interval_seconds = state.config.rate_refresh_interval_seconds;
    if interval_seconds == 0 || state.config.rate_source_url.is_none() {
        tracing::info!("Background rate refresh disabled");
        return;
    }

    let oracle = state.oracle.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds));
        loop {
            ticker.tick().await;
            if let Err(e) = oracle.refresh().await {
                tracing::error!(error = %e, "Scheduled rate refresh failed");
            }
        }
    });

    tracing::info!(interval_seconds, "Background rate refresh scheduled");
}
