//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{balance, grants, health, pricing, rates, usage};
use crate::state::AppState;

// ============================================================================
// Concurrency Limiting Constants
// ============================================================================

/// Maximum concurrent requests for usage endpoints.
/// This prevents overload from high-volume consumption reporting.
const USAGE_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Webhooks (signature verification)
/// - `POST /webhooks/payments` - Payment-completed notifications
///
/// ## Grants and ledger (service API key auth)
/// - `POST /v1/grants` - Grant tokens for a completed payment
/// - `GET /v1/balance/:user_id` - Aggregate token balance
/// - `GET /v1/lots/:user_id` - Lots in FIFO order
/// - `POST /v1/usage` - Consume tokens (rate-limited)
/// - `GET /v1/usage/:user_id` - Usage history, newest first
///
/// ## Pricing and rates (service API key auth)
/// - `POST /v1/pricing/preview` - Price a purchase without granting
/// - `GET /v1/rates/latest` - Rate pricing currently uses
/// - `POST /v1/rates/refresh` - Fetch and record a fresh rate sample
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    // Create concurrency-limited usage routes
    // Consumption endpoints handle high-volume traffic from the chat layer,
    // so they have a higher concurrency limit but are still protected from
    // overload.
    let usage_routes = Router::new()
        .route("/", post(usage::consume))
        .route("/:user_id", get(usage::list_usage))
        .layer(ConcurrencyLimitLayer::new(USAGE_MAX_CONCURRENT_REQUESTS));

    // Create concurrency-limited API routes
    let api_routes = Router::new()
        // Grants and ledger reads
        .route("/grants", post(grants::create_grant))
        .route("/balance/:user_id", get(balance::get_balance))
        .route("/lots/:user_id", get(balance::list_lots))
        // Pricing and rates
        .route("/pricing/preview", post(pricing::preview))
        .route("/rates/latest", get(rates::latest_rate))
        .route("/rates/refresh", post(rates::refresh_rate))
        // Usage routes (with their own concurrency limit)
        .nest("/usage", usage_routes)
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        // API v1 routes (rate limited)
        .nest("/v1", api_routes)
        // Webhooks (no rate limit - redelivery is controlled by the provider)
        .route("/webhooks/payments", post(grants::payment_webhook))
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
