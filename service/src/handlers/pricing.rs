//! Pricing preview handler.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Pricing preview request.
#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    /// Purchase amount in quote-currency minor units.
    pub amount: i64,
    /// Model whose per-token cost prices this purchase.
    pub model_id: String,
}

/// Pricing preview response.
#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    /// Tokens the purchase would grant.
    pub tokens: i64,
    /// Maximum API cost allowed for this purchase.
    pub api_cost_limit: f64,
    /// True API cost of the granted tokens.
    pub actual_cost: f64,
    /// Realized cost fraction of the purchase amount.
    pub actual_margin: f64,
    /// Exchange rate the preview was priced at.
    pub rate: f64,
    /// True when the rate is the configured fallback, not a fetched sample.
    pub rate_degraded: bool,
}

/// Preview a purchase without granting anything.
pub async fn preview(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Json(body): Json<PreviewRequest>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let (rate, rate_degraded) = state.oracle.current_rate().await;
    let quote = state.config.policy.compute(body.amount, &body.model_id, rate)?;

    Ok(Json(PreviewResponse {
        tokens: quote.tokens,
        api_cost_limit: quote.api_cost_limit,
        actual_cost: quote.actual_cost,
        actual_margin: quote.actual_margin,
        rate,
        rate_degraded,
    }))
}
