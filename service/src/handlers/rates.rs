//! Exchange-rate handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use ledger_core::ExchangeRateSample;
use ledger_store::Store;

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Latest-rate response.
#[derive(Debug, Serialize)]
pub struct LatestRateResponse {
    /// The rate pricing would use right now.
    pub rate: f64,
    /// True when no valid sample has ever been recorded and the configured
    /// fallback rate is being served.
    pub degraded: bool,
    /// The most recent recorded sample, valid or not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sample: Option<ExchangeRateSample>,
}

/// Read the rate pricing currently uses, plus the last recorded sample.
pub async fn latest_rate(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
) -> Result<Json<LatestRateResponse>, ApiError> {
    let (rate, degraded) = state.oracle.current_rate().await;
    let last_sample = state.store.latest_rate_sample()?;

    Ok(Json(LatestRateResponse {
        rate,
        degraded,
        last_sample,
    }))
}

/// Trigger a rate refresh and return the recorded sample.
pub async fn refresh_rate(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
) -> Result<Json<ExchangeRateSample>, ApiError> {
    let sample = state.oracle.refresh().await?;
    Ok(Json(sample))
}
