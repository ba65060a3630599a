//! Balance and lot read handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use ledger_core::{Lot, UserId};
use ledger_store::Store;

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Balance response.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// The user.
    pub user_id: String,
    /// Aggregate token balance. Zero for an unknown user.
    pub balance: i64,
}

/// Read a user's aggregate token balance.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let user_id: UserId = user_id
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid user ID".into()))?;

    let balance = state.store.balance(&user_id)?;

    Ok(Json(BalanceResponse {
        user_id: user_id.to_string(),
        balance,
    }))
}

/// Lot list response.
#[derive(Debug, Serialize)]
pub struct LotsResponse {
    /// The user.
    pub user_id: String,
    /// All of the user's lots, oldest first.
    pub lots: Vec<Lot>,
}

/// List a user's lots in FIFO order.
pub async fn list_lots(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<String>,
) -> Result<Json<LotsResponse>, ApiError> {
    let user_id: UserId = user_id
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid user ID".into()))?;

    let lots = state.store.lots_for_user(&user_id)?;

    Ok(Json(LotsResponse {
        user_id: user_id.to_string(),
        lots,
    }))
}
