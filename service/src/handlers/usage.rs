//! Consumption handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use ledger_core::{LotDebit, UsageRecord, UserId};
use ledger_store::Store;

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Consume request from the chat/usage layer.
#[derive(Debug, Deserialize)]
pub struct ConsumeRequest {
    /// User whose balance to debit.
    pub user_id: String,
    /// Tokens to consume. Must be positive.
    pub amount: i64,
}

/// Consume response.
#[derive(Debug, Serialize)]
pub struct ConsumeResponse {
    /// The usage record written for this consumption.
    pub usage_record_id: String,
    /// Balance after the debit.
    pub new_balance: i64,
    /// Which lots were debited, oldest first.
    pub lots_debited: Vec<LotDebit>,
}

/// Debit tokens from a user's lots in FIFO order.
pub async fn consume(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<ConsumeRequest>,
) -> Result<Json<ConsumeResponse>, ApiError> {
    let user_id: UserId = body
        .user_id
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid user ID".into()))?;

    let (record, new_balance) = state.store.consume(&user_id, body.amount)?;

    tracing::info!(
        service = %auth.service_name,
        user_id = %user_id,
        amount = body.amount,
        new_balance,
        lots = record.lots_debited.len(),
        "Tokens consumed"
    );

    Ok(Json(ConsumeResponse {
        usage_record_id: record.id.to_string(),
        new_balance,
        lots_debited: record.lots_debited,
    }))
}

/// Pagination query parameters.
#[derive(Debug, Deserialize)]
pub struct Pagination {
    /// Maximum records to return.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Records to skip.
    #[serde(default)]
    pub offset: usize,
}

const fn default_limit() -> usize {
    50
}

/// Usage history response.
#[derive(Debug, Serialize)]
pub struct UsageHistoryResponse {
    /// The user whose history this is.
    pub user_id: String,
    /// Usage records, newest first.
    pub records: Vec<UsageRecord>,
}

/// List a user's usage records, newest first.
pub async fn list_usage(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<String>,
    Query(page): Query<Pagination>,
) -> Result<Json<UsageHistoryResponse>, ApiError> {
    let user_id: UserId = user_id
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid user ID".into()))?;

    let limit = page.limit.min(500);
    let records = state.store.usage_for_user(&user_id, limit, page.offset)?;

    Ok(Json(UsageHistoryResponse {
        user_id: user_id.to_string(),
        records,
    }))
}
