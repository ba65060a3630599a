//! Grant handlers.
//!
//! A grant converts a completed payment into a token lot. The flow is the
//! same whether it arrives on the payment webhook or the direct grant API:
//! price the purchase at the current exchange rate, create the lot, and
//! credit the balance, all keyed by the external payment id so redelivery
//! returns the original receipt instead of granting twice.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use ledger_core::{GrantReceipt, LedgerError, UserId};
use ledger_store::{operation_key, Store};

use crate::auth::ServiceAuth;
use crate::crypto;
use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the webhook body HMAC.
const SIGNATURE_HEADER: &str = "x-ledger-signature";

/// A payment-completed notification.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentCompletedEvent {
    /// Payment-provider id for this payment. The idempotency key.
    pub external_payment_id: String,
    /// The purchasing user.
    pub user_id: String,
    /// Purchase amount in quote-currency minor units.
    pub amount: i64,
    /// Currency the payment was made in.
    pub currency: String,
    /// Model whose per-token cost prices this purchase.
    pub model_id: String,
}

/// Grant response.
#[derive(Debug, Serialize)]
pub struct GrantResponse {
    /// The lot created (or originally created) for this payment.
    pub lot_id: String,
    /// The purchasing user.
    pub user_id: String,
    /// The external payment id that keyed the grant.
    pub external_payment_id: String,
    /// Tokens granted.
    pub tokens_granted: i64,
    /// Balance after the grant.
    pub new_balance: i64,
    /// True when this payment was already granted and the original
    /// receipt is being returned.
    pub duplicate: bool,
}

/// Payment webhook endpoint.
///
/// Verifies the body HMAC when a webhook secret is configured, then runs the
/// same grant flow as the direct API.
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<GrantResponse>, ApiError> {
    if let Some(secret) = &state.config.webhook_secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        if !crypto::verify_signature(secret, &body, signature) {
            tracing::warn!("Rejected payment webhook with invalid signature");
            return Err(ApiError::Unauthorized);
        }
    }

    let event: PaymentCompletedEvent = serde_json::from_str(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid webhook payload: {e}")))?;

    tracing::debug!(
        payment_id = %event.external_payment_id,
        user_id = %event.user_id,
        "Processing payment webhook"
    );

    let response = perform_grant(&state, event).await?;
    Ok(Json(response))
}

/// Direct grant endpoint for trusted services.
pub async fn create_grant(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(event): Json<PaymentCompletedEvent>,
) -> Result<Json<GrantResponse>, ApiError> {
    tracing::debug!(
        service = %auth.service_name,
        payment_id = %event.external_payment_id,
        "Processing grant request"
    );

    let response = perform_grant(&state, event).await?;
    Ok(Json(response))
}

/// Price the purchase and grant the tokens, exactly once per payment id.
async fn perform_grant(
    state: &AppState,
    event: PaymentCompletedEvent,
) -> Result<GrantResponse, ApiError> {
    if !event
        .currency
        .eq_ignore_ascii_case(&state.config.quote_currency)
    {
        return Err(ApiError::BadRequest(format!(
            "unsupported currency {}, expected {}",
            event.currency, state.config.quote_currency
        )));
    }
    if event.external_payment_id.trim().is_empty() {
        return Err(ApiError::BadRequest("external_payment_id is required".into()));
    }

    let user_id: UserId = event
        .user_id
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid user ID".into()))?;

    let key = operation_key("grant", &event.external_payment_id);
    let outcome = state
        .guard
        .check_or_run(&key, || async {
            let rate = state.oracle.latest_valid_rate().await;
            let quote = state
                .config
                .policy
                .compute(event.amount, &event.model_id, rate)?;

            let (lot, new_balance) = state
                .store
                .grant(
                    &user_id,
                    &event.external_payment_id,
                    event.amount,
                    quote.tokens,
                )
                .map_err(LedgerError::from)?;

            tracing::info!(
                payment_id = %event.external_payment_id,
                user_id = %user_id,
                tokens = quote.tokens,
                rate,
                actual_margin = quote.actual_margin,
                "Granted token lot"
            );

            Ok(GrantReceipt {
                lot_id: lot.id,
                user_id: lot.user_id,
                external_payment_id: lot.external_payment_id,
                tokens_granted: lot.tokens_purchased,
                new_balance,
            })
        })
        .await;

    match outcome.result {
        Ok(receipt) => {
            if outcome.replayed {
                tracing::debug!(
                    payment_id = %receipt.external_payment_id,
                    "Replayed grant receipt for redelivered payment"
                );
            }
            Ok(grant_response(receipt, outcome.replayed))
        }
        // The guard entry expired but the ledger still has the lot. Serve
        // the original grant from the payment anchor.
        Err(LedgerError::DuplicatePayment { payment_id }) => {
            let lot = state
                .store
                .lot_by_payment(&payment_id)?
                .ok_or_else(|| ApiError::Internal(format!(
                    "payment {payment_id} marked duplicate but no lot found"
                )))?;
            let balance = state.store.balance(&lot.user_id)?;

            tracing::debug!(
                payment_id = %payment_id,
                lot_id = %lot.id,
                "Recovered original grant for duplicate payment"
            );

            Ok(grant_response(
                GrantReceipt {
                    lot_id: lot.id,
                    user_id: lot.user_id,
                    external_payment_id: lot.external_payment_id,
                    tokens_granted: lot.tokens_purchased,
                    new_balance: balance,
                },
                true,
            ))
        }
        Err(e) => Err(e.into()),
    }
}

fn grant_response(receipt: GrantReceipt, duplicate: bool) -> GrantResponse {
    GrantResponse {
        lot_id: receipt.lot_id.to_string(),
        user_id: receipt.user_id.to_string(),
        external_payment_id: receipt.external_payment_id,
        tokens_granted: receipt.tokens_granted,
        new_balance: receipt.new_balance,
        duplicate,
    }
}
