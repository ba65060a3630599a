//! Error types for the token ledger.

use serde::{Deserialize, Serialize};

use crate::ids::IdError;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur in ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Pricing policy is misconfigured. Fatal at startup; never clamped.
    #[error("policy violation: {0}")]
    PolicyViolation(String),

    /// The model id has no configured per-token cost.
    #[error("unknown model: {model_id}")]
    UnknownModel {
        /// The model id that was not found in the cost map.
        model_id: String,
    },

    /// A money or token amount failed validation.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Insufficient token balance for the operation. Expected and recoverable.
    #[error("insufficient balance: balance={balance}, required={required}")]
    InsufficientBalance {
        /// Current token balance.
        balance: i64,
        /// Required amount of tokens.
        required: i64,
    },

    /// A lot already exists for this external payment id.
    #[error("duplicate payment: {payment_id}")]
    DuplicatePayment {
        /// The external payment id that was already granted.
        payment_id: String,
    },

    /// The exchange-rate source could not be reached. Absorbed via fallback.
    #[error("rate source unavailable: {0}")]
    RateSourceUnavailable(String),

    /// A fetched exchange rate failed validation. Recorded for audit only.
    #[error("invalid rate sample: rate={rate}, {reason}")]
    InvalidRateSample {
        /// The rejected rate value.
        rate: f64,
        /// Why the sample was rejected.
        reason: String,
    },

    /// Storage error. Transient; safe to retry the whole operation.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}

impl LedgerError {
    /// Whether this failure is terminal for the operation that produced it.
    ///
    /// Terminal failures may be cached by the idempotency guard; transient ones
    /// must propagate uncached so a redelivery retries the whole operation.
    #[must_use]
    pub fn to_failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::UnknownModel { model_id } => Some(FailureKind::UnknownModel {
                model_id: model_id.clone(),
            }),
            Self::InvalidAmount(msg) => Some(FailureKind::InvalidAmount {
                message: msg.clone(),
            }),
            Self::DuplicatePayment { payment_id } => Some(FailureKind::DuplicatePayment {
                payment_id: payment_id.clone(),
            }),
            Self::InsufficientBalance { balance, required } => {
                Some(FailureKind::InsufficientBalance {
                    balance: *balance,
                    required: *required,
                })
            }
            _ => None,
        }
    }
}

/// Serializable mirror of the terminal `LedgerError` variants.
///
/// The idempotency guard persists one of these alongside successes so a
/// redelivered operation replays the original failure instead of re-running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// The model id had no configured cost.
    UnknownModel {
        /// The unknown model id.
        model_id: String,
    },
    /// The amount failed validation.
    InvalidAmount {
        /// Validation message.
        message: String,
    },
    /// The payment id was already granted.
    DuplicatePayment {
        /// The duplicated payment id.
        payment_id: String,
    },
    /// The balance was insufficient.
    InsufficientBalance {
        /// Balance at the time of the failure.
        balance: i64,
        /// Amount that was required.
        required: i64,
    },
}

impl From<FailureKind> for LedgerError {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::UnknownModel { model_id } => Self::UnknownModel { model_id },
            FailureKind::InvalidAmount { message } => Self::InvalidAmount(message),
            FailureKind::DuplicatePayment { payment_id } => Self::DuplicatePayment { payment_id },
            FailureKind::InsufficientBalance { balance, required } => {
                Self::InsufficientBalance { balance, required }
            }
        }
    }
}
