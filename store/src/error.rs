//! Error types for ledger storage.

use ledger_core::LedgerError;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("not found")]
    NotFound,

    /// The amount failed validation before any write.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Insufficient token balance for a consumption.
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
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(msg) => Self::Storage(msg),
            StoreError::Serialization(msg) => Self::Serialization(msg),
            StoreError::NotFound => Self::Storage("record not found".into()),
            StoreError::InvalidAmount(msg) => Self::InvalidAmount(msg),
            StoreError::InsufficientBalance { balance, required } => {
                Self::InsufficientBalance { balance, required }
            }
            StoreError::DuplicatePayment { payment_id } => Self::DuplicatePayment { payment_id },
        }
    }
}
