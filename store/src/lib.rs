//! `RocksDB` storage layer for the token ledger.
//!
//! This crate provides persistent storage for lots, balances, usage records,
//! exchange-rate samples, and idempotency entries, using `RocksDB` column
//! families with CBOR-encoded values.
//!
//! # Concurrency model
//!
//! The store is the sole shared mutable state. Every grant and every
//! consumption commits its lot rows and the aggregate balance in one
//! `WriteBatch`, and all mutations for a given user serialize on a striped
//! per-user lock, so concurrent callers observe the ledger as if their
//! operations ran in some serial order. The balance read path is a single
//! point lookup and never recomputes from lots.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod idempotency;
pub mod keys;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use idempotency::{
    operation_key, GuardOutcome, IdempotencyEntry, IdempotencyGuard, IDEMPOTENCY_TTL_SECONDS,
};
pub use rocks::RocksStore;

use ledger_core::{ExchangeRateSample, Lot, LotId, UsageRecord, UsageRecordId, UserId};

/// The storage trait defining all ledger database operations.
///
/// Abstracts the storage layer so tests and alternative backends can stand in
/// for `RocksDB`.
pub trait Store: Send + Sync {
    // =========================================================================
    // Ledger Operations
    // =========================================================================

    /// Create a lot for a payment and atomically increment the user's balance.
    ///
    /// Returns the new lot and the balance after the grant.
    ///
    /// # Errors
    ///
    /// - `StoreError::DuplicatePayment` if a lot already exists for
    ///   `external_payment_id`.
    /// - `StoreError::InvalidAmount` if `tokens < 1` or `purchase_amount <= 0`.
    fn grant(
        &self,
        user_id: &UserId,
        external_payment_id: &str,
        purchase_amount: i64,
        tokens: i64,
    ) -> Result<(Lot, i64)>;

    /// Debit `amount` tokens from the user's lots in FIFO order, atomically
    /// with the balance decrement, and write one usage record.
    ///
    /// Returns the usage record and the balance after the debit.
    ///
    /// # Errors
    ///
    /// - `StoreError::InsufficientBalance` if `amount` exceeds the balance.
    /// - `StoreError::InvalidAmount` if `amount <= 0`.
    fn consume(&self, user_id: &UserId, amount: i64) -> Result<(UsageRecord, i64)>;

    /// Read the aggregate token balance. Zero for an unknown user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn balance(&self, user_id: &UserId) -> Result<i64>;

    /// Get a lot by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_lot(&self, lot_id: &LotId) -> Result<Option<Lot>>;

    /// Look up the lot created for an external payment id, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn lot_by_payment(&self, external_payment_id: &str) -> Result<Option<Lot>>;

    /// List all lots for a user, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn lots_for_user(&self, user_id: &UserId) -> Result<Vec<Lot>>;

    // =========================================================================
    // Usage Audit Operations
    // =========================================================================

    /// Get a usage record by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_usage_record(&self, record_id: &UsageRecordId) -> Result<Option<UsageRecord>>;

    /// List usage records for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn usage_for_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<UsageRecord>>;

    // =========================================================================
    // Rate Sample Operations
    // =========================================================================

    /// Append an exchange-rate sample. Samples are never updated in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_rate_sample(&self, sample: &ExchangeRateSample) -> Result<()>;

    /// The most recent sample with `is_valid = true`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn latest_valid_rate_sample(&self) -> Result<Option<ExchangeRateSample>>;

    /// The most recent sample regardless of validity, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn latest_rate_sample(&self) -> Result<Option<ExchangeRateSample>>;

    // =========================================================================
    // Idempotency Operations
    // =========================================================================

    /// Get an idempotency entry by its namespaced key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_idempotency_entry(&self, key: &str) -> Result<Option<IdempotencyEntry>>;

    /// Write an idempotency entry. Overwrites an expired entry for the key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_idempotency_entry(&self, entry: &IdempotencyEntry) -> Result<()>;
}
