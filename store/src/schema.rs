//! Database schema definitions and column families.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Lot records, keyed by `lot_id` (ULID).
    pub const LOTS: &str = "lots";

    /// Index: lots by user, keyed by `user_id || lot_id`. Value is empty.
    /// ULID ordering makes a forward prefix scan the FIFO consumption order.
    pub const LOTS_BY_USER: &str = "lots_by_user";

    /// Uniqueness anchor: `external_payment_id` -> `lot_id` bytes. A second
    /// grant for the same payment id fails here regardless of the guard.
    pub const PAYMENTS: &str = "payments";

    /// Aggregate balances, keyed by `user_id`.
    pub const BALANCES: &str = "balances";

    /// Usage records, keyed by `usage_record_id` (ULID).
    pub const USAGE_RECORDS: &str = "usage_records";

    /// Index: usage records by user, keyed by `user_id || usage_record_id`.
    pub const USAGE_BY_USER: &str = "usage_by_user";

    /// Exchange-rate samples, keyed by a ULID minted at persist time.
    pub const RATE_SAMPLES: &str = "rate_samples";

    /// Idempotency entries, keyed by the namespaced operation key.
    pub const IDEMPOTENCY: &str = "idempotency";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::LOTS,
        cf::LOTS_BY_USER,
        cf::PAYMENTS,
        cf::BALANCES,
        cf::USAGE_RECORDS,
        cf::USAGE_BY_USER,
        cf::RATE_SAMPLES,
        cf::IDEMPOTENCY,
    ]
}
