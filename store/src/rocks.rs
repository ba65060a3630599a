//! `RocksDB` storage implementation.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use ledger_core::{
    ExchangeRateSample, Lot, LotDebit, LotId, UsageRecord, UsageRecordId, UserBalance, UserId,
};

use crate::error::{Result, StoreError};
use crate::idempotency::IdempotencyEntry;
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::Store;

/// Number of lock stripes for per-user serialization.
const LOCK_STRIPES: usize = 64;

/// RocksDB-backed storage implementation.
///
/// Same-user mutations take a striped lock for the full read-compute-commit
/// cycle; the commit itself is a single `WriteBatch`, so the lot rows and the
/// aggregate balance can never be observed out of step.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    user_locks: Vec<Mutex<()>>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            user_locks: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Acquire the lock stripe for a user. All mutations for the same user
    /// contend on the same stripe.
    fn user_lock(&self, user_id: &UserId) -> MutexGuard<'_, ()> {
        let bytes = user_id.as_bytes();
        let idx = (usize::from(bytes[0]) << 8 | usize::from(bytes[1])) % LOCK_STRIPES;
        match self.user_locks[idx].lock() {
            Ok(guard) => guard,
            // A poisoned stripe only means another thread panicked mid-hold;
            // the data it guarded was committed (or not) atomically.
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn get_balance_record(&self, user_id: &UserId) -> Result<Option<UserBalance>> {
        let cf = self.cf(cf::BALANCES)?;
        self.db
            .get_cf(&cf, keys::balance_key(user_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn latest_sample_where<F>(&self, pred: F) -> Result<Option<ExchangeRateSample>>
    where
        F: Fn(&ExchangeRateSample) -> bool,
    {
        let cf = self.cf(cf::RATE_SAMPLES)?;
        let iter = self.db.iterator_cf(&cf, IteratorMode::End);

        for item in iter {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let sample: ExchangeRateSample = Self::deserialize(&value)?;
            if pred(&sample) {
                return Ok(Some(sample));
            }
        }

        Ok(None)
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Ledger Operations
    // =========================================================================

    fn grant(
        &self,
        user_id: &UserId,
        external_payment_id: &str,
        purchase_amount: i64,
        tokens: i64,
    ) -> Result<(Lot, i64)> {
        if tokens < 1 {
            return Err(StoreError::InvalidAmount(format!(
                "grant must be at least 1 token, got {tokens}"
            )));
        }
        if purchase_amount <= 0 {
            return Err(StoreError::InvalidAmount(format!(
                "purchase amount must be positive, got {purchase_amount}"
            )));
        }
        if external_payment_id.is_empty() {
            return Err(StoreError::InvalidAmount(
                "external payment id must not be empty".into(),
            ));
        }

        let _guard = self.user_lock(user_id);

        let cf_payments = self.cf(cf::PAYMENTS)?;
        let payment_key = keys::payment_key(external_payment_id);

        // Uniqueness anchor: one lot per external payment id, ever.
        let existing = self
            .db
            .get_cf(&cf_payments, &payment_key)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        if existing.is_some() {
            return Err(StoreError::DuplicatePayment {
                payment_id: external_payment_id.to_string(),
            });
        }

        let mut balance = self
            .get_balance_record(user_id)?
            .unwrap_or_else(|| UserBalance::new(*user_id));
        balance.token_balance += tokens;
        balance.updated_at = chrono::Utc::now();

        let lot = Lot::new(*user_id, external_payment_id.to_string(), purchase_amount, tokens);

        let cf_lots = self.cf(cf::LOTS)?;
        let cf_by_user = self.cf(cf::LOTS_BY_USER)?;
        let cf_balances = self.cf(cf::BALANCES)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_lots, keys::lot_key(&lot.id), Self::serialize(&lot)?);
        batch.put_cf(&cf_by_user, keys::user_lot_key(user_id, &lot.id), []);
        batch.put_cf(&cf_payments, &payment_key, lot.id.to_bytes());
        batch.put_cf(
            &cf_balances,
            keys::balance_key(user_id),
            Self::serialize(&balance)?,
        );

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok((lot, balance.token_balance))
    }

    fn consume(&self, user_id: &UserId, amount: i64) -> Result<(UsageRecord, i64)> {
        if amount <= 0 {
            return Err(StoreError::InvalidAmount(format!(
                "consumption must be positive, got {amount}"
            )));
        }

        let _guard = self.user_lock(user_id);

        let mut balance = match self.get_balance_record(user_id)? {
            Some(balance) if balance.token_balance >= amount => balance,
            Some(balance) => {
                return Err(StoreError::InsufficientBalance {
                    balance: balance.token_balance,
                    required: amount,
                })
            }
            None => {
                return Err(StoreError::InsufficientBalance {
                    balance: 0,
                    required: amount,
                })
            }
        };

        // FIFO debit: scan the user's lots oldest-first and drain each in turn.
        let cf_by_user = self.cf(cf::LOTS_BY_USER)?;
        let prefix = keys::user_lots_prefix(user_id);
        let iter = self.db.iterator_cf(
            &cf_by_user,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        let mut remaining = amount;
        let mut debits: Vec<LotDebit> = Vec::new();
        let mut touched: Vec<Lot> = Vec::new();

        for item in iter {
            if remaining == 0 {
                break;
            }
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }

            let lot_id = keys::extract_lot_id_from_user_key(&key);
            let Some(mut lot) = self.get_lot(&lot_id)? else {
                return Err(StoreError::Database(format!(
                    "indexed lot missing: {lot_id}"
                )));
            };
            if !lot.is_active {
                continue;
            }

            let taken = lot.debit(remaining);
            remaining -= taken;
            debits.push(LotDebit {
                lot_id: lot.id,
                amount_from_lot: taken,
            });
            touched.push(lot);
        }

        if remaining > 0 {
            // The aggregate said we had enough; the lots disagree. This is an
            // invariant breach, not an expected insufficiency.
            return Err(StoreError::Database(format!(
                "balance/lot mismatch for user {user_id}: {remaining} tokens unbacked"
            )));
        }

        balance.token_balance -= amount;
        balance.updated_at = chrono::Utc::now();

        let record = UsageRecord::new(*user_id, amount, debits);

        let cf_lots = self.cf(cf::LOTS)?;
        let cf_balances = self.cf(cf::BALANCES)?;
        let cf_usage = self.cf(cf::USAGE_RECORDS)?;
        let cf_usage_by_user = self.cf(cf::USAGE_BY_USER)?;

        let mut batch = WriteBatch::default();
        for lot in &touched {
            batch.put_cf(&cf_lots, keys::lot_key(&lot.id), Self::serialize(lot)?);
        }
        batch.put_cf(
            &cf_balances,
            keys::balance_key(user_id),
            Self::serialize(&balance)?,
        );
        batch.put_cf(&cf_usage, keys::usage_key(&record.id), Self::serialize(&record)?);
        batch.put_cf(&cf_usage_by_user, keys::user_usage_key(user_id, &record.id), []);

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok((record, balance.token_balance))
    }

    fn balance(&self, user_id: &UserId) -> Result<i64> {
        Ok(self
            .get_balance_record(user_id)?
            .map_or(0, |b| b.token_balance))
    }

    fn get_lot(&self, lot_id: &LotId) -> Result<Option<Lot>> {
        let cf = self.cf(cf::LOTS)?;
        self.db
            .get_cf(&cf, keys::lot_key(lot_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn lot_by_payment(&self, external_payment_id: &str) -> Result<Option<Lot>> {
        let cf = self.cf(cf::PAYMENTS)?;
        let Some(lot_id_bytes) = self
            .db
            .get_cf(&cf, keys::payment_key(external_payment_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(None);
        };

        let bytes: [u8; 16] = lot_id_bytes
            .as_slice()
            .try_into()
            .map_err(|_| StoreError::Serialization("payment anchor is not a lot id".into()))?;
        let lot_id =
            LotId::from_bytes(bytes).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.get_lot(&lot_id)
    }

    fn lots_for_user(&self, user_id: &UserId) -> Result<Vec<Lot>> {
        let cf_by_user = self.cf(cf::LOTS_BY_USER)?;
        let prefix = keys::user_lots_prefix(user_id);
        let iter = self.db.iterator_cf(
            &cf_by_user,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        let mut lots = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            let lot_id = keys::extract_lot_id_from_user_key(&key);
            if let Some(lot) = self.get_lot(&lot_id)? {
                lots.push(lot);
            }
        }

        Ok(lots)
    }

    // =========================================================================
    // Usage Audit Operations
    // =========================================================================

    fn get_usage_record(&self, record_id: &UsageRecordId) -> Result<Option<UsageRecord>> {
        let cf = self.cf(cf::USAGE_RECORDS)?;
        self.db
            .get_cf(&cf, keys::usage_key(record_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn usage_for_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<UsageRecord>> {
        let cf = self.cf(cf::USAGE_BY_USER)?;
        let prefix = keys::user_usage_prefix(user_id);
        let iter = self.db.iterator_cf(
            &cf,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        let mut all_keys: Vec<Vec<u8>> = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            all_keys.push(key.to_vec());
        }

        // ULID keys scan oldest-first; reverse for newest-first listing.
        all_keys.reverse();

        let mut records = Vec::new();
        for key in all_keys.into_iter().skip(offset).take(limit) {
            let record_id = keys::extract_usage_id_from_user_key(&key);
            if let Some(record) = self.get_usage_record(&record_id)? {
                records.push(record);
            }
        }

        Ok(records)
    }

    // =========================================================================
    // Rate Sample Operations
    // =========================================================================

    fn put_rate_sample(&self, sample: &ExchangeRateSample) -> Result<()> {
        let cf = self.cf(cf::RATE_SAMPLES)?;
        // Keyed by a fresh ULID so samples append in fetch order.
        let key = ulid::Ulid::new().to_bytes();
        self.db
            .put_cf(&cf, key, Self::serialize(sample)?)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    fn latest_valid_rate_sample(&self) -> Result<Option<ExchangeRateSample>> {
        self.latest_sample_where(|s| s.is_valid)
    }

    fn latest_rate_sample(&self) -> Result<Option<ExchangeRateSample>> {
        self.latest_sample_where(|_| true)
    }

    // =========================================================================
    // Idempotency Operations
    // =========================================================================

    fn get_idempotency_entry(&self, key: &str) -> Result<Option<IdempotencyEntry>> {
        let cf = self.cf(cf::IDEMPOTENCY)?;
        self.db
            .get_cf(&cf, keys::idempotency_key(key))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn put_idempotency_entry(&self, entry: &IdempotencyEntry) -> Result<()> {
        let cf = self.cf(cf::IDEMPOTENCY)?;
        self.db
            .put_cf(&cf, keys::idempotency_key(&entry.key), Self::serialize(entry)?)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ledger_core::RateProvenance;
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    /// The aggregate balance must equal the sum of remaining tokens over
    /// active lots.
    fn assert_balance_invariant(store: &RocksStore, user_id: &UserId) {
        let from_lots: i64 = store
            .lots_for_user(user_id)
            .unwrap()
            .iter()
            .filter(|l| l.is_active)
            .map(|l| l.tokens_remaining)
            .sum();
        assert_eq!(store.balance(user_id).unwrap(), from_lots);
    }

    #[test]
    fn grant_creates_lot_and_increments_balance() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        let (lot, balance) = store.grant(&user_id, "pay_1", 500, 2083).unwrap();
        assert_eq!(lot.tokens_purchased, 2083);
        assert_eq!(lot.tokens_remaining, 2083);
        assert!(lot.is_active);
        assert_eq!(balance, 2083);
        assert_eq!(store.balance(&user_id).unwrap(), 2083);
        assert_balance_invariant(&store, &user_id);
    }

    #[test]
    fn duplicate_payment_id_is_rejected() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        store.grant(&user_id, "pay_1", 500, 1000).unwrap();
        let result = store.grant(&user_id, "pay_1", 500, 1000);
        assert!(matches!(result, Err(StoreError::DuplicatePayment { .. })));

        // Exactly one lot, one balance increment.
        assert_eq!(store.lots_for_user(&user_id).unwrap().len(), 1);
        assert_eq!(store.balance(&user_id).unwrap(), 1000);
    }

    #[test]
    fn lot_by_payment_finds_the_lot() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        let (lot, _) = store.grant(&user_id, "pay_1", 500, 1000).unwrap();
        let found = store.lot_by_payment("pay_1").unwrap().unwrap();
        assert_eq!(found.id, lot.id);
        assert!(store.lot_by_payment("pay_nope").unwrap().is_none());
    }

    #[test]
    fn consume_debits_fifo() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        // Lot A first (100 tokens), then lot B (50 tokens).
        let (lot_a, _) = store.grant(&user_id, "pay_a", 100, 100).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let (lot_b, _) = store.grant(&user_id, "pay_b", 50, 50).unwrap();

        let (record, balance) = store.consume(&user_id, 120).unwrap();
        assert_eq!(balance, 30);
        assert_eq!(record.amount_consumed, 120);
        assert_eq!(record.lots_debited.len(), 2);
        assert_eq!(record.lots_debited[0].lot_id, lot_a.id);
        assert_eq!(record.lots_debited[0].amount_from_lot, 100);
        assert_eq!(record.lots_debited[1].lot_id, lot_b.id);
        assert_eq!(record.lots_debited[1].amount_from_lot, 20);

        let a = store.get_lot(&lot_a.id).unwrap().unwrap();
        let b = store.get_lot(&lot_b.id).unwrap().unwrap();
        assert_eq!(a.tokens_remaining, 0);
        assert!(!a.is_active);
        assert_eq!(b.tokens_remaining, 30);
        assert!(b.is_active);

        assert_balance_invariant(&store, &user_id);
    }

    #[test]
    fn consume_skips_exhausted_lots() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        store.grant(&user_id, "pay_a", 100, 100).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let (lot_b, _) = store.grant(&user_id, "pay_b", 50, 50).unwrap();

        store.consume(&user_id, 100).unwrap();
        let (record, balance) = store.consume(&user_id, 10).unwrap();

        assert_eq!(balance, 40);
        assert_eq!(record.lots_debited.len(), 1);
        assert_eq!(record.lots_debited[0].lot_id, lot_b.id);
        assert_balance_invariant(&store, &user_id);
    }

    #[test]
    fn insufficient_balance_is_rejected_without_effect() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        store.grant(&user_id, "pay_1", 100, 100).unwrap();
        let result = store.consume(&user_id, 150);
        assert!(matches!(
            result,
            Err(StoreError::InsufficientBalance {
                balance: 100,
                required: 150
            })
        ));
        assert_eq!(store.balance(&user_id).unwrap(), 100);
        assert_balance_invariant(&store, &user_id);
    }

    #[test]
    fn consume_from_unknown_user_is_insufficient() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        let result = store.consume(&user_id, 1);
        assert!(matches!(
            result,
            Err(StoreError::InsufficientBalance {
                balance: 0,
                required: 1
            })
        ));
    }

    #[test]
    fn unknown_user_balance_is_zero() {
        let (store, _dir) = create_test_store();
        assert_eq!(store.balance(&UserId::generate()).unwrap(), 0);
    }

    #[test]
    fn invalid_amounts_are_rejected() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        assert!(matches!(
            store.grant(&user_id, "pay_1", 500, 0),
            Err(StoreError::InvalidAmount(_))
        ));
        assert!(matches!(
            store.grant(&user_id, "pay_1", 0, 100),
            Err(StoreError::InvalidAmount(_))
        ));
        assert!(matches!(
            store.consume(&user_id, 0),
            Err(StoreError::InvalidAmount(_))
        ));
    }

    #[test]
    fn balance_invariant_holds_across_interleaving() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        store.grant(&user_id, "pay_1", 100, 300).unwrap();
        store.consume(&user_id, 120).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        store.grant(&user_id, "pay_2", 100, 200).unwrap();
        store.consume(&user_id, 250).unwrap();
        store.grant(&user_id, "pay_3", 100, 50).unwrap();

        assert_eq!(store.balance(&user_id).unwrap(), 180);
        assert_balance_invariant(&store, &user_id);
    }

    #[test]
    fn concurrent_consumption_never_overdraws() {
        let (store, _dir) = create_test_store();
        let store = Arc::new(store);
        let user_id = UserId::generate();

        store.grant(&user_id, "pay_1", 100, 100).unwrap();

        // 10 concurrent consumers of 30 tokens each against a balance of 100:
        // exactly 3 can succeed.
        let mut handles = Vec::new();
        for _ in 0..10 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || store.consume(&user_id, 30).is_ok()));
        }

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 3);
        assert_eq!(store.balance(&user_id).unwrap(), 10);
        assert_balance_invariant(&store, &user_id);
    }

    #[test]
    fn concurrent_grants_create_one_lot_per_payment() {
        let (store, _dir) = create_test_store();
        let store = Arc::new(store);
        let user_id = UserId::generate();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                store.grant(&user_id, "pay_dup", 500, 1000).is_ok()
            }));
        }

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);
        assert_eq!(store.balance(&user_id).unwrap(), 1000);
        assert_eq!(store.lots_for_user(&user_id).unwrap().len(), 1);
    }

    #[test]
    fn usage_records_list_newest_first() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        store.grant(&user_id, "pay_1", 100, 100).unwrap();
        let (first, _) = store.consume(&user_id, 10).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let (second, _) = store.consume(&user_id, 20).unwrap();

        let records = store.usage_for_user(&user_id, 10, 0).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, second.id);
        assert_eq!(records[1].id, first.id);

        let page = store.usage_for_user(&user_id, 1, 1).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, first.id);
    }

    #[test]
    fn rate_samples_latest_valid_skips_invalid() {
        let (store, _dir) = create_test_store();

        let mut sample = ExchangeRateSample {
            base_currency: "USD".into(),
            quote_currency: "RUB".into(),
            rate: 150.0,
            fetched_at: Utc::now(),
            source: RateProvenance::Primary,
            is_valid: true,
            previous_rate: None,
        };
        store.put_rate_sample(&sample).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(2));
        sample.rate = 200.0;
        sample.is_valid = false;
        sample.previous_rate = Some(150.0);
        store.put_rate_sample(&sample).unwrap();

        let latest_valid = store.latest_valid_rate_sample().unwrap().unwrap();
        assert!((latest_valid.rate - 150.0).abs() < f64::EPSILON);

        let latest = store.latest_rate_sample().unwrap().unwrap();
        assert!((latest.rate - 200.0).abs() < f64::EPSILON);
        assert!(!latest.is_valid);
    }

    #[test]
    fn idempotency_entries_roundtrip() {
        let (store, _dir) = create_test_store();

        let entry = IdempotencyEntry {
            key: "grant:pay_1".into(),
            outcome: vec![1, 2, 3],
            recorded_at: Utc::now(),
        };
        store.put_idempotency_entry(&entry).unwrap();

        let read = store.get_idempotency_entry("grant:pay_1").unwrap().unwrap();
        assert_eq!(read.outcome, vec![1, 2, 3]);
        assert!(store.get_idempotency_entry("grant:other").unwrap().is_none());
    }
}
