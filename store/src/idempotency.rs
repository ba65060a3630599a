//! Idempotency entries and the exactly-once-effect guard.
//!
//! The guard makes "run this operation for key K" safe to invoke arbitrarily
//! many times: within the entry TTL, the first invocation runs the operation
//! and persists its outcome; every later invocation (including concurrent
//! ones) returns the stored outcome without running the operation again.
//!
//! Entries are persisted in their own column family, so deduplication
//! survives restarts and is shared by every caller of the store. The per-key
//! mutex only arbitrates concurrent first-callers inside this process; the
//! persisted entry is the durable record.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use ledger_core::{FailureKind, LedgerError};

use crate::Store;

/// How long an idempotency entry suppresses re-execution, in seconds (24h).
///
/// After expiry the key may legitimately be reused; the ledger's payment
/// uniqueness anchor still prevents a second lot for a replayed grant.
pub const IDEMPOTENCY_TTL_SECONDS: i64 = 24 * 60 * 60;

/// Build a deterministic operation key from its parts.
#[must_use]
pub fn operation_key(kind: &str, unique_id: &str) -> String {
    format!("{kind}:{unique_id}")
}

/// A persisted record of one keyed operation's outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyEntry {
    /// The namespaced operation key.
    pub key: String,

    /// CBOR-encoded `StoredOutcome` of the operation.
    pub outcome: Vec<u8>,

    /// When the outcome was recorded. Entries expire `IDEMPOTENCY_TTL_SECONDS`
    /// after this instant.
    pub recorded_at: DateTime<Utc>,
}

impl IdempotencyEntry {
    /// Whether the entry's TTL has elapsed.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.recorded_at).num_seconds() >= IDEMPOTENCY_TTL_SECONDS
    }
}

/// Serialized operation outcome: either the success value or a terminal
/// failure. Transient failures are never stored.
#[derive(Debug, Serialize, Deserialize)]
enum StoredOutcome<T> {
    Ok(T),
    Failed(FailureKind),
}

/// The result of `check_or_run`.
#[derive(Debug)]
pub struct GuardOutcome<T> {
    /// The operation's outcome, fresh or replayed.
    pub result: Result<T, LedgerError>,

    /// True when the outcome was served from a stored entry and the
    /// operation did not run.
    pub replayed: bool,
}

/// Exactly-once-effect wrapper keyed by an external operation id.
pub struct IdempotencyGuard<S> {
    store: Arc<S>,
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: Store> IdempotencyGuard<S> {
    /// Create a guard over a store.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Run `op` at most once for `key` within the TTL window.
    ///
    /// An unexpired stored entry short-circuits `op` entirely. Otherwise `op`
    /// runs, and its success (or terminal failure) is persisted under `key`
    /// before being returned. Two concurrent first-callers serialize on a
    /// per-key mutex, so exactly one of them executes `op`.
    pub async fn check_or_run<T, F, Fut>(&self, key: &str, op: F) -> GuardOutcome<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        let key_lock = self.key_lock(key).await;
        let _held = key_lock.lock().await;

        match self.load_outcome::<T>(key) {
            Ok(Some(result)) => {
                self.release_key(key).await;
                return GuardOutcome {
                    result,
                    replayed: true,
                };
            }
            Ok(None) => {}
            Err(err) => {
                self.release_key(key).await;
                return GuardOutcome {
                    result: Err(err),
                    replayed: false,
                };
            }
        }

        let result = op().await;
        self.store_outcome(key, &result);

        self.release_key(key).await;
        GuardOutcome {
            result,
            replayed: false,
        }
    }

    async fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut map = self.in_flight.lock().await;
        Arc::clone(map.entry(key.to_string()).or_default())
    }

    async fn release_key(&self, key: &str) {
        let mut map = self.in_flight.lock().await;
        // Drop the map entry once no other caller holds the lock handle.
        if let Some(lock) = map.get(key) {
            if Arc::strong_count(lock) <= 2 {
                map.remove(key);
            }
        }
    }

    fn load_outcome<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<Result<T, LedgerError>>, LedgerError> {
        let Some(entry) = self.store.get_idempotency_entry(key)? else {
            return Ok(None);
        };
        if entry.is_expired(Utc::now()) {
            tracing::debug!(key = %key, recorded_at = %entry.recorded_at, "Idempotency entry expired, key eligible for reuse");
            return Ok(None);
        }

        let outcome: StoredOutcome<T> = ciborium::from_reader(entry.outcome.as_slice())
            .map_err(|e| LedgerError::Serialization(e.to_string()))?;
        Ok(Some(match outcome {
            StoredOutcome::Ok(value) => Ok(value),
            StoredOutcome::Failed(kind) => Err(kind.into()),
        }))
    }

    fn store_outcome<T: Serialize>(&self, key: &str, result: &Result<T, LedgerError>) {
        let outcome = match result {
            Ok(value) => StoredOutcome::Ok(value),
            Err(err) => match err.to_failure_kind() {
                Some(kind) => StoredOutcome::Failed(kind),
                // Transient failure: leave no entry so a retry re-runs the
                // whole operation from a consistent checkpoint.
                None => return,
            },
        };

        let mut buf = Vec::new();
        if let Err(e) = ciborium::into_writer(&outcome, &mut buf) {
            tracing::warn!(key = %key, error = %e, "Failed to encode idempotency outcome");
            return;
        }

        let entry = IdempotencyEntry {
            key: key.to_string(),
            outcome: buf,
            recorded_at: Utc::now(),
        };
        if let Err(e) = self.store.put_idempotency_entry(&entry) {
            // The operation itself committed; the ledger's uniqueness anchor
            // still rejects a re-run after redelivery.
            tracing::warn!(key = %key, error = %e, "Failed to persist idempotency entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RocksStore;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    fn create_guard() -> (Arc<IdempotencyGuard<RocksStore>>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        (Arc::new(IdempotencyGuard::new(store)), dir)
    }

    #[tokio::test]
    async fn first_call_runs_second_replays() {
        let (guard, _dir) = create_guard();
        let runs = AtomicU32::new(0);

        let first = guard
            .check_or_run("grant:pay_1", || async {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok::<_, LedgerError>(42_i64)
            })
            .await;
        assert_eq!(first.result.unwrap(), 42);
        assert!(!first.replayed);

        let second = guard
            .check_or_run("grant:pay_1", || async {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok::<_, LedgerError>(99_i64)
            })
            .await;
        assert_eq!(second.result.unwrap(), 42);
        assert!(second.replayed);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_keys_run_independently() {
        let (guard, _dir) = create_guard();

        let a = guard
            .check_or_run("grant:pay_a", || async { Ok::<_, LedgerError>(1_i64) })
            .await;
        let b = guard
            .check_or_run("grant:pay_b", || async { Ok::<_, LedgerError>(2_i64) })
            .await;
        assert_eq!(a.result.unwrap(), 1);
        assert_eq!(b.result.unwrap(), 2);
        assert!(!b.replayed);
    }

    #[tokio::test]
    async fn concurrent_first_callers_run_op_once() {
        let (guard, _dir) = create_guard();
        let runs = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let guard = Arc::clone(&guard);
            let runs = Arc::clone(&runs);
            handles.push(tokio::spawn(async move {
                guard
                    .check_or_run("grant:pay_race", || async {
                        runs.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, LedgerError>(7_i64)
                    })
                    .await
            }));
        }

        let mut replays = 0;
        for handle in handles {
            let outcome = handle.await.unwrap();
            assert_eq!(outcome.result.unwrap(), 7);
            if outcome.replayed {
                replays += 1;
            }
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(replays, 7);
    }

    #[tokio::test]
    async fn terminal_failures_are_replayed() {
        let (guard, _dir) = create_guard();
        let runs = AtomicU32::new(0);

        let first = guard
            .check_or_run("grant:pay_bad", || async {
                runs.fetch_add(1, Ordering::SeqCst);
                Err::<i64, _>(LedgerError::UnknownModel {
                    model_id: "nope".into(),
                })
            })
            .await;
        assert!(matches!(
            first.result,
            Err(LedgerError::UnknownModel { .. })
        ));

        let second = guard
            .check_or_run("grant:pay_bad", || async {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok::<i64, _>(1)
            })
            .await;
        assert!(second.replayed);
        assert!(matches!(
            second.result,
            Err(LedgerError::UnknownModel { .. })
        ));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_failures_are_not_cached() {
        let (guard, _dir) = create_guard();
        let runs = AtomicU32::new(0);

        let first = guard
            .check_or_run("grant:pay_flaky", || async {
                runs.fetch_add(1, Ordering::SeqCst);
                Err::<i64, _>(LedgerError::Storage("io glitch".into()))
            })
            .await;
        assert!(matches!(first.result, Err(LedgerError::Storage(_))));

        // The retry runs the operation again and can succeed.
        let second = guard
            .check_or_run("grant:pay_flaky", || async {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok::<i64, _>(5)
            })
            .await;
        assert!(!second.replayed);
        assert_eq!(second.result.unwrap(), 5);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn expired_entries_allow_reuse() {
        let (guard, _dir) = create_guard();

        guard
            .check_or_run("grant:pay_old", || async { Ok::<_, LedgerError>(1_i64) })
            .await
            .result
            .unwrap();

        // Backdate the entry past the TTL.
        let mut entry = guard
            .store
            .get_idempotency_entry("grant:pay_old")
            .unwrap()
            .unwrap();
        entry.recorded_at -= chrono::Duration::seconds(IDEMPOTENCY_TTL_SECONDS + 1);
        guard.store.put_idempotency_entry(&entry).unwrap();

        let fresh = guard
            .check_or_run("grant:pay_old", || async { Ok::<_, LedgerError>(2_i64) })
            .await;
        assert!(!fresh.replayed);
        assert_eq!(fresh.result.unwrap(), 2);
    }

    #[test]
    fn operation_key_is_deterministic() {
        assert_eq!(operation_key("grant", "pay_1"), "grant:pay_1");
    }
}
