//! Key encoding utilities for `RocksDB`.

use ledger_core::{LotId, UsageRecordId, UserId};

/// Create a lot key from a lot id.
#[must_use]
pub fn lot_key(lot_id: &LotId) -> Vec<u8> {
    lot_id.to_bytes().to_vec()
}

/// Create a user-lot index key.
///
/// Format: `user_id (16 bytes) || lot_id (16 bytes)`
///
/// Lot ids are ULIDs, so a forward scan over a user's prefix visits lots in
/// creation order: exactly the FIFO consumption order, with same-millisecond
/// ties broken by the ULID's random suffix, deterministically. Within one
/// millisecond that suffix order is arbitrary and may disagree with the lots'
/// sub-millisecond `created_at` order; the scan order is what the ledger
/// consumes by.
#[must_use]
pub fn user_lot_key(user_id: &UserId, lot_id: &LotId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(&lot_id.to_bytes());
    key
}

/// Create a prefix for iterating all lots for a user.
#[must_use]
pub fn user_lots_prefix(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Extract the lot id from a user-lot index key.
///
/// # Panics
///
/// Panics if the key is not at least 32 bytes.
#[must_use]
pub fn extract_lot_id_from_user_key(key: &[u8]) -> LotId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[16..32]);
    LotId::from_bytes(bytes).expect("valid ULID bytes")
}

/// Create a payment anchor key from an external payment id.
#[must_use]
pub fn payment_key(external_payment_id: &str) -> Vec<u8> {
    external_payment_id.as_bytes().to_vec()
}

/// Create a balance key from a user id.
#[must_use]
pub fn balance_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create a usage record key from a record id.
#[must_use]
pub fn usage_key(record_id: &UsageRecordId) -> Vec<u8> {
    record_id.to_bytes().to_vec()
}

/// Create a user-usage index key: `user_id (16 bytes) || record_id (16 bytes)`.
#[must_use]
pub fn user_usage_key(user_id: &UserId, record_id: &UsageRecordId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(&record_id.to_bytes());
    key
}

/// Create a prefix for iterating all usage records for a user.
#[must_use]
pub fn user_usage_prefix(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Extract the usage record id from a user-usage index key.
///
/// # Panics
///
/// Panics if the key is not at least 32 bytes.
#[must_use]
pub fn extract_usage_id_from_user_key(key: &[u8]) -> UsageRecordId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[16..32]);
    UsageRecordId::from_bytes(bytes).expect("valid ULID bytes")
}

/// Create an idempotency entry key from a namespaced operation key.
#[must_use]
pub fn idempotency_key(operation_key: &str) -> Vec<u8> {
    operation_key.as_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_lot_key_format() {
        let user_id = UserId::generate();
        let lot_id = LotId::generate();
        let key = user_lot_key(&user_id, &lot_id);

        assert_eq!(key.len(), 32);
        assert_eq!(&key[..16], user_id.as_bytes());
        assert_eq!(&key[16..], lot_id.to_bytes());
    }

    #[test]
    fn extract_lot_id_roundtrip() {
        let user_id = UserId::generate();
        let lot_id = LotId::generate();
        let key = user_lot_key(&user_id, &lot_id);

        assert_eq!(extract_lot_id_from_user_key(&key), lot_id);
    }

    #[test]
    fn user_lot_keys_sort_in_creation_order() {
        let user_id = UserId::generate();
        let first = LotId::generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = LotId::generate();

        let k1 = user_lot_key(&user_id, &first);
        let k2 = user_lot_key(&user_id, &second);
        assert!(k1 < k2);
    }

    #[test]
    fn extract_usage_id_roundtrip() {
        let user_id = UserId::generate();
        let record_id = UsageRecordId::generate();
        let key = user_usage_key(&user_id, &record_id);

        assert_eq!(extract_usage_id_from_user_key(&key), record_id);
    }
}
