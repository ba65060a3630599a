//! Usage record types for the token ledger.
//!
//! Usage records are the append-only audit trail of consumption. They are
//! immutable once written and are never used to recompute a balance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{LotId, UsageRecordId, UserId};

/// One debit taken from one lot during a consumption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotDebit {
    /// The lot that was debited.
    pub lot_id: LotId,

    /// How many tokens were taken from that lot.
    pub amount_from_lot: i64,
}

/// An append-only record of one consumption event.
///
/// `lots_debited` captures exactly which lots were debited and by how much,
/// in FIFO order (oldest lot first).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Unique record id (ULID, time-ordered).
    pub id: UsageRecordId,

    /// The user whose balance was debited.
    pub user_id: UserId,

    /// Total tokens consumed.
    pub amount_consumed: i64,

    /// Per-lot debits, in the order they were applied.
    pub lots_debited: Vec<LotDebit>,

    /// When the consumption occurred.
    pub timestamp: DateTime<Utc>,
}

impl UsageRecord {
    /// Create a new usage record.
    #[must_use]
    pub fn new(user_id: UserId, amount_consumed: i64, lots_debited: Vec<LotDebit>) -> Self {
        Self {
            id: UsageRecordId::generate(),
            user_id,
            amount_consumed,
            lots_debited,
            timestamp: Utc::now(),
        }
    }

    /// Sum of the per-lot debits. Always equals `amount_consumed`.
    #[must_use]
    pub fn debited_total(&self) -> i64 {
        self.lots_debited.iter().map(|d| d.amount_from_lot).sum()
    }
}
