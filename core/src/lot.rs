//! Lot and balance types for the token ledger.
//!
//! A lot is one purchased batch of tokens, tracked independently until
//! exhausted. The aggregate `UserBalance` is denormalized for fast reads and
//! must always equal the sum of `tokens_remaining` over the user's active lots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{LotId, UserId};

/// A purchased batch of tokens.
///
/// Created once per successful grant, mutated only by consumption (which
/// decrements `tokens_remaining` and deactivates the lot at zero). Lots are
/// never deleted while referenced by usage history; an exhausted lot is
/// logically retired via `is_active = false`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lot {
    /// Unique lot id (ULID, time-ordered).
    pub id: LotId,

    /// The user who purchased this lot.
    pub user_id: UserId,

    /// External payment id that funded this lot. Unique across all lots;
    /// this is the idempotency anchor for grants.
    pub external_payment_id: String,

    /// Purchase amount in minor units of the quote currency.
    pub purchase_amount: i64,

    /// Tokens granted at purchase time. Always >= 1.
    pub tokens_purchased: i64,

    /// Tokens not yet consumed. `0 <= tokens_remaining <= tokens_purchased`.
    pub tokens_remaining: i64,

    /// False once the lot is exhausted.
    pub is_active: bool,

    /// When the lot was created.
    pub created_at: DateTime<Utc>,
}

impl Lot {
    /// Create a new fully-charged lot.
    #[must_use]
    pub fn new(
        user_id: UserId,
        external_payment_id: String,
        purchase_amount: i64,
        tokens: i64,
    ) -> Self {
        Self {
            id: LotId::generate(),
            user_id,
            external_payment_id,
            purchase_amount,
            tokens_purchased: tokens,
            tokens_remaining: tokens,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    /// Debit up to `amount` tokens from this lot, returning how many were
    /// actually taken. Deactivates the lot when it reaches zero.
    pub fn debit(&mut self, amount: i64) -> i64 {
        let taken = amount.min(self.tokens_remaining);
        self.tokens_remaining -= taken;
        if self.tokens_remaining == 0 {
            self.is_active = false;
        }
        taken
    }
}

/// Aggregate token balance for one user.
///
/// Kept in lockstep with the user's lots: every grant and every consumption
/// updates the balance and the lot rows in the same atomic unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBalance {
    /// The user this balance belongs to.
    pub user_id: UserId,

    /// Current token balance. Never negative.
    pub token_balance: i64,

    /// When the balance was last updated.
    pub updated_at: DateTime<Utc>,
}

impl UserBalance {
    /// Create a zero balance for a user.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            token_balance: 0,
            updated_at: Utc::now(),
        }
    }
}

/// The durable result of a grant, cached by the idempotency guard so a
/// redelivered payment notification returns the original outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantReceipt {
    /// The lot that was created.
    pub lot_id: LotId,

    /// The user who received the grant.
    pub user_id: UserId,

    /// The external payment id that keyed the grant.
    pub external_payment_id: String,

    /// Tokens granted.
    pub tokens_granted: i64,

    /// Aggregate balance immediately after the grant.
    pub new_balance: i64,
}
