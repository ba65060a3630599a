//! Core types and pricing engine for the token ledger.
//!
//! This crate provides the foundational types used throughout the ledger:
//!
//! - **Identifiers**: `UserId`, `LotId`, `UsageRecordId`
//! - **Lots & balances**: `Lot`, `UserBalance`, `GrantReceipt`
//! - **Usage**: `UsageRecord`, `LotDebit`
//! - **Rates**: `ExchangeRateSample`, `RateProvenance`
//! - **Pricing**: `PricingPolicy`, `RoundingMode`, `Quote`
//!
//! # Token unit
//!
//! Tokens are the internal currency users spend on metered usage. A user buys
//! tokens with real money (tracked in integer minor units, e.g. cents) and the
//! pricing engine converts the purchase amount into a token grant while
//! enforcing a profit-margin contract. Tokens and money amounts are stored as
//! `i64` to avoid floating point drift in the ledger itself; only the pricing
//! computation works in floating point.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod lot;
pub mod pricing;
pub mod rate;
pub mod usage;

pub use error::{FailureKind, LedgerError, Result};
pub use ids::{IdError, LotId, UsageRecordId, UserId};
pub use lot::{GrantReceipt, Lot, UserBalance};
pub use pricing::{PricingPolicy, Quote, RoundingMode};
pub use rate::{validate_rate, ExchangeRateSample, RateProvenance, MAX_RELATIVE_JUMP};
pub use usage::{LotDebit, UsageRecord};
