//! Token ledger HTTP API service.
//!
//! This crate provides the HTTP surface for the token ledger:
//!
//! - Payment-completed webhook and grant API (idempotent token grants)
//! - Consume API and balance/usage/lot reads
//! - Pure pricing preview
//! - Exchange-rate refresh trigger and latest-rate read
//!
//! # Authentication
//!
//! Service-to-service requests authenticate with an `x-api-key` header; the
//! payment webhook can additionally carry an HMAC-SHA256 body signature.
//! End-user authentication lives in an upstream gateway, not here.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Read-only handlers stay async for consistency

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod oracle;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use oracle::{ExchangeRateOracle, HttpRateSource, RateSource};
pub use routes::create_router;
pub use state::AppState;
