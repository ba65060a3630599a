//! HTTP request handlers.

pub mod balance;
pub mod grants;
pub mod health;
pub mod pricing;
pub mod rates;
pub mod usage;
