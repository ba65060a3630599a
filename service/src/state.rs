//! Application state.

use std::sync::Arc;

use ledger_core::LedgerError;
use ledger_store::{IdempotencyGuard, RocksStore};

use crate::config::ServiceConfig;
use crate::oracle::ExchangeRateOracle;

/// Application state shared across handlers.
pub struct AppState {
    /// The storage backend.
    pub store: Arc<RocksStore>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Exchange-rate oracle.
    pub oracle: Arc<ExchangeRateOracle<RocksStore>>,

    /// Idempotency guard for grant operations.
    pub guard: Arc<IdempotencyGuard<RocksStore>>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if seeding the oracle cache from the store fails.
    pub fn new(store: Arc<RocksStore>, config: ServiceConfig) -> Result<Self, LedgerError> {
        if config.service_api_key.is_none() {
            tracing::warn!("SERVICE_API_KEY not configured - authenticated routes will reject all requests");
        }
        if config.webhook_secret.is_none() {
            tracing::warn!("WEBHOOK_SECRET not configured - webhook signatures will not be verified");
        }
        if config.rate_source_url.is_none() {
            tracing::warn!("RATE_SOURCE_URL not configured - pricing will use stored or fallback rates");
        }

        let oracle = Arc::new(ExchangeRateOracle::from_config(store.clone(), &config)?);
        let guard = Arc::new(IdempotencyGuard::new(store.clone()));

        Ok(Self {
            store,
            config,
            oracle,
            guard,
        })
    }
}
