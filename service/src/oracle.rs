//! Exchange-rate oracle.
//!
//! The oracle owns the quote-currency exchange rate used by pricing. It
//! fetches from a primary source, falls over to a secondary, validates every
//! reading against an absolute sane band and a maximum relative jump, and
//! appends every sample (valid or not) to the store for audit. The latest
//! valid rate is cached in memory; when no valid rate has ever been recorded
//! the configured fallback rate is served instead.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};

use ledger_core::{validate_rate, ExchangeRateSample, LedgerError, RateProvenance};
use ledger_store::Store;

use crate::config::ServiceConfig;

/// A source of exchange-rate readings.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Fetch the current rate (quote-currency units per base unit).
    ///
    /// # Errors
    ///
    /// Returns `RateSourceUnavailable` when the source cannot be reached or
    /// returns an unusable response.
    async fn fetch(&self) -> Result<f64, LedgerError>;
}

/// Expected rate-source response body.
#[derive(Debug, Deserialize)]
struct RateResponse {
    rate: f64,
}

/// HTTP rate source returning JSON of the form `{"rate": 92.5}`.
#[derive(Debug, Clone)]
pub struct HttpRateSource {
    client: reqwest::Client,
    url: String,
}

impl HttpRateSource {
    /// Create a new HTTP rate source.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn fetch(&self) -> Result<f64, LedgerError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| LedgerError::RateSourceUnavailable(format!("{}: {e}", self.url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LedgerError::RateSourceUnavailable(format!(
                "{}: HTTP {status}",
                self.url
            )));
        }

        let body: RateResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::RateSourceUnavailable(format!("{}: {e}", self.url)))?;

        Ok(body.rate)
    }
}

/// The exchange-rate oracle.
pub struct ExchangeRateOracle<S: Store> {
    store: Arc<S>,
    primary: Option<Box<dyn RateSource>>,
    secondary: Option<Box<dyn RateSource>>,
    base_currency: String,
    quote_currency: String,
    sane_min: f64,
    sane_max: f64,
    fallback_rate: f64,
    cached_valid: RwLock<Option<f64>>,
    refresh_lock: Mutex<()>,
}

impl<S: Store> ExchangeRateOracle<S> {
    /// Create an oracle from configuration, seeding the cache from the most
    /// recent valid sample on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the seed sample fails.
    pub fn from_config(store: Arc<S>, config: &ServiceConfig) -> Result<Self, LedgerError> {
        let timeout = Duration::from_secs(config.rate_fetch_timeout_seconds);
        let primary = config
            .rate_source_url
            .as_ref()
            .map(|url| Box::new(HttpRateSource::new(url, timeout)) as Box<dyn RateSource>);
        let secondary = config
            .rate_source_fallback_url
            .as_ref()
            .map(|url| Box::new(HttpRateSource::new(url, timeout)) as Box<dyn RateSource>);

        Self::new(store, primary, secondary, config)
    }

    /// Create an oracle with explicit sources.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the seed sample fails.
    pub fn new(
        store: Arc<S>,
        primary: Option<Box<dyn RateSource>>,
        secondary: Option<Box<dyn RateSource>>,
        config: &ServiceConfig,
    ) -> Result<Self, LedgerError> {
        let seed = store.latest_valid_rate_sample()?.map(|s| s.rate);
        if let Some(rate) = seed {
            tracing::info!(rate, "Seeded exchange-rate cache from store");
        }

        Ok(Self {
            store,
            primary,
            secondary,
            base_currency: config.base_currency.clone(),
            quote_currency: config.quote_currency.clone(),
            sane_min: config.rate_sane_min,
            sane_max: config.rate_sane_max,
            fallback_rate: config.fallback_rate,
            cached_valid: RwLock::new(seed),
            refresh_lock: Mutex::new(()),
        })
    }

    /// The rate to price with right now, plus whether it is degraded.
    ///
    /// Degraded means no valid sample has ever been recorded and the
    /// configured fallback rate is being served.
    pub async fn current_rate(&self) -> (f64, bool) {
        match *self.cached_valid.read().await {
            Some(rate) => (rate, false),
            None => (self.fallback_rate, true),
        }
    }

    /// The rate to price with right now.
    pub async fn latest_valid_rate(&self) -> f64 {
        let (rate, degraded) = self.current_rate().await;
        if degraded {
            tracing::warn!(
                fallback_rate = rate,
                "No valid exchange-rate sample recorded; pricing with fallback rate"
            );
        }
        rate
    }

    /// Fetch, validate, and record a fresh rate sample.
    ///
    /// Tries the primary source first, then the secondary. Every reading is
    /// persisted; only a reading that passes validation replaces the cached
    /// rate. When neither source yields a usable reading a fallback sample
    /// with `is_valid = false` is recorded so the outage is auditable.
    ///
    /// # Errors
    ///
    /// Returns an error only when persisting a sample fails.
    pub async fn refresh(&self) -> Result<ExchangeRateSample, LedgerError> {
        // Refreshes run one at a time so each reading is judged against the
        // freshest accepted rate, not a snapshot taken before a concurrent
        // refresh landed.
        let _refresh = self.refresh_lock.lock().await;
        let previous = *self.cached_valid.read().await;

        let sources = [
            (RateProvenance::Primary, self.primary.as_ref()),
            (RateProvenance::Secondary, self.secondary.as_ref()),
        ];

        for (provenance, source) in sources {
            let Some(source) = source else { continue };

            let rate = match source.fetch().await {
                Ok(rate) => rate,
                Err(e) => {
                    tracing::warn!(source = provenance.as_str(), error = %e, "Rate source unreachable");
                    continue;
                }
            };

            let sample = match validate_rate(rate, previous, self.sane_min, self.sane_max) {
                Ok(()) => self.make_sample(rate, provenance, true, previous),
                Err(e) => {
                    tracing::warn!(
                        source = provenance.as_str(),
                        rate,
                        error = %e,
                        "Rejected anomalous rate sample"
                    );
                    self.make_sample(rate, provenance, false, previous)
                }
            };

            self.store.put_rate_sample(&sample)?;

            if sample.is_valid {
                *self.cached_valid.write().await = Some(sample.rate);
                tracing::info!(
                    rate = sample.rate,
                    source = provenance.as_str(),
                    "Exchange rate refreshed"
                );
                return Ok(sample);
            }
            // An anomalous reading does not justify trying a lower-priority
            // source; record it and stop.
            return Ok(sample);
        }

        let sample = self.make_sample(self.fallback_rate, RateProvenance::Fallback, false, previous);
        self.store.put_rate_sample(&sample)?;
        tracing::warn!(
            fallback_rate = self.fallback_rate,
            "All rate sources failed; recorded fallback sample"
        );
        Ok(sample)
    }

    fn make_sample(
        &self,
        rate: f64,
        source: RateProvenance,
        is_valid: bool,
        previous_rate: Option<f64>,
    ) -> ExchangeRateSample {
        ExchangeRateSample {
            base_currency: self.base_currency.clone(),
            quote_currency: self.quote_currency.clone(),
            rate,
            fetched_at: Utc::now(),
            source,
            is_valid,
            previous_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_store::RocksStore;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Rate source driven by a scripted list of outcomes.
    struct FakeSource {
        outcomes: Mutex<Vec<Result<f64, LedgerError>>>,
    }

    impl FakeSource {
        fn new(outcomes: Vec<Result<f64, LedgerError>>) -> Box<dyn RateSource> {
            Box::new(Self {
                outcomes: Mutex::new(outcomes),
            })
        }

        fn always(rate: f64) -> Box<dyn RateSource> {
            Self::new((0..16).map(|_| Ok(rate)).collect())
        }

        fn down() -> Box<dyn RateSource> {
            Box::new(Self {
                outcomes: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl RateSource for FakeSource {
        async fn fetch(&self) -> Result<f64, LedgerError> {
            let mut outcomes = self.outcomes.lock().unwrap();
            if outcomes.is_empty() {
                return Err(LedgerError::RateSourceUnavailable("scripted outage".into()));
            }
            outcomes.remove(0)
        }
    }

    fn oracle_with(
        primary: Option<Box<dyn RateSource>>,
        secondary: Option<Box<dyn RateSource>>,
    ) -> (ExchangeRateOracle<RocksStore>, Arc<RocksStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        let config = ServiceConfig::default();
        let oracle = ExchangeRateOracle::new(store.clone(), primary, secondary, &config).unwrap();
        (oracle, store, dir)
    }

    #[tokio::test]
    async fn refresh_records_valid_sample_and_updates_cache() {
        let (oracle, store, _dir) = oracle_with(Some(FakeSource::always(92.5)), None);

        let sample = oracle.refresh().await.unwrap();
        assert!(sample.is_valid);
        assert_eq!(sample.source, RateProvenance::Primary);
        assert!((sample.rate - 92.5).abs() < f64::EPSILON);

        let (rate, degraded) = oracle.current_rate().await;
        assert!(!degraded);
        assert!((rate - 92.5).abs() < f64::EPSILON);

        let stored = store.latest_valid_rate_sample().unwrap().unwrap();
        assert!((stored.rate - 92.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn anomalous_reading_is_recorded_but_does_not_replace_cache() {
        // 90 then 200: a jump far beyond the 20% limit.
        let (oracle, store, _dir) =
            oracle_with(Some(FakeSource::new(vec![Ok(90.0), Ok(200.0)])), None);

        oracle.refresh().await.unwrap();
        let sample = oracle.refresh().await.unwrap();
        assert!(!sample.is_valid);
        assert_eq!(sample.previous_rate, Some(90.0));

        let (rate, degraded) = oracle.current_rate().await;
        assert!(!degraded);
        assert!((rate - 90.0).abs() < f64::EPSILON);

        // Both samples are on disk; only the first is valid.
        let latest = store.latest_rate_sample().unwrap().unwrap();
        assert!(!latest.is_valid);
        let latest_valid = store.latest_valid_rate_sample().unwrap().unwrap();
        assert!((latest_valid.rate - 90.0).abs() < f64::EPSILON);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_refreshes_validate_against_the_freshest_rate() {
        // Two refreshes racing over 90 then 200: whichever runs second must
        // judge 200 against the freshly accepted 90 and reject it.
        let (oracle, store, _dir) =
            oracle_with(Some(FakeSource::new(vec![Ok(90.0), Ok(200.0)])), None);
        let oracle = Arc::new(oracle);

        let first = tokio::spawn({
            let oracle = oracle.clone();
            async move { oracle.refresh().await.unwrap() }
        });
        let second = tokio::spawn({
            let oracle = oracle.clone();
            async move { oracle.refresh().await.unwrap() }
        });
        let (a, b) = (first.await.unwrap(), second.await.unwrap());

        assert!(a.is_valid != b.is_valid);
        let rejected = if a.is_valid { b } else { a };
        assert!((rejected.rate - 200.0).abs() < f64::EPSILON);
        assert_eq!(rejected.previous_rate, Some(90.0));

        let (rate, degraded) = oracle.current_rate().await;
        assert!(!degraded);
        assert!((rate - 90.0).abs() < f64::EPSILON);
        let latest_valid = store.latest_valid_rate_sample().unwrap().unwrap();
        assert!((latest_valid.rate - 90.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn secondary_source_covers_primary_outage() {
        let (oracle, _store, _dir) =
            oracle_with(Some(FakeSource::down()), Some(FakeSource::always(88.0)));

        let sample = oracle.refresh().await.unwrap();
        assert!(sample.is_valid);
        assert_eq!(sample.source, RateProvenance::Secondary);
    }

    #[tokio::test]
    async fn total_outage_records_fallback_sample() {
        let (oracle, store, _dir) =
            oracle_with(Some(FakeSource::down()), Some(FakeSource::down()));

        let sample = oracle.refresh().await.unwrap();
        assert!(!sample.is_valid);
        assert_eq!(sample.source, RateProvenance::Fallback);

        // The cache stays empty so pricing keeps using the fallback.
        let (rate, degraded) = oracle.current_rate().await;
        assert!(degraded);
        assert!((rate - 90.0).abs() < f64::EPSILON);
        assert!(store.latest_valid_rate_sample().unwrap().is_none());
    }

    #[tokio::test]
    async fn fallback_rate_served_before_first_refresh() {
        let (oracle, _store, _dir) = oracle_with(None, None);
        let rate = oracle.latest_valid_rate().await;
        assert!((rate - 90.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn cache_is_seeded_from_store_on_startup() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        let config = ServiceConfig::default();

        {
            let oracle =
                ExchangeRateOracle::new(store.clone(), Some(FakeSource::always(95.0)), None, &config)
                    .unwrap();
            oracle.refresh().await.unwrap();
        }

        let reopened = ExchangeRateOracle::new(store, None, None, &config).unwrap();
        let (rate, degraded) = reopened.current_rate().await;
        assert!(!degraded);
        assert!((rate - 95.0).abs() < f64::EPSILON);
    }
}
