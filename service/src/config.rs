//! Service configuration.

use std::collections::HashMap;
use std::str::FromStr;

use ledger_core::{LedgerError, PricingPolicy, Result, RoundingMode};

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to the `RocksDB` data directory (default: "/data/token-ledger").
    pub data_dir: String,

    /// Service API key for service-to-service auth.
    pub service_api_key: Option<String>,

    /// Shared secret for payment webhook HMAC signatures (optional).
    pub webhook_secret: Option<String>,

    /// Base currency of the per-model costs (default: "USD").
    pub base_currency: String,

    /// Quote currency purchases are made in (default: "RUB").
    pub quote_currency: String,

    /// Primary exchange-rate source URL (optional).
    pub rate_source_url: Option<String>,

    /// Secondary exchange-rate source URL, tried when the primary fails.
    pub rate_source_fallback_url: Option<String>,

    /// Timeout for one rate-source fetch, in seconds.
    pub rate_fetch_timeout_seconds: u64,

    /// Background refresh interval in seconds; 0 disables the task.
    pub rate_refresh_interval_seconds: u64,

    /// Lower edge of the absolute sane band for fetched rates.
    pub rate_sane_min: f64,

    /// Upper edge of the absolute sane band for fetched rates.
    pub rate_sane_max: f64,

    /// Rate served when no valid sample has ever been recorded.
    pub fallback_rate: f64,

    /// Pricing policy. Validated at startup; a bad margin aborts the service.
    pub policy: PricingPolicy,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/token-ledger".into()),
            service_api_key: std::env::var("SERVICE_API_KEY").ok(),
            webhook_secret: std::env::var("WEBHOOK_SECRET").ok(),
            base_currency: std::env::var("BASE_CURRENCY").unwrap_or_else(|_| "USD".into()),
            quote_currency: std::env::var("QUOTE_CURRENCY").unwrap_or_else(|_| "RUB".into()),
            rate_source_url: std::env::var("RATE_SOURCE_URL").ok(),
            rate_source_fallback_url: std::env::var("RATE_SOURCE_FALLBACK_URL").ok(),
            rate_fetch_timeout_seconds: env_parse("RATE_FETCH_TIMEOUT_SECONDS", 10),
            rate_refresh_interval_seconds: env_parse(
                "RATE_REFRESH_INTERVAL_SECONDS",
                7 * 24 * 60 * 60,
            ),
            rate_sane_min: env_parse("RATE_SANE_MIN", 30.0),
            rate_sane_max: env_parse("RATE_SANE_MAX", 300.0),
            fallback_rate: env_parse("FALLBACK_RATE", 90.0),
            policy: policy_from_env(),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_parse("MAX_BODY_BYTES", 1024 * 1024),
            request_timeout_seconds: env_parse("REQUEST_TIMEOUT_SECONDS", 30),
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `PolicyViolation` for a misconfigured margin policy or sane
    /// band. Called at startup; the service must not run with a bad policy.
    pub fn validate(&self) -> Result<()> {
        self.policy.validate()?;
        if self.rate_sane_min <= 0.0 || self.rate_sane_min >= self.rate_sane_max {
            return Err(LedgerError::PolicyViolation(format!(
                "rate sane band invalid: [{}, {}]",
                self.rate_sane_min, self.rate_sane_max
            )));
        }
        if self.fallback_rate < self.rate_sane_min || self.fallback_rate > self.rate_sane_max {
            return Err(LedgerError::PolicyViolation(format!(
                "fallback rate {} outside sane band [{}, {}]",
                self.fallback_rate, self.rate_sane_min, self.rate_sane_max
            )));
        }
        Ok(())
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/token-ledger".into(),
            service_api_key: None,
            webhook_secret: None,
            base_currency: "USD".into(),
            quote_currency: "RUB".into(),
            rate_source_url: None,
            rate_source_fallback_url: None,
            rate_fetch_timeout_seconds: 10,
            rate_refresh_interval_seconds: 7 * 24 * 60 * 60,
            rate_sane_min: 30.0,
            rate_sane_max: 300.0,
            fallback_rate: 90.0,
            policy: PricingPolicy::default(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        }
    }
}

/// Parse an environment variable, falling back to a default.
fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Build the pricing policy from environment overrides on top of defaults.
fn policy_from_env() -> PricingPolicy {
    let defaults = PricingPolicy::default();

    let rounding_mode = std::env::var("ROUNDING_MODE")
        .ok()
        .and_then(|s| RoundingMode::from_str(&s).ok())
        .unwrap_or(defaults.rounding_mode);

    let cost_per_token_by_model = std::env::var("COST_PER_TOKEN_BY_MODEL")
        .ok()
        .and_then(|raw| serde_json::from_str::<HashMap<String, f64>>(&raw).ok())
        .unwrap_or(defaults.cost_per_token_by_model);

    PricingPolicy {
        profit_margin: env_parse("PROFIT_MARGIN", defaults.profit_margin),
        min_profit_margin: env_parse("MIN_PROFIT_MARGIN", defaults.min_profit_margin),
        max_profit_margin: env_parse("MAX_PROFIT_MARGIN", defaults.max_profit_margin),
        rounding_mode,
        min_tokens: env_parse("MIN_TOKENS_PER_PURCHASE", defaults.min_tokens),
        max_tokens: env_parse("MAX_TOKENS_PER_PURCHASE", defaults.max_tokens),
        cost_per_token_by_model,
    }
}
