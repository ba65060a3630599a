//! Exchange-rate sample types and validation.
//!
//! The oracle appends a new sample on every refresh cycle; samples are never
//! updated in place. Anomalous readings are persisted for audit with
//! `is_valid = false` and never replace the latest valid rate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Maximum relative change from the previous valid rate before a sample is
/// rejected as anomalous.
pub const MAX_RELATIVE_JUMP: f64 = 0.20;

/// Where a rate sample came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateProvenance {
    /// The primary rate source.
    Primary,
    /// The secondary rate source (primary failed).
    Secondary,
    /// Neither source was reachable; the hardcoded fallback was recorded.
    Fallback,
}

impl RateProvenance {
    /// The provenance name as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::Fallback => "fallback",
        }
    }
}

/// One fetched exchange-rate reading, valid or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRateSample {
    /// Base currency code (e.g. "USD").
    pub base_currency: String,

    /// Quote currency code (e.g. "RUB").
    pub quote_currency: String,

    /// Quote-currency units per one base-currency unit.
    pub rate: f64,

    /// When the sample was fetched.
    pub fetched_at: DateTime<Utc>,

    /// Which source produced the reading.
    pub source: RateProvenance,

    /// Whether the reading passed validation.
    pub is_valid: bool,

    /// The previous valid rate at fetch time, if any.
    pub previous_rate: Option<f64>,
}

/// Validate a fetched rate against an absolute sane band and the maximum
/// relative jump from the previous valid rate.
///
/// # Errors
///
/// Returns `InvalidRateSample` describing why the reading was rejected.
pub fn validate_rate(
    rate: f64,
    previous_valid: Option<f64>,
    sane_min: f64,
    sane_max: f64,
) -> Result<(), LedgerError> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(LedgerError::InvalidRateSample {
            rate,
            reason: "rate must be a positive finite number".into(),
        });
    }

    if rate < sane_min || rate > sane_max {
        return Err(LedgerError::InvalidRateSample {
            rate,
            reason: format!("outside sane band [{sane_min}, {sane_max}]"),
        });
    }

    if let Some(previous) = previous_valid {
        let jump = (rate - previous).abs() / previous;
        if jump > MAX_RELATIVE_JUMP {
            return Err(LedgerError::InvalidRateSample {
                rate,
                reason: format!(
                    "relative change {jump:.3} from previous valid rate {previous} exceeds {MAX_RELATIVE_JUMP}"
                ),
            });
        }
    }

    Ok(())
}
