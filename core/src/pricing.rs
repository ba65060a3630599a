//! Pricing policy and the purchase-to-tokens calculation.
//!
//! The calculation converts a purchase amount into a token grant while
//! enforcing the operator's profit-margin contract: the true API cost of the
//! granted tokens never exceeds `purchase_amount * profit_margin` (exactly
//! under `floor`; within one token's cost under `ceil`/`round`).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::error::{LedgerError, Result};

/// How to round the raw token count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// Round down. Cost-safe by construction.
    Floor,
    /// Round up. May exceed the cost limit by at most one token's cost.
    Ceil,
    /// Round half away from zero. May exceed by at most half a token's cost.
    Round,
}

impl RoundingMode {
    #[allow(clippy::cast_possible_truncation)]
    fn apply(self, raw: f64) -> i64 {
        match self {
            Self::Floor => raw.floor() as i64,
            Self::Ceil => raw.ceil() as i64,
            Self::Round => raw.round() as i64,
        }
    }
}

impl FromStr for RoundingMode {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "floor" => Ok(Self::Floor),
            "ceil" => Ok(Self::Ceil),
            "round" => Ok(Self::Round),
            other => Err(LedgerError::PolicyViolation(format!(
                "unknown rounding mode: {other}"
            ))),
        }
    }
}

/// Margin policy and per-model costs for the pricing calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Fraction of the purchase amount allowed to be consumed by API cost.
    pub profit_margin: f64,

    /// Lower bound on `profit_margin`. A margin outside the bounds is a
    /// configuration error, never silently clamped.
    pub min_profit_margin: f64,

    /// Upper bound on `profit_margin`.
    pub max_profit_margin: f64,

    /// Rounding applied to the raw token count.
    pub rounding_mode: RoundingMode,

    /// Minimum tokens per purchase (product floor).
    pub min_tokens: i64,

    /// Maximum tokens per purchase.
    pub max_tokens: i64,

    /// Per-model API cost per token, in base-currency minor units.
    pub cost_per_token_by_model: HashMap<String, f64>,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        let mut cost_per_token_by_model = HashMap::new();
        cost_per_token_by_model.insert("gpt-4o-mini".to_string(), 0.0006);
        cost_per_token_by_model.insert("gpt-4o".to_string(), 0.0024);
        cost_per_token_by_model.insert("claude-sonnet".to_string(), 0.0030);

        Self {
            profit_margin: 0.9,
            min_profit_margin: 0.5,
            max_profit_margin: 0.95,
            rounding_mode: RoundingMode::Floor,
            min_tokens: 100,
            max_tokens: 100_000,
            cost_per_token_by_model,
        }
    }
}

impl PricingPolicy {
    /// Validate the policy configuration.
    ///
    /// # Errors
    ///
    /// Returns `PolicyViolation` on any misconfiguration. Called at startup so
    /// a bad margin fails fast instead of mispricing purchases.
    pub fn validate(&self) -> Result<()> {
        if self.min_profit_margin > self.max_profit_margin {
            return Err(LedgerError::PolicyViolation(format!(
                "margin bounds inverted: min {} > max {}",
                self.min_profit_margin, self.max_profit_margin
            )));
        }
        if self.min_profit_margin <= 0.0 || self.max_profit_margin > 1.0 {
            return Err(LedgerError::PolicyViolation(format!(
                "margin bounds must lie in (0, 1]: [{}, {}]",
                self.min_profit_margin, self.max_profit_margin
            )));
        }
        if self.profit_margin < self.min_profit_margin
            || self.profit_margin > self.max_profit_margin
        {
            return Err(LedgerError::PolicyViolation(format!(
                "profit margin {} outside [{}, {}]",
                self.profit_margin, self.min_profit_margin, self.max_profit_margin
            )));
        }
        if self.min_tokens < 1 || self.min_tokens > self.max_tokens {
            return Err(LedgerError::PolicyViolation(format!(
                "token bounds invalid: [{}, {}]",
                self.min_tokens, self.max_tokens
            )));
        }
        for (model, cost) in &self.cost_per_token_by_model {
            if !cost.is_finite() || *cost <= 0.0 {
                return Err(LedgerError::PolicyViolation(format!(
                    "non-positive cost per token for model {model}: {cost}"
                )));
            }
        }
        Ok(())
    }

    /// Per-token cost in quote-currency minor units for a model at a rate.
    ///
    /// # Errors
    ///
    /// Returns `UnknownModel` if the model has no configured cost.
    pub fn cost_per_token_in_quote(&self, model_id: &str, rate: f64) -> Result<f64> {
        let base_cost = self
            .cost_per_token_by_model
            .get(model_id)
            .ok_or_else(|| LedgerError::UnknownModel {
                model_id: model_id.to_string(),
            })?;
        Ok(base_cost * rate)
    }

    /// Convert a purchase amount into a token grant.
    ///
    /// `purchase_amount` is in quote-currency minor units; `rate` is
    /// quote-currency units per base-currency unit. Pure: identical inputs
    /// always produce identical results.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` for a non-positive purchase amount.
    /// - `PolicyViolation` if the margin is outside its configured bounds.
    /// - `UnknownModel` if the model has no configured cost.
    /// - `InvalidRateSample` for a non-positive or non-finite rate.
    #[allow(clippy::cast_precision_loss)]
    pub fn compute(&self, purchase_amount: i64, model_id: &str, rate: f64) -> Result<Quote> {
        if purchase_amount <= 0 {
            return Err(LedgerError::InvalidAmount(format!(
                "purchase amount must be positive, got {purchase_amount}"
            )));
        }
        if self.profit_margin < self.min_profit_margin
            || self.profit_margin > self.max_profit_margin
        {
            return Err(LedgerError::PolicyViolation(format!(
                "profit margin {} outside [{}, {}]",
                self.profit_margin, self.min_profit_margin, self.max_profit_margin
            )));
        }
        if !rate.is_finite() || rate <= 0.0 {
            return Err(LedgerError::InvalidRateSample {
                rate,
                reason: "rate must be a positive finite number".into(),
            });
        }

        let cost_per_token = self.cost_per_token_in_quote(model_id, rate)?;
        let api_cost_limit = purchase_amount as f64 * self.profit_margin;
        let raw_tokens = api_cost_limit / cost_per_token;

        let tokens = self
            .rounding_mode
            .apply(raw_tokens)
            .clamp(self.min_tokens, self.max_tokens);

        let actual_cost = tokens as f64 * cost_per_token;
        let actual_margin = actual_cost / purchase_amount as f64;

        Ok(Quote {
            tokens,
            api_cost_limit,
            actual_cost,
            actual_margin,
        })
    }
}

/// The result of a pricing computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Tokens to grant.
    pub tokens: i64,

    /// Maximum API cost allowed for this purchase (`amount * margin`),
    /// in quote-currency minor units.
    pub api_cost_limit: f64,

    /// True API cost of the granted tokens.
    pub actual_cost: f64,

    /// Realized cost fraction of the purchase amount.
    pub actual_margin: f64,
}
