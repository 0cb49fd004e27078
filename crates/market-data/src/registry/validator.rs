//! Raw metric validation.
//!
//! Runs between a provider response and the store write. A record is
//! never partially overwritten, so the decision here is all-or-nothing
//! per response: reject it, or accept it (possibly with gaps) and
//! record which required fields are missing.

use std::collections::HashMap;

use log::warn;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{metric, required_metrics, AssetType, RawMetrics};

/// Why a provider response was rejected.
#[derive(Error, Debug)]
pub enum ValidationFailure {
    /// The response carried no fields at all. Accepting it would
    /// destroy prior data for no information.
    #[error("Response contained no metrics")]
    EmptyResponse,

    /// Every required field for the asset type is absent.
    #[error("All required metrics absent for asset type")]
    RequiredFieldsAbsent,

    /// A value is outside the plausible range.
    #[error("Metric out of range: {0}")]
    OutOfRange(String),
}

/// Validator tuning.
#[derive(Clone, Debug)]
pub struct ValidatorConfig {
    /// Reject responses with a negative price field.
    pub reject_negative_prices: bool,
    /// Sanity ceiling for price fields.
    pub max_price: Option<Decimal>,
    /// Log when volume is reported as zero.
    pub warn_on_zero_volume: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            reject_negative_prices: true,
            max_price: Some(Decimal::from(1_000_000_000i64)),
            warn_on_zero_volume: true,
        }
    }
}

/// Accepted response: the metric map plus the required fields the
/// provider failed to supply.
#[derive(Clone, Debug)]
pub struct ValidatedMetrics {
    pub metrics: HashMap<String, Decimal>,
    pub missing_fields: Vec<String>,
}

/// Validates raw metrics before they reach the record store.
pub struct MetricsValidator {
    config: ValidatorConfig,
}

impl MetricsValidator {
    pub fn new() -> Self {
        Self {
            config: ValidatorConfig::default(),
        }
    }

    pub fn with_config(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Validate a raw response for a ticker.
    ///
    /// Accepts partial data as long as at least one required metric is
    /// present; the absentees are returned in `missing_fields`.
    pub fn validate(
        &self,
        ticker: &str,
        asset_type: AssetType,
        raw: &RawMetrics,
    ) -> Result<ValidatedMetrics, ValidationFailure> {
        if raw.is_empty() {
            return Err(ValidationFailure::EmptyResponse);
        }

        let required = required_metrics(asset_type);
        let missing_fields: Vec<String> = required
            .iter()
            .filter(|name| raw.get(name).is_none())
            .map(|name| name.to_string())
            .collect();

        if missing_fields.len() == required.len() {
            return Err(ValidationFailure::RequiredFieldsAbsent);
        }

        for price_field in [metric::CURRENT_PRICE, metric::PREVIOUS_CLOSE] {
            if let Some(value) = raw.get(price_field) {
                if self.config.reject_negative_prices && value.is_sign_negative() {
                    return Err(ValidationFailure::OutOfRange(format!(
                        "{} = {} for {}",
                        price_field, value, ticker
                    )));
                }
                if let Some(max) = self.config.max_price {
                    if value > max {
                        return Err(ValidationFailure::OutOfRange(format!(
                            "{} = {} for {} exceeds sanity ceiling",
                            price_field, value, ticker
                        )));
                    }
                }
            }
        }

        if self.config.warn_on_zero_volume {
            if let Some(volume) = raw.get(metric::VOLUME) {
                if volume.is_zero() {
                    warn!("Zero volume reported for '{}'", ticker);
                }
            }
        }

        Ok(ValidatedMetrics {
            metrics: raw.fields.clone(),
            missing_fields,
        })
    }
}

impl Default for MetricsValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn stock_raw() -> RawMetrics {
        let mut raw = RawMetrics::new();
        raw.insert(metric::CURRENT_PRICE, dec!(120));
        raw.insert(metric::PREVIOUS_CLOSE, dec!(118));
        raw.insert(metric::GROSS_MARGIN, dec!(0.62));
        raw
    }

    #[test]
    fn test_accepts_partial_data_and_records_gaps() {
        let validator = MetricsValidator::new();
        let validated = validator
            .validate("AAPL", AssetType::Stock, &stock_raw())
            .unwrap();

        assert_eq!(validated.metrics.len(), 3);
        assert_eq!(
            validated.missing_fields,
            vec![metric::REVENUE_GROWTH.to_string()]
        );
    }

    #[test]
    fn test_rejects_empty_response() {
        let validator = MetricsValidator::new();
        let result = validator.validate("AAPL", AssetType::Stock, &RawMetrics::new());
        assert!(matches!(result, Err(ValidationFailure::EmptyResponse)));
    }

    #[test]
    fn test_rejects_all_required_absent() {
        let validator = MetricsValidator::new();
        let mut raw = RawMetrics::new();
        // Present but not required for an ETF
        raw.insert(metric::GROSS_MARGIN, dec!(0.5));

        let result = validator.validate("QQQ", AssetType::Etf, &raw);
        assert!(matches!(
            result,
            Err(ValidationFailure::RequiredFieldsAbsent)
        ));
    }

    #[test]
    fn test_rejects_negative_price() {
        let validator = MetricsValidator::new();
        let mut raw = stock_raw();
        raw.insert(metric::CURRENT_PRICE, dec!(-5));

        let result = validator.validate("AAPL", AssetType::Stock, &raw);
        assert!(matches!(result, Err(ValidationFailure::OutOfRange(_))));
    }

    #[test]
    fn test_rejects_absurd_price() {
        let validator = MetricsValidator::new();
        let mut raw = stock_raw();
        raw.insert(metric::CURRENT_PRICE, dec!(2000000000));

        let result = validator.validate("AAPL", AssetType::Stock, &raw);
        assert!(matches!(result, Err(ValidationFailure::OutOfRange(_))));
    }

    #[test]
    fn test_complete_etf_data_has_no_gaps() {
        let validator = MetricsValidator::new();
        let mut raw = RawMetrics::new();
        raw.insert(metric::CURRENT_PRICE, dec!(400));
        raw.insert(metric::PREVIOUS_CLOSE, dec!(395));
        raw.insert(metric::VOLUME, dec!(41250000));

        let validated = validator.validate("QQQ", AssetType::Etf, &raw).unwrap();
        assert!(validated.missing_fields.is_empty());
    }
}
