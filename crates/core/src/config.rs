//! Typed configuration for the monitoring core.
//!
//! Parsing config files is an external collaborator's job; the core
//! only defines the shapes and screens entries. Malformed entries are
//! per-entry skips, never fatal.

use std::collections::HashSet;
use std::time::Duration;

use log::warn;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::alerts::Channel;

/// How a metric is compared to its threshold.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Fires when the metric exceeds the threshold.
    Above,
    /// Fires when the metric is under the threshold.
    Below,
    /// Fires when the metric's magnitude reaches the threshold.
    AbsoluteChange,
}

/// One configured trigger for one ticker. Immutable after load.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub ticker: String,
    pub trigger_type: String,
    pub comparison_value: Decimal,
    pub direction: Direction,
}

/// Core-wide tuning for the cycle runner.
#[derive(Clone, Debug)]
pub struct MonitorConfig {
    /// Record age beyond which data is reported stale.
    pub staleness_threshold: Duration,
    /// Concurrent per-ticker fetches. The rate limiter, not this cap,
    /// bounds per-source call rates.
    pub max_concurrency: usize,
    /// Channels every alert is delivered to, in alert priority order.
    pub channels: Vec<Channel>,
    /// Explicit ETF classification overrides, for symbols whose
    /// provider flag is missing or wrong.
    pub etf_symbols: HashSet<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            staleness_threshold: Duration::from_secs(24 * 3600),
            max_concurrency: 4,
            channels: vec![Channel::Email],
            etf_symbols: HashSet::new(),
        }
    }
}

/// Drop threshold entries the cycle could never use.
///
/// Unknown tickers and non-positive comparison values are skipped with
/// a warning; the survivors are returned in input order.
pub fn screen_thresholds(
    portfolio: &[String],
    entries: Vec<ThresholdConfig>,
) -> Vec<ThresholdConfig> {
    let known: HashSet<&str> = portfolio.iter().map(String::as_str).collect();

    entries
        .into_iter()
        .filter(|entry| {
            if !known.contains(entry.ticker.as_str()) {
                warn!(
                    "Skipping threshold '{}' for unknown ticker '{}'",
                    entry.trigger_type, entry.ticker
                );
                return false;
            }
            if entry.comparison_value <= Decimal::ZERO {
                warn!(
                    "Skipping threshold '{}' for '{}': comparison value {} out of range",
                    entry.trigger_type, entry.ticker, entry.comparison_value
                );
                return false;
            }
            true
        })
        .collect()
}
