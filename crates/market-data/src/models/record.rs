use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Classification of a ticker.
///
/// Determined from provider metadata, never inferred from fundamentals.
/// `Unknown` tickers receive no rule evaluation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssetType {
    Stock,
    Etf,
    Unknown,
}

/// Which tier of the fallback chain produced a record.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceTier {
    Primary,
    Fallback,
    PaidFallback,
    /// No live tier answered; the record is a prior value re-served.
    Cache,
}

impl SourceTier {
    /// Priority rank within the fallback chain. Lower tries first.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Primary => 0,
            Self::Fallback => 1,
            Self::PaidFallback => 2,
            Self::Cache => 3,
        }
    }
}

impl std::fmt::Display for SourceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "PRIMARY"),
            Self::Fallback => write!(f, "FALLBACK"),
            Self::PaidFallback => write!(f, "PAID_FALLBACK"),
            Self::Cache => write!(f, "CACHE"),
        }
    }
}

/// The latest known data for one ticker.
///
/// Owned exclusively by the record store. An update replaces the whole
/// metric set or doesn't happen - there are no partial overwrites.
/// Staleness is not stored; it is computed at read time from
/// `fetched_at`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TickerRecord {
    /// Ticker symbol (store key).
    pub ticker: String,

    /// Classification as reported by the source that produced the record.
    pub asset_type: AssetType,

    /// Canonical metric name to value.
    pub metrics: HashMap<String, Decimal>,

    /// The tier that produced this data.
    pub source: SourceTier,

    /// When the data was acquired.
    pub fetched_at: DateTime<Utc>,

    /// Required metrics the source did not supply.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<String>,
}

impl TickerRecord {
    /// Look up a metric by canonical name.
    pub fn metric(&self, name: &str) -> Option<Decimal> {
        self.metrics.get(name).copied()
    }

    /// Age of the record relative to `now`. Zero if `fetched_at` is in
    /// the future (clock skew).
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.fetched_at).to_std().unwrap_or(Duration::ZERO)
    }

    /// Whether the record is older than the freshness bound.
    /// Independent of which tier most recently succeeded.
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.age(now) > threshold
    }

    /// Copy of this record re-tagged as served from cache.
    pub fn as_cached(&self) -> Self {
        let mut record = self.clone();
        record.source = SourceTier::Cache;
        record
    }
}
