use std::collections::HashMap;

use rust_decimal::Decimal;

use super::record::AssetType;

/// Canonical metric names providers normalize into.
///
/// Every provider maps its own field names onto these before the raw
/// response leaves the provider module.
pub mod metric {
    /// Latest traded price.
    pub const CURRENT_PRICE: &str = "current_price";
    /// Previous session close, used for single-day move calculations.
    pub const PREVIOUS_CLOSE: &str = "previous_close";
    /// Latest session volume.
    pub const VOLUME: &str = "volume";
    /// Trailing average daily volume, used for spike detection.
    pub const AVG_VOLUME: &str = "avg_volume";
    /// Year-over-year revenue growth as a fraction (0.12 = 12%).
    pub const REVENUE_GROWTH: &str = "revenue_growth";
    /// Gross margin as a fraction (0.68 = 68%).
    pub const GROSS_MARGIN: &str = "gross_margin";
}

/// Required metric names for an asset type.
///
/// A response missing every one of these is rejected; a response with
/// at least one present is accepted with the absentees recorded.
pub fn required_metrics(asset_type: AssetType) -> &'static [&'static str] {
    match asset_type {
        AssetType::Stock => &[
            metric::CURRENT_PRICE,
            metric::PREVIOUS_CLOSE,
            metric::REVENUE_GROWTH,
            metric::GROSS_MARGIN,
        ],
        // ETFs structurally lack fundamentals, price data is all we ask for
        AssetType::Etf | AssetType::Unknown => &[
            metric::CURRENT_PRICE,
            metric::PREVIOUS_CLOSE,
            metric::VOLUME,
        ],
    }
}

/// Unvalidated metrics as returned by a single provider call.
///
/// Field names are already canonical (see [`metric`]) but nothing has
/// been checked yet - validation happens in the registry before any
/// store write.
#[derive(Clone, Debug, Default)]
pub struct RawMetrics {
    /// Metric name to value.
    pub fields: HashMap<String, Decimal>,

    /// Provider-reported fund/ETF indicator, when the provider has one.
    /// `None` means the provider did not say either way.
    pub etf_flag: Option<bool>,
}

impl RawMetrics {
    /// Create an empty metric set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a metric value under a canonical name.
    pub fn insert(&mut self, name: &str, value: Decimal) {
        self.fields.insert(name.to_string(), value);
    }

    /// Look up a metric by canonical name.
    pub fn get(&self, name: &str) -> Option<Decimal> {
        self.fields.get(name).copied()
    }

    /// Whether the provider returned no usable fields at all.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Asset type implied by the provider's fund indicator, if any.
    pub fn reported_asset_type(&self) -> Option<AssetType> {
        self.etf_flag.map(|is_etf| {
            if is_etf {
                AssetType::Etf
            } else {
                AssetType::Stock
            }
        })
    }
}
