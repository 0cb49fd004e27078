//! Asset classification.
//!
//! Classification decides which rule set applies to a ticker, so it
//! has to be deterministic: operator overrides first, then whatever
//! the data source reported, and `Unknown` when neither knows.
//! Fundamentals are never used to guess a type.

use std::collections::HashSet;

use folioalert_market_data::{AssetType, TickerRecord};
use log::debug;

pub struct AssetClassifier {
    etf_overrides: HashSet<String>,
}

impl AssetClassifier {
    pub fn new(etf_overrides: HashSet<String>) -> Self {
        Self { etf_overrides }
    }

    pub fn classify(&self, record: &TickerRecord) -> AssetType {
        if self.etf_overrides.contains(&record.ticker) {
            return AssetType::Etf;
        }
        if record.asset_type == AssetType::Unknown {
            debug!(
                "'{}' has no classification, excluding from rule evaluation",
                record.ticker
            );
        }
        record.asset_type
    }
}
