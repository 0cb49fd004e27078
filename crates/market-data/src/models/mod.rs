//! Data model for the acquisition layer.

mod metrics;
mod record;
mod store;

pub use metrics::{metric, required_metrics, RawMetrics};
pub use record::{AssetType, SourceTier, TickerRecord};
pub use store::{RecordStore, StoreError, UpsertOutcome};
