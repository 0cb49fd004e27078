use async_trait::async_trait;
use thiserror::Error;

use super::record::TickerRecord;

/// Error from the record store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing medium failed.
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Result of an upsert attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UpsertOutcome {
    /// No prior record existed.
    Inserted,
    /// A prior record was replaced.
    Replaced,
    /// The incoming record was older than the stored one and was
    /// dropped. Last write wins by `fetched_at`, never by completion
    /// order.
    StaleWriteIgnored,
}

/// Durable key-value store of the latest known record per ticker.
///
/// Implementations must provide atomic per-key writes: concurrent
/// upserts for distinct tickers are independent, and upserts for the
/// same ticker must compare `fetched_at` so a slow stale fetch never
/// clobbers a newer value.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Latest record for a ticker, if one has ever been written.
    async fn get(&self, ticker: &str) -> Result<Option<TickerRecord>, StoreError>;

    /// Write a record, keeping whichever of the stored and incoming
    /// records has the newer `fetched_at`.
    async fn upsert(&self, record: TickerRecord) -> Result<UpsertOutcome, StoreError>;

    /// All stored records.
    async fn all(&self) -> Result<Vec<TickerRecord>, StoreError>;
}
