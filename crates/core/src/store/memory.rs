//! In-memory record store.
//!
//! One entry per ticker behind an async `RwLock`. Concurrent fetch
//! completions race on the same key; the compare on `fetched_at`
//! inside the write lock makes the freshest record win regardless of
//! completion order.

use std::collections::HashMap;

use async_trait::async_trait;
use folioalert_market_data::{RecordStore, StoreError, TickerRecord, UpsertOutcome};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<String, TickerRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, ticker: &str) -> Result<Option<TickerRecord>, StoreError> {
        Ok(self.records.read().await.get(ticker).cloned())
    }

    async fn upsert(&self, record: TickerRecord) -> Result<UpsertOutcome, StoreError> {
        let mut records = self.records.write().await;
        match records.get(&record.ticker) {
            Some(existing) if existing.fetched_at > record.fetched_at => {
                Ok(UpsertOutcome::StaleWriteIgnored)
            }
            Some(_) => {
                records.insert(record.ticker.clone(), record);
                Ok(UpsertOutcome::Replaced)
            }
            None => {
                records.insert(record.ticker.clone(), record);
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn all(&self) -> Result<Vec<TickerRecord>, StoreError> {
        Ok(self.records.read().await.values().cloned().collect())
    }
}
