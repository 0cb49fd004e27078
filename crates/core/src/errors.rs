//! Error taxonomy for the monitoring pipeline.
//!
//! Failures are scoped to the smallest unit possible: one ticker or
//! one alert. Nothing here aborts a portfolio cycle.

use folioalert_market_data::{FetchChainError, StoreError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    /// The ticker does not exist upstream. A configuration problem,
    /// surfaced immediately without trying further tiers.
    #[error("Invalid ticker: {0}")]
    InvalidTicker(String),

    /// Total acquisition failure for a ticker with no prior record.
    #[error("No live source succeeded and no cached record exists for {0}")]
    NoCacheAvailable(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// No severity or template is known for a trigger type. Isolated
    /// to the one alert, the rest of the batch continues.
    #[error("No alert template for trigger type '{trigger_type}'")]
    Formatting { trigger_type: String },
}

impl From<FetchChainError> for MonitorError {
    fn from(error: FetchChainError) -> Self {
        match error {
            FetchChainError::InvalidTicker(ticker) => Self::InvalidTicker(ticker),
            FetchChainError::NoCacheAvailable(ticker) => Self::NoCacheAvailable(ticker),
            FetchChainError::Store(e) => Self::Store(e),
        }
    }
}
