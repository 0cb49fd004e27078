//! Provider trait definition for metric sources.

use async_trait::async_trait;

use crate::errors::FetchError;
use crate::models::{AssetType, RawMetrics, SourceTier};

use super::capabilities::{ProviderCapabilities, RateLimitSpec};

/// Trait for financial metric providers.
///
/// Implement this to add a new data source to the fallback chain. The
/// provider performs the network call and normalizes field names; rate
/// limiting, circuit breaking and validation are the caller's job.
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    /// Unique identifier, a constant like "YAHOO" or "FINNHUB".
    /// Used for logging, rate limiting and circuit tracking.
    fn id(&self) -> &'static str;

    /// Where this provider sits in the fallback chain.
    fn tier(&self) -> SourceTier;

    /// What this provider can supply.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Rate limit the caller must respect for this provider.
    fn rate_limit(&self) -> RateLimitSpec;

    /// Fetch the latest raw metrics for a ticker.
    ///
    /// `asset_type` is the best current classification; providers that
    /// gate fundamentals on it may skip those calls for ETFs. No retry
    /// or backoff inside - a failed call returns the typed error and
    /// the chain decides what happens next.
    async fn fetch_metrics(
        &self,
        ticker: &str,
        asset_type: AssetType,
    ) -> Result<RawMetrics, FetchError>;
}
