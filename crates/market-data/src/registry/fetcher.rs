//! Fallback fetcher: the acquisition chain for one ticker.
//!
//! Tries sources in fixed priority order (Primary, Fallback,
//! PaidFallback), applying the rate limiter, circuit breaker, a
//! bounded per-call timeout and response validation, and writes the
//! winning record to the store. When every live tier fails it degrades
//! to the cached record rather than failing the ticker, as long as a
//! prior record exists.
//!
//! The chain policy is data: an ordered list of providers, so tests
//! substitute fake tiers freely.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};
use thiserror::Error;

use crate::errors::{ChainDisposition, FetchError};
use crate::models::{AssetType, RecordStore, StoreError, TickerRecord, UpsertOutcome};
use crate::provider::MetricsProvider;

use super::rate_limiter::RateLimiter;
use super::validator::MetricsValidator;
use super::CircuitBreaker;

/// Fetcher tuning.
#[derive(Clone, Debug)]
pub struct FetcherConfig {
    /// Deadline per provider call. Expiry becomes a `Timeout` failure
    /// and the chain advances.
    pub request_timeout: Duration,
    /// Record age beyond which cached data is reported stale.
    pub staleness_threshold: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            staleness_threshold: Duration::from_secs(24 * 3600),
        }
    }
}

/// What the chain produced for a ticker.
#[derive(Clone, Debug)]
pub enum FetchOutcome {
    /// A live tier answered this cycle.
    Fresh(TickerRecord),
    /// Every live tier failed; this is the prior record re-served with
    /// `source = Cache`. The caller owes the user a stale-data alert.
    CacheDegraded(TickerRecord),
}

impl FetchOutcome {
    pub fn record(&self) -> &TickerRecord {
        match self {
            Self::Fresh(record) | Self::CacheDegraded(record) => record,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::CacheDegraded(_))
    }
}

/// Terminal failures of the whole chain for one ticker.
#[derive(Error, Debug)]
pub enum FetchChainError {
    /// The primary source says the ticker does not exist. This is a
    /// configuration problem; no further tiers are tried.
    #[error("Invalid ticker: {0}")]
    InvalidTicker(String),

    /// Every tier failed and there is no cached record to fall back on.
    #[error("No live source succeeded and no cached record exists for {0}")]
    NoCacheAvailable(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Orchestrates the source tiers for per-ticker fetches.
pub struct FallbackFetcher {
    tiers: Vec<Arc<dyn MetricsProvider>>,
    rate_limiter: RateLimiter,
    circuit_breaker: CircuitBreaker,
    validator: MetricsValidator,
    store: Arc<dyn RecordStore>,
    config: FetcherConfig,
    /// Tiers knocked out by a credential failure. Process-lifetime.
    disabled: Mutex<HashSet<&'static str>>,
}

impl FallbackFetcher {
    /// Build a fetcher over the given tiers, ordered by tier rank.
    pub fn new(tiers: Vec<Arc<dyn MetricsProvider>>, store: Arc<dyn RecordStore>) -> Self {
        Self::with_config(tiers, store, FetcherConfig::default())
    }

    pub fn with_config(
        mut tiers: Vec<Arc<dyn MetricsProvider>>,
        store: Arc<dyn RecordStore>,
        config: FetcherConfig,
    ) -> Self {
        tiers.sort_by_key(|p| p.tier().rank());

        let rate_limiter = RateLimiter::new();
        for provider in &tiers {
            rate_limiter.configure(provider.id(), provider.rate_limit());
        }

        Self {
            tiers,
            rate_limiter,
            circuit_breaker: CircuitBreaker::new(),
            validator: MetricsValidator::new(),
            store,
            config,
            disabled: Mutex::new(HashSet::new()),
        }
    }

    /// The configured staleness bound, shared with rule evaluation.
    pub fn staleness_threshold(&self) -> Duration {
        self.config.staleness_threshold
    }

    fn lock_disabled(&self) -> MutexGuard<'_, HashSet<&'static str>> {
        self.disabled.lock().unwrap_or_else(|poisoned| {
            warn!("Disabled-tier mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Produce the freshest trustworthy record for a ticker.
    ///
    /// Tier walk per cycle: each tier is tried at most once; transient
    /// failures advance the chain, `NotFound` aborts it, credential
    /// failures disable the tier for the rest of the process.
    pub async fn fetch(&self, ticker: &str) -> Result<FetchOutcome, FetchChainError> {
        let prior = self.store.get(ticker).await?;
        let type_hint = prior
            .as_ref()
            .map(|r| r.asset_type)
            .unwrap_or(AssetType::Unknown);

        for provider in &self.tiers {
            let id = provider.id();

            if self.lock_disabled().contains(id) {
                debug!("Tier '{}' disabled by credential failure, skipping", id);
                continue;
            }

            if !self.circuit_breaker.is_allowed(id) {
                debug!("Circuit open for '{}', skipping tier", id);
                continue;
            }

            self.rate_limiter.acquire(id).await;

            let result = match tokio::time::timeout(
                self.config.request_timeout,
                provider.fetch_metrics(ticker, type_hint),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout {
                    provider: id.to_string(),
                }),
            };

            match result {
                Ok(raw) => {
                    self.circuit_breaker.record_success(id);

                    let asset_type = raw.reported_asset_type().unwrap_or(type_hint);

                    match self.validator.validate(ticker, asset_type, &raw) {
                        Ok(validated) => {
                            if !validated.missing_fields.is_empty() {
                                debug!(
                                    "'{}' accepted from '{}' with missing fields: {:?}",
                                    ticker, id, validated.missing_fields
                                );
                            }

                            let record = TickerRecord {
                                ticker: ticker.to_string(),
                                asset_type,
                                metrics: validated.metrics,
                                source: provider.tier(),
                                fetched_at: Utc::now(),
                                missing_fields: validated.missing_fields,
                            };

                            let winner = self.write_record(record).await?;
                            info!(
                                "Fetched '{}' from '{}' ({})",
                                ticker,
                                id,
                                winner.source
                            );
                            return Ok(FetchOutcome::Fresh(winner));
                        }
                        Err(failure) => {
                            warn!(
                                "Rejected response from '{}' for '{}': {}",
                                id, ticker, failure
                            );
                            continue;
                        }
                    }
                }
                Err(e) => {
                    if e.counts_against_circuit() {
                        self.circuit_breaker.record_failure(id);
                    }

                    match e.disposition() {
                        ChainDisposition::Abort => {
                            warn!("'{}' reported unknown by '{}': {}", ticker, id, e);
                            return Err(FetchChainError::InvalidTicker(ticker.to_string()));
                        }
                        ChainDisposition::TierDisabled => {
                            warn!("Disabling tier '{}': {}", id, e);
                            self.lock_disabled().insert(id);
                        }
                        ChainDisposition::NextTier => {
                            info!("Tier '{}' failed for '{}': {}, advancing", id, ticker, e);
                        }
                    }
                }
            }
        }

        // Every live tier is out; serve the cache if we have one
        match prior {
            Some(record) => {
                warn!(
                    "All live tiers failed for '{}', serving cached record from {}",
                    ticker, record.fetched_at
                );
                Ok(FetchOutcome::CacheDegraded(record.as_cached()))
            }
            None => Err(FetchChainError::NoCacheAvailable(ticker.to_string())),
        }
    }

    /// Write a record, honoring last-write-wins by `fetched_at`.
    /// Returns whichever record actually ended up stored.
    async fn write_record(&self, record: TickerRecord) -> Result<TickerRecord, FetchChainError> {
        let ticker = record.ticker.clone();
        match self.store.upsert(record.clone()).await? {
            UpsertOutcome::Inserted | UpsertOutcome::Replaced => Ok(record),
            UpsertOutcome::StaleWriteIgnored => {
                debug!("Slow fetch for '{}' lost to a newer record", ticker);
                Ok(self.store.get(&ticker).await?.unwrap_or(record))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{metric, RawMetrics, SourceTier};
    use crate::provider::{ProviderCapabilities, RateLimitSpec};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::RwLock;

    /// Scripted provider: returns the same result on every call.
    struct MockProvider {
        id: &'static str,
        tier: SourceTier,
        calls: AtomicUsize,
        script: Script,
    }

    enum Script {
        Metrics,
        Empty,
        Fail(fn(&'static str) -> FetchError),
    }

    impl MockProvider {
        fn ok(id: &'static str, tier: SourceTier) -> Self {
            Self {
                id,
                tier,
                calls: AtomicUsize::new(0),
                script: Script::Metrics,
            }
        }

        fn empty(id: &'static str, tier: SourceTier) -> Self {
            Self {
                id,
                tier,
                calls: AtomicUsize::new(0),
                script: Script::Empty,
            }
        }

        fn failing(
            id: &'static str,
            tier: SourceTier,
            make: fn(&'static str) -> FetchError,
        ) -> Self {
            Self {
                id,
                tier,
                calls: AtomicUsize::new(0),
                script: Script::Fail(make),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MetricsProvider for MockProvider {
        fn id(&self) -> &'static str {
            self.id
        }

        fn tier(&self) -> SourceTier {
            self.tier
        }

        fn capabilities(&self) -> ProviderCapabilities {
            ProviderCapabilities {
                supports_fundamentals: true,
                reports_asset_type: true,
            }
        }

        fn rate_limit(&self) -> RateLimitSpec {
            RateLimitSpec {
                max_calls_per_window: 1000,
                window: Duration::from_millis(1),
            }
        }

        async fn fetch_metrics(
            &self,
            ticker: &str,
            _asset_type: AssetType,
        ) -> Result<RawMetrics, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            match &self.script {
                Script::Metrics => {
                    let mut raw = RawMetrics::new();
                    raw.insert(metric::CURRENT_PRICE, dec!(102));
                    raw.insert(metric::PREVIOUS_CLOSE, dec!(100));
                    raw.insert(metric::VOLUME, dec!(1000));
                    raw.etf_flag = Some(false);
                    let _ = ticker;
                    Ok(raw)
                }
                Script::Empty => Ok(RawMetrics::new()),
                Script::Fail(make) => Err(make(self.id)),
            }
        }
    }

    fn timeout_error(provider: &'static str) -> FetchError {
        FetchError::Timeout {
            provider: provider.to_string(),
        }
    }

    fn unauthorized_error(provider: &'static str) -> FetchError {
        FetchError::Unauthorized {
            provider: provider.to_string(),
        }
    }

    fn not_found_error(_provider: &'static str) -> FetchError {
        FetchError::NotFound("XYZ".to_string())
    }

    /// Minimal in-memory store for chain tests.
    #[derive(Default)]
    struct MemStore {
        records: RwLock<HashMap<String, TickerRecord>>,
    }

    #[async_trait]
    impl RecordStore for MemStore {
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

    async fn seeded_store(ticker: &str, age_hours: i64) -> Arc<MemStore> {
        let store = Arc::new(MemStore::default());
        let mut metrics = HashMap::new();
        metrics.insert(metric::CURRENT_PRICE.to_string(), dec!(95));
        let record = TickerRecord {
            ticker: ticker.to_string(),
            asset_type: AssetType::Stock,
            metrics,
            source: SourceTier::Primary,
            fetched_at: Utc::now() - chrono::Duration::hours(age_hours),
            missing_fields: Vec::new(),
        };
        store.upsert(record).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_primary_success_short_circuits() {
        let primary = Arc::new(MockProvider::ok("PRIMARY", SourceTier::Primary));
        let fallback = Arc::new(MockProvider::ok("FALLBACK", SourceTier::Fallback));
        let store = Arc::new(MemStore::default());

        let fetcher = FallbackFetcher::new(
            vec![primary.clone(), fallback.clone()],
            store.clone(),
        );

        let outcome = fetcher.fetch("AAPL").await.unwrap();
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.record().source, SourceTier::Primary);
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 0);

        // The write landed
        assert!(store.get("AAPL").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_timeout_advances_to_fallback_and_stops_there() {
        let primary = Arc::new(MockProvider::failing(
            "PRIMARY",
            SourceTier::Primary,
            timeout_error,
        ));
        let fallback = Arc::new(MockProvider::ok("FALLBACK", SourceTier::Fallback));
        let paid = Arc::new(MockProvider::ok("PAID", SourceTier::PaidFallback));

        let fetcher = FallbackFetcher::new(
            vec![paid.clone(), primary.clone(), fallback.clone()],
            Arc::new(MemStore::default()),
        );

        let outcome = fetcher.fetch("AAPL").await.unwrap();
        assert_eq!(outcome.record().source, SourceTier::Fallback);
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 1);
        // Priority ordering held even though PAID was listed first
        assert_eq!(paid.calls(), 0);
    }

    #[tokio::test]
    async fn test_not_found_aborts_without_fallback() {
        let primary = Arc::new(MockProvider::failing(
            "PRIMARY",
            SourceTier::Primary,
            not_found_error,
        ));
        let fallback = Arc::new(MockProvider::ok("FALLBACK", SourceTier::Fallback));

        let fetcher = FallbackFetcher::new(
            vec![primary.clone(), fallback.clone()],
            Arc::new(MemStore::default()),
        );

        let result = fetcher.fetch("XYZ").await;
        assert!(matches!(result, Err(FetchChainError::InvalidTicker(t)) if t == "XYZ"));
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_response_advances_tier() {
        let primary = Arc::new(MockProvider::empty("PRIMARY", SourceTier::Primary));
        let fallback = Arc::new(MockProvider::ok("FALLBACK", SourceTier::Fallback));

        let fetcher = FallbackFetcher::new(
            vec![primary.clone(), fallback.clone()],
            Arc::new(MemStore::default()),
        );

        let outcome = fetcher.fetch("AAPL").await.unwrap();
        assert_eq!(outcome.record().source, SourceTier::Fallback);
        assert_eq!(primary.calls(), 1);
    }

    #[tokio::test]
    async fn test_total_failure_serves_cache() {
        let primary = Arc::new(MockProvider::failing(
            "PRIMARY",
            SourceTier::Primary,
            timeout_error,
        ));
        let store = seeded_store("AAPL", 30).await;

        let fetcher = FallbackFetcher::new(vec![primary], store);

        let outcome = fetcher.fetch("AAPL").await.unwrap();
        assert!(outcome.is_degraded());
        assert_eq!(outcome.record().source, SourceTier::Cache);
        assert!(outcome.record().is_stale(
            Utc::now(),
            Duration::from_secs(24 * 3600)
        ));
    }

    #[tokio::test]
    async fn test_total_failure_without_cache_errors() {
        let primary = Arc::new(MockProvider::failing(
            "PRIMARY",
            SourceTier::Primary,
            timeout_error,
        ));

        let fetcher = FallbackFetcher::new(vec![primary], Arc::new(MemStore::default()));

        let result = fetcher.fetch("AAPL").await;
        assert!(matches!(
            result,
            Err(FetchChainError::NoCacheAvailable(t)) if t == "AAPL"
        ));
    }

    #[tokio::test]
    async fn test_unauthorized_disables_tier_across_fetches() {
        let primary = Arc::new(MockProvider::failing(
            "PRIMARY",
            SourceTier::Primary,
            unauthorized_error,
        ));
        let fallback = Arc::new(MockProvider::ok("FALLBACK", SourceTier::Fallback));

        let fetcher = FallbackFetcher::new(
            vec![primary.clone(), fallback.clone()],
            Arc::new(MemStore::default()),
        );

        fetcher.fetch("AAPL").await.unwrap();
        fetcher.fetch("MSFT").await.unwrap();

        // The bad credential was only probed once
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 2);
    }

    #[tokio::test]
    async fn test_stale_write_loses_to_newer_record() {
        // Prior record is dated in the future relative to the fetch,
        // standing in for a faster concurrent fetch that already landed
        let store = seeded_store("AAPL", -1).await;
        let primary = Arc::new(MockProvider::ok("PRIMARY", SourceTier::Primary));

        let fetcher = FallbackFetcher::new(vec![primary], store.clone());

        let outcome = fetcher.fetch("AAPL").await.unwrap();
        // The chain reports the record that actually won the store
        assert_eq!(outcome.record().metric(metric::CURRENT_PRICE), Some(dec!(95)));

        let stored = store.get("AAPL").await.unwrap().unwrap();
        assert_eq!(stored.metric(metric::CURRENT_PRICE), Some(dec!(95)));
    }
}
