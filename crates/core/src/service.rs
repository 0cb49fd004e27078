//! Monitoring cycle runner.
//!
//! One cycle walks the portfolio with bounded concurrency: fetch,
//! classify, evaluate rules, then format and deliver one ordered alert
//! batch for the whole portfolio. Per-ticker failures are collected,
//! never propagated; a cycle always runs to completion.

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use log::{info, warn};

use folioalert_market_data::FallbackFetcher;

use crate::alerts::{Alert, AlertEngine, AlertPolicy, Notifier};
use crate::classifier::AssetClassifier;
use crate::config::{screen_thresholds, MonitorConfig, ThresholdConfig};
use crate::errors::MonitorError;
use crate::rules::{self, event, TriggerEvent};

/// What one cycle produced.
#[derive(Debug)]
pub struct CycleReport {
    /// The full alert batch, in delivery order.
    pub alerts: Vec<Alert>,
    /// Successful alert deliveries across all channels.
    pub delivered: usize,
    /// Tickers that produced no record this cycle, with the reason.
    pub failures: Vec<(String, String)>,
    /// Tickers served from cache because every live tier failed.
    pub degraded: Vec<String>,
}

pub struct MonitorService {
    fetcher: Arc<FallbackFetcher>,
    notifier: Arc<dyn Notifier>,
    classifier: AssetClassifier,
    engine: AlertEngine,
    portfolio: Vec<String>,
    thresholds: Vec<ThresholdConfig>,
    config: MonitorConfig,
}

struct TickerOutcome {
    events: Vec<TriggerEvent>,
    degraded: bool,
}

impl MonitorService {
    pub fn new(
        fetcher: Arc<FallbackFetcher>,
        notifier: Arc<dyn Notifier>,
        portfolio: Vec<String>,
        thresholds: Vec<ThresholdConfig>,
        config: MonitorConfig,
    ) -> Self {
        Self::with_policy(
            fetcher,
            notifier,
            portfolio,
            thresholds,
            config,
            AlertPolicy::default(),
        )
    }

    pub fn with_policy(
        fetcher: Arc<FallbackFetcher>,
        notifier: Arc<dyn Notifier>,
        portfolio: Vec<String>,
        thresholds: Vec<ThresholdConfig>,
        config: MonitorConfig,
        policy: AlertPolicy,
    ) -> Self {
        let thresholds = screen_thresholds(&portfolio, thresholds);
        let classifier = AssetClassifier::new(config.etf_symbols.clone());

        Self {
            fetcher,
            notifier,
            classifier,
            engine: AlertEngine::new(policy),
            portfolio,
            thresholds,
            config,
        }
    }

    /// Run one full monitoring cycle over the portfolio.
    pub async fn run_cycle(&self) -> CycleReport {
        let results: Vec<(String, Result<TickerOutcome, MonitorError>)> =
            stream::iter(self.portfolio.clone())
                .map(|ticker| async move {
                    let outcome = self.process_ticker(&ticker).await;
                    (ticker, outcome)
                })
                .buffer_unordered(self.config.max_concurrency.max(1))
                .collect()
                .await;

        let mut events = Vec::new();
        let mut failures = Vec::new();
        let mut degraded = Vec::new();

        for (ticker, result) in results {
            match result {
                Ok(outcome) => {
                    if outcome.degraded {
                        degraded.push(ticker);
                    }
                    events.extend(outcome.events);
                }
                Err(e) => {
                    warn!("Cycle skipped '{}': {}", ticker, e);
                    failures.push((ticker, e.to_string()));
                }
            }
        }

        // Completion order is nondeterministic; fix it before reporting
        failures.sort();
        degraded.sort();
        events.sort_by(|a, b| {
            a.ticker
                .cmp(&b.ticker)
                .then_with(|| a.trigger_type.cmp(&b.trigger_type))
        });

        let alerts = self.engine.process(events);
        let delivered = self
            .engine
            .dispatch(&alerts, self.notifier.as_ref(), &self.config.channels)
            .await;

        info!(
            "Cycle complete: {} tickers, {} alerts, {} delivered, {} failed, {} degraded",
            self.portfolio.len(),
            alerts.len(),
            delivered,
            failures.len(),
            degraded.len()
        );

        CycleReport {
            alerts,
            delivered,
            failures,
            degraded,
        }
    }

    async fn process_ticker(&self, ticker: &str) -> Result<TickerOutcome, MonitorError> {
        let outcome = self.fetcher.fetch(ticker).await?;
        let record = outcome.record();
        let asset_type = self.classifier.classify(record);
        let now = Utc::now();

        let mut events = rules::evaluate(
            record,
            asset_type,
            &self.thresholds,
            now,
            self.config.staleness_threshold,
        );

        // Cache degradation owes the user a staleness signal even when
        // the cached record is younger than the freshness bound
        if outcome.is_degraded()
            && !events.iter().any(|e| e.trigger_type == event::DATA_STALE)
        {
            events.push(rules::stale_event(
                record,
                now,
                self.config.staleness_threshold,
            ));
        }

        Ok(TickerOutcome {
            events,
            degraded: outcome.is_degraded(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{AlertLevel, Channel, NotifyError};
    use crate::config::Direction;
    use crate::rules::trigger;
    use crate::store::MemoryRecordStore;
    use async_trait::async_trait;
    use folioalert_market_data::{
        metric, AssetType, FetchError, MetricsProvider, ProviderCapabilities, RateLimitSpec,
        RawMetrics, RecordStore, SourceTier, TickerRecord,
    };
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Provider with a fixed response per ticker; unknown tickers get
    /// `NotFound`, and `fail_all` turns every call into a timeout.
    struct TableProvider {
        table: HashMap<String, Vec<(&'static str, Decimal)>>,
        etf_flags: HashMap<String, bool>,
        fail_all: bool,
    }

    impl TableProvider {
        fn new() -> Self {
            Self {
                table: HashMap::new(),
                etf_flags: HashMap::new(),
                fail_all: false,
            }
        }

        fn with(mut self, ticker: &str, etf: bool, fields: &[(&'static str, Decimal)]) -> Self {
            self.table.insert(ticker.to_string(), fields.to_vec());
            self.etf_flags.insert(ticker.to_string(), etf);
            self
        }

        fn failing() -> Self {
            Self {
                table: HashMap::new(),
                etf_flags: HashMap::new(),
                fail_all: true,
            }
        }
    }

    #[async_trait]
    impl MetricsProvider for TableProvider {
        fn id(&self) -> &'static str {
            "TABLE"
        }

        fn tier(&self) -> SourceTier {
            SourceTier::Primary
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
            if self.fail_all {
                return Err(FetchError::Timeout {
                    provider: "TABLE".to_string(),
                });
            }
            let fields = self
                .table
                .get(ticker)
                .ok_or_else(|| FetchError::NotFound(ticker.to_string()))?;

            let mut raw = RawMetrics::new();
            for (name, value) in fields {
                raw.insert(name, *value);
            }
            raw.etf_flag = self.etf_flags.get(ticker).copied();
            Ok(raw)
        }
    }

    struct CollectingNotifier {
        delivered: Mutex<Vec<(String, String, Channel)>>,
    }

    impl CollectingNotifier {
        fn new() -> Self {
            Self {
                delivered: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Notifier for CollectingNotifier {
        async fn deliver(&self, alert: &Alert, channel: Channel) -> Result<(), NotifyError> {
            self.delivered.lock().unwrap().push((
                alert.ticker.clone(),
                alert.trigger_type.clone(),
                channel,
            ));
            Ok(())
        }
    }

    fn threshold(
        ticker: &str,
        trigger_type: &str,
        value: Decimal,
        direction: Direction,
    ) -> ThresholdConfig {
        ThresholdConfig {
            ticker: ticker.to_string(),
            trigger_type: trigger_type.to_string(),
            comparison_value: value,
            direction,
        }
    }

    fn service(
        provider: TableProvider,
        store: Arc<MemoryRecordStore>,
        notifier: Arc<CollectingNotifier>,
        portfolio: &[&str],
        thresholds: Vec<ThresholdConfig>,
    ) -> MonitorService {
        let fetcher = Arc::new(FallbackFetcher::new(vec![Arc::new(provider)], store));
        MonitorService::new(
            fetcher,
            notifier,
            portfolio.iter().map(|t| t.to_string()).collect(),
            thresholds,
            MonitorConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_cycle_produces_and_delivers_alerts() {
        let provider = TableProvider::new()
            .with(
                "NVDA",
                false,
                &[
                    (metric::CURRENT_PRICE, dec!(500)),
                    (metric::PREVIOUS_CLOSE, dec!(498)),
                    (metric::GROSS_MARGIN, dec!(0.68)),
                    (metric::REVENUE_GROWTH, dec!(0.40)),
                ],
            )
            .with(
                "QQQ",
                true,
                &[
                    (metric::CURRENT_PRICE, dec!(85)),
                    (metric::PREVIOUS_CLOSE, dec!(100)),
                    (metric::VOLUME, dec!(1000000)),
                ],
            );
        let notifier = Arc::new(CollectingNotifier::new());
        let service = service(
            provider,
            Arc::new(MemoryRecordStore::new()),
            notifier.clone(),
            &["NVDA", "QQQ"],
            vec![
                threshold("NVDA", trigger::GROSS_MARGIN_FLOOR, dec!(0.70), Direction::Below),
                threshold("QQQ", trigger::PRICE_CHANGE_ALERT, dec!(15), Direction::AbsoluteChange),
            ],
        );

        let report = service.run_cycle().await;

        assert!(report.failures.is_empty());
        assert!(report.degraded.is_empty());
        assert_eq!(report.alerts.len(), 2);

        // -15% sits further from its threshold than the margin breach
        assert_eq!(report.alerts[0].ticker, "QQQ");
        assert_eq!(report.alerts[0].level, AlertLevel::Daily);
        assert_eq!(report.alerts[1].ticker, "NVDA");

        assert_eq!(report.delivered, 2);
        assert_eq!(notifier.delivered.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_ticker_does_not_abort_cycle() {
        let provider = TableProvider::new().with(
            "AAPL",
            false,
            &[
                (metric::CURRENT_PRICE, dec!(200)),
                (metric::PREVIOUS_CLOSE, dec!(201)),
            ],
        );
        let notifier = Arc::new(CollectingNotifier::new());
        let service = service(
            provider,
            Arc::new(MemoryRecordStore::new()),
            notifier,
            &["AAPL", "ZZZZ"],
            Vec::new(),
        );

        let report = service.run_cycle().await;

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "ZZZZ");
        assert!(report.failures[0].1.contains("Invalid ticker"));
        assert!(report.alerts.is_empty());
    }

    #[tokio::test]
    async fn test_cache_degradation_emits_data_stale() {
        let store = Arc::new(MemoryRecordStore::new());
        let mut metrics = HashMap::new();
        metrics.insert(metric::CURRENT_PRICE.to_string(), dec!(95));
        store
            .upsert(TickerRecord {
                ticker: "AAPL".to_string(),
                asset_type: AssetType::Stock,
                metrics,
                source: SourceTier::Primary,
                fetched_at: Utc::now() - chrono::Duration::hours(2),
                missing_fields: Vec::new(),
            })
            .await
            .unwrap();

        let notifier = Arc::new(CollectingNotifier::new());
        let service = service(
            TableProvider::failing(),
            store,
            notifier,
            &["AAPL"],
            Vec::new(),
        );

        let report = service.run_cycle().await;

        assert_eq!(report.degraded, vec!["AAPL".to_string()]);
        assert_eq!(report.alerts.len(), 1);
        assert_eq!(report.alerts[0].trigger_type, "data_stale");
        assert_eq!(report.alerts[0].level, AlertLevel::Weekly);
    }

    #[tokio::test]
    async fn test_etf_override_switches_rule_set() {
        // Provider reports QQQ as a stock; the operator override makes
        // the volume rule apply anyway
        let provider = TableProvider::new().with(
            "QQQ",
            false,
            &[
                (metric::CURRENT_PRICE, dec!(100)),
                (metric::PREVIOUS_CLOSE, dec!(100)),
                (metric::VOLUME, dec!(9000000)),
                (metric::AVG_VOLUME, dec!(3000000)),
            ],
        );
        let notifier = Arc::new(CollectingNotifier::new());
        let fetcher = Arc::new(FallbackFetcher::new(
            vec![Arc::new(provider)],
            Arc::new(MemoryRecordStore::new()),
        ));
        let mut config = MonitorConfig::default();
        config.etf_symbols.insert("QQQ".to_string());

        let service = MonitorService::new(
            fetcher,
            notifier,
            vec!["QQQ".to_string()],
            vec![threshold(
                "QQQ",
                trigger::VOLUME_SPIKE_THRESHOLD,
                dec!(2),
                Direction::Above,
            )],
            config,
        );

        let report = service.run_cycle().await;

        assert_eq!(report.alerts.len(), 1);
        assert_eq!(report.alerts[0].trigger_type, "volume_spike");
    }
}
