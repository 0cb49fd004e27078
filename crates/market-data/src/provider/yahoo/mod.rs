//! Yahoo Finance metric provider implementation.
//!
//! Primary tier. Uses the keyless v8 chart endpoint, which carries the
//! latest price, the previous session close, session volume, and the
//! instrument type Yahoo classified the symbol as. Yahoo is the only
//! tier that needs no credential, so it is always present in the chain.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::errors::FetchError;
use crate::models::{metric, AssetType, RawMetrics, SourceTier};
use crate::provider::{MetricsProvider, ProviderCapabilities, RateLimitSpec};

const BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const PROVIDER_ID: &str = "YAHOO";

// ============================================================================
// API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
}

/// Chart metadata. Only the fields we consume; Yahoo returns many more.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    /// "EQUITY", "ETF", "MUTUALFUND", ...
    instrument_type: Option<String>,
    regular_market_price: Option<f64>,
    /// Previous close as the chart baselines it.
    chart_previous_close: Option<f64>,
    /// Explicit previous close, present on most equity responses.
    previous_close: Option<f64>,
    regular_market_volume: Option<f64>,
}

// ============================================================================
// YahooProvider
// ============================================================================

/// Yahoo Finance metric provider.
///
/// Price and volume only - Yahoo's keyless surface does not expose
/// fundamentals, those come from lower tiers.
pub struct YahooProvider {
    client: Client,
}

impl YahooProvider {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (compatible; folioalert/0.3)")
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client }
    }

    async fn fetch_chart(&self, ticker: &str) -> Result<ChartMeta, FetchError> {
        let url = format!("{}/{}", BASE_URL, ticker);

        debug!("Yahoo request for '{}'", ticker);

        let response = self
            .client
            .get(&url)
            .query(&[("interval", "1d"), ("range", "5d")])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout {
                        provider: PROVIDER_ID.to_string(),
                    }
                } else {
                    FetchError::Network(e)
                }
            })?;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(ticker.to_string()));
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }

        // Yahoo answers 403 when it wants cookie/crumb negotiation,
        // which behaves like a throttle from our side
        if status == reqwest::StatusCode::FORBIDDEN {
            return Err(FetchError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }

        if !status.is_success() {
            return Err(FetchError::MalformedResponse {
                provider: PROVIDER_ID.to_string(),
                message: format!("HTTP {}", status),
            });
        }

        let envelope: ChartEnvelope =
            response
                .json()
                .await
                .map_err(|e| FetchError::MalformedResponse {
                    provider: PROVIDER_ID.to_string(),
                    message: format!("Failed to parse chart response: {}", e),
                })?;

        if let Some(error) = envelope.chart.error {
            let code = error.code.unwrap_or_default();
            if code.eq_ignore_ascii_case("not found") {
                return Err(FetchError::NotFound(ticker.to_string()));
            }
            return Err(FetchError::MalformedResponse {
                provider: PROVIDER_ID.to_string(),
                message: format!(
                    "Chart error {}: {}",
                    code,
                    error.description.unwrap_or_default()
                ),
            });
        }

        envelope
            .chart
            .result
            .and_then(|mut results| {
                if results.is_empty() {
                    None
                } else {
                    Some(results.remove(0).meta)
                }
            })
            .ok_or_else(|| FetchError::NotFound(ticker.to_string()))
    }
}

impl Default for YahooProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricsProvider for YahooProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn tier(&self) -> SourceTier {
        SourceTier::Primary
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_fundamentals: false,
            reports_asset_type: true,
        }
    }

    fn rate_limit(&self) -> RateLimitSpec {
        RateLimitSpec {
            max_calls_per_window: 60,
            window: Duration::from_secs(60),
        }
    }

    async fn fetch_metrics(
        &self,
        ticker: &str,
        _asset_type: AssetType,
    ) -> Result<RawMetrics, FetchError> {
        let meta = self.fetch_chart(ticker).await?;

        let mut raw = RawMetrics::new();

        if let Some(price) = meta.regular_market_price.and_then(decimal_from_f64) {
            raw.insert(metric::CURRENT_PRICE, price);
        }
        if let Some(prev) = meta
            .previous_close
            .or(meta.chart_previous_close)
            .and_then(decimal_from_f64)
        {
            raw.insert(metric::PREVIOUS_CLOSE, prev);
        }
        if let Some(volume) = meta.regular_market_volume.and_then(decimal_from_f64) {
            raw.insert(metric::VOLUME, volume);
        }

        raw.etf_flag = meta
            .instrument_type
            .as_deref()
            .map(|t| t.eq_ignore_ascii_case("ETF") || t.eq_ignore_ascii_case("MUTUALFUND"));

        Ok(raw)
    }
}

fn decimal_from_f64(value: f64) -> Option<Decimal> {
    if value.is_finite() {
        Decimal::try_from(value).ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chart_meta() {
        let body = r#"{
            "chart": {
                "result": [{
                    "meta": {
                        "currency": "USD",
                        "symbol": "QQQ",
                        "instrumentType": "ETF",
                        "regularMarketPrice": 400.12,
                        "chartPreviousClose": 395.0,
                        "regularMarketVolume": 41250000
                    }
                }],
                "error": null
            }
        }"#;

        let envelope: ChartEnvelope = serde_json::from_str(body).unwrap();
        let meta = &envelope.chart.result.as_ref().unwrap()[0].meta;
        assert_eq!(meta.instrument_type.as_deref(), Some("ETF"));
        assert_eq!(meta.regular_market_price, Some(400.12));
        assert_eq!(meta.chart_previous_close, Some(395.0));
    }

    #[test]
    fn test_parse_chart_error() {
        let body = r#"{
            "chart": {
                "result": null,
                "error": {"code": "Not Found", "description": "No data found"}
            }
        }"#;

        let envelope: ChartEnvelope = serde_json::from_str(body).unwrap();
        let error = envelope.chart.error.unwrap();
        assert_eq!(error.code.as_deref(), Some("Not Found"));
    }

    #[test]
    fn test_decimal_from_f64_rejects_non_finite() {
        assert!(decimal_from_f64(f64::NAN).is_none());
        assert!(decimal_from_f64(f64::INFINITY).is_none());
        assert!(decimal_from_f64(42.5).is_some());
    }
}
