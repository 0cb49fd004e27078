//! Finnhub metric provider implementation.
//!
//! Paid fallback tier. Uses /quote for price data and /stock/metric
//! for fundamentals. Only enabled when a key is configured; the tier
//! silently drops out of the chain otherwise.
//!
//! API documentation: https://finnhub.io/docs/api

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::errors::FetchError;
use crate::models::{metric, AssetType, RawMetrics, SourceTier};
use crate::provider::{MetricsProvider, ProviderCapabilities, RateLimitSpec};

const BASE_URL: &str = "https://finnhub.io/api/v1";
const PROVIDER_ID: &str = "FINNHUB";

/// Finnhub reports average volume in millions of shares.
const MILLION: i64 = 1_000_000;

// ============================================================================
// API Response Structures
// ============================================================================

/// Response from /quote endpoint
#[derive(Debug, Deserialize)]
struct QuoteResponse {
    /// Current price
    c: Option<f64>,
    /// Previous close
    pc: Option<f64>,
}

/// Response from /stock/metric endpoint
#[derive(Debug, Deserialize)]
struct MetricResponse {
    metric: Option<MetricBody>,
}

/// The subset of Finnhub's metric block we consume.
#[derive(Debug, Deserialize)]
struct MetricBody {
    /// Gross margin, trailing twelve months, as a percentage.
    #[serde(rename = "grossMarginTTM")]
    gross_margin_ttm: Option<f64>,
    /// Revenue growth year over year, as a percentage.
    #[serde(rename = "revenueGrowthTTMYoy")]
    revenue_growth_ttm_yoy: Option<f64>,
    /// Ten-day average volume, in millions of shares.
    #[serde(rename = "10DayAverageTradingVolume")]
    avg_volume_10d: Option<f64>,
}

/// Error response body
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<String>,
}

// ============================================================================
// FinnhubProvider
// ============================================================================

/// Finnhub metric provider.
///
/// Paid plans lift the 60-calls-per-minute free limit, but the chain
/// keeps the conservative spacing either way.
pub struct FinnhubProvider {
    client: Client,
    api_key: String,
}

impl FinnhubProvider {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, api_key }
    }

    /// Make a GET request to the Finnhub API.
    async fn fetch(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<String, FetchError> {
        let url = format!("{}{}", BASE_URL, endpoint);

        let mut request = self
            .client
            .get(&url)
            .header("X-Finnhub-Token", &self.api_key);

        for (key, value) in params {
            request = request.query(&[(key, value)]);
        }

        debug!("Finnhub request: {} with {} params", endpoint, params.len());

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    provider: PROVIDER_ID.to_string(),
                }
            } else {
                FetchError::Network(e)
            }
        })?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(FetchError::Unauthorized {
                provider: PROVIDER_ID.to_string(),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            if let Ok(error_resp) = serde_json::from_str::<ErrorResponse>(&body) {
                if let Some(error_msg) = error_resp.error {
                    return Err(FetchError::MalformedResponse {
                        provider: PROVIDER_ID.to_string(),
                        message: error_msg,
                    });
                }
            }

            return Err(FetchError::MalformedResponse {
                provider: PROVIDER_ID.to_string(),
                message: format!("HTTP {} - {}", status, body),
            });
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::MalformedResponse {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to read response: {}", e),
            })
    }

    async fn fetch_quote(&self, ticker: &str) -> Result<QuoteResponse, FetchError> {
        let text = self.fetch("/quote", &[("symbol", ticker)]).await?;

        let response: QuoteResponse =
            serde_json::from_str(&text).map_err(|e| FetchError::MalformedResponse {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to parse quote response: {}", e),
            })?;

        // Finnhub answers unknown symbols with an all-zero quote
        match response.c {
            Some(price) if price > 0.0 => Ok(response),
            _ => Err(FetchError::NotFound(ticker.to_string())),
        }
    }

    async fn fetch_fundamentals(&self, ticker: &str) -> Result<Option<MetricBody>, FetchError> {
        let text = self
            .fetch("/stock/metric", &[("symbol", ticker), ("metric", "all")])
            .await?;

        let response: MetricResponse =
            serde_json::from_str(&text).map_err(|e| FetchError::MalformedResponse {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to parse metric response: {}", e),
            })?;

        Ok(response.metric)
    }
}

#[async_trait]
impl MetricsProvider for FinnhubProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn tier(&self) -> SourceTier {
        SourceTier::PaidFallback
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_fundamentals: true,
            reports_asset_type: false,
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
        asset_type: AssetType,
    ) -> Result<RawMetrics, FetchError> {
        let quote = self.fetch_quote(ticker).await?;

        let mut raw = RawMetrics::new();

        if let Some(price) = quote.c.and_then(decimal_from_f64) {
            raw.insert(metric::CURRENT_PRICE, price);
        }
        if let Some(prev) = quote.pc.and_then(decimal_from_f64) {
            raw.insert(metric::PREVIOUS_CLOSE, prev);
        }

        if asset_type != AssetType::Etf {
            match self.fetch_fundamentals(ticker).await {
                Ok(Some(body)) => {
                    // Finnhub reports margins and growth as percentages
                    if let Some(margin) = body.gross_margin_ttm.and_then(decimal_from_f64) {
                        raw.insert(metric::GROSS_MARGIN, margin / Decimal::from(100));
                    }
                    if let Some(growth) = body.revenue_growth_ttm_yoy.and_then(decimal_from_f64) {
                        raw.insert(metric::REVENUE_GROWTH, growth / Decimal::from(100));
                    }
                    if let Some(avg) = body.avg_volume_10d.and_then(decimal_from_f64) {
                        raw.insert(metric::AVG_VOLUME, avg * Decimal::from(MILLION));
                    }
                }
                Ok(None) => {
                    debug!("Finnhub has no fundamentals for '{}'", ticker);
                }
                Err(e) => {
                    // Quote succeeded; degrade to partial data
                    warn!("Finnhub fundamentals unavailable for '{}': {}", ticker, e);
                }
            }
        }

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
