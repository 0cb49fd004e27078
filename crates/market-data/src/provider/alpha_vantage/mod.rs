//! Alpha Vantage metric provider implementation.
//!
//! Fallback tier. Uses GLOBAL_QUOTE for price data and OVERVIEW for
//! fundamentals. The free tier allows 5 calls per minute and signals
//! throttling with a "Note"/"Information" body instead of an HTTP 429,
//! so both paths map to `RateLimited`.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::errors::FetchError;
use crate::models::{metric, AssetType, RawMetrics, SourceTier};
use crate::provider::{MetricsProvider, ProviderCapabilities, RateLimitSpec};

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER_ID: &str = "ALPHA_VANTAGE";

// ============================================================================
// API Response Structures
// ============================================================================

/// GLOBAL_QUOTE response.
#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    quote: Option<GlobalQuote>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "06. volume")]
    volume: Option<String>,
    #[serde(rename = "08. previous close")]
    previous_close: Option<String>,
}

impl GlobalQuote {
    fn is_empty(&self) -> bool {
        self.price.is_none() && self.previous_close.is_none()
    }
}

/// OVERVIEW response for company fundamentals.
/// Only the fields we map; the API returns many more.
#[derive(Debug, Deserialize)]
struct OverviewResponse {
    #[serde(rename = "AssetType")]
    asset_type: Option<String>,
    #[serde(rename = "QuarterlyRevenueGrowthYOY")]
    quarterly_revenue_growth_yoy: Option<String>,
    #[serde(rename = "GrossProfitTTM")]
    gross_profit_ttm: Option<String>,
    #[serde(rename = "RevenueTTM")]
    revenue_ttm: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
    // Unknown symbols come back as a bare {} - capture nothing else
    #[serde(flatten)]
    _rest: HashMap<String, serde_json::Value>,
}

// ============================================================================
// AlphaVantageProvider
// ============================================================================

/// Alpha Vantage metric provider.
///
/// Supplies price data plus revenue growth and gross margin for
/// equities. Free tier: 5 calls per minute.
pub struct AlphaVantageProvider {
    client: Client,
    api_key: String,
}

impl AlphaVantageProvider {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, api_key }
    }

    async fn fetch(&self, function: &str, ticker: &str) -> Result<String, FetchError> {
        debug!("Alpha Vantage request: {} for '{}'", function, ticker);

        let response = self
            .client
            .get(BASE_URL)
            .query(&[
                ("function", function),
                ("symbol", ticker),
                ("apikey", self.api_key.as_str()),
            ])
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
            return Err(FetchError::MalformedResponse {
                provider: PROVIDER_ID.to_string(),
                message: format!("HTTP {}", status),
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

    /// Alpha Vantage reports throttling inside a 200 body.
    fn throttled(note: &Option<String>, information: &Option<String>) -> bool {
        note.is_some() || information.is_some()
    }

    async fn fetch_quote(&self, ticker: &str) -> Result<GlobalQuote, FetchError> {
        let text = self.fetch("GLOBAL_QUOTE", ticker).await?;

        let response: GlobalQuoteResponse =
            serde_json::from_str(&text).map_err(|e| FetchError::MalformedResponse {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to parse quote response: {}", e),
            })?;

        if Self::throttled(&response.note, &response.information) {
            return Err(FetchError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }

        if let Some(message) = response.error_message {
            return Err(FetchError::MalformedResponse {
                provider: PROVIDER_ID.to_string(),
                message,
            });
        }

        match response.quote {
            Some(quote) if !quote.is_empty() => Ok(quote),
            // An empty quote object is how the API says "unknown symbol"
            _ => Err(FetchError::NotFound(ticker.to_string())),
        }
    }

    async fn fetch_overview(&self, ticker: &str) -> Result<OverviewResponse, FetchError> {
        let text = self.fetch("OVERVIEW", ticker).await?;

        let response: OverviewResponse =
            serde_json::from_str(&text).map_err(|e| FetchError::MalformedResponse {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to parse overview response: {}", e),
            })?;

        if Self::throttled(&response.note, &response.information) {
            return Err(FetchError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl MetricsProvider for AlphaVantageProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn tier(&self) -> SourceTier {
        SourceTier::Fallback
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_fundamentals: true,
            reports_asset_type: true,
        }
    }

    fn rate_limit(&self) -> RateLimitSpec {
        RateLimitSpec {
            max_calls_per_window: 5,
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

        if let Some(price) = quote.price.as_deref().and_then(parse_decimal) {
            raw.insert(metric::CURRENT_PRICE, price);
        }
        if let Some(prev) = quote.previous_close.as_deref().and_then(parse_decimal) {
            raw.insert(metric::PREVIOUS_CLOSE, prev);
        }
        if let Some(volume) = quote.volume.as_deref().and_then(parse_decimal) {
            raw.insert(metric::VOLUME, volume);
        }

        // ETFs have no overview worth asking for; a failed overview
        // costs a call from a 5-per-minute budget
        if asset_type != AssetType::Etf {
            match self.fetch_overview(ticker).await {
                Ok(overview) => {
                    if let Some(growth) = overview
                        .quarterly_revenue_growth_yoy
                        .as_deref()
                        .and_then(parse_decimal)
                    {
                        raw.insert(metric::REVENUE_GROWTH, growth);
                    }

                    let gross_profit = overview.gross_profit_ttm.as_deref().and_then(parse_decimal);
                    let revenue = overview.revenue_ttm.as_deref().and_then(parse_decimal);
                    if let (Some(gross_profit), Some(revenue)) = (gross_profit, revenue) {
                        if !revenue.is_zero() {
                            raw.insert(metric::GROSS_MARGIN, gross_profit / revenue);
                        }
                    }

                    raw.etf_flag = overview
                        .asset_type
                        .as_deref()
                        .map(|t| t.eq_ignore_ascii_case("ETF"));
                }
                Err(e) => {
                    // Partial data is acceptable; the quote already
                    // succeeded, so don't fail the whole tier
                    warn!(
                        "Alpha Vantage overview unavailable for '{}': {}",
                        ticker, e
                    );
                }
            }
        }

        Ok(raw)
    }
}

/// Parse Alpha Vantage's stringly-typed numbers. The API uses "None"
/// and "-" for absent values.
fn parse_decimal(value: &str) -> Option<Decimal> {
    let trimmed = value.trim().trim_end_matches('%');
    if trimmed.is_empty() || trimmed == "None" || trimmed == "-" {
        return None;
    }
    Decimal::from_str(trimmed).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_global_quote() {
        let body = r#"{
            "Global Quote": {
                "01. symbol": "NVDA",
                "05. price": "125.0000",
                "06. volume": "30145200",
                "08. previous close": "120.0000"
            }
        }"#;

        let response: GlobalQuoteResponse = serde_json::from_str(body).unwrap();
        let quote = response.quote.unwrap();
        assert_eq!(parse_decimal(quote.price.as_deref().unwrap()), Some(dec!(125.0000)));
        assert!(!quote.is_empty());
    }

    #[test]
    fn test_empty_quote_means_unknown_symbol() {
        let body = r#"{"Global Quote": {}}"#;
        let response: GlobalQuoteResponse = serde_json::from_str(body).unwrap();
        assert!(response.quote.unwrap().is_empty());
    }

    #[test]
    fn test_note_body_is_throttle_signal() {
        let body = r#"{"Note": "Thank you for using Alpha Vantage! Our standard API rate limit is 5 calls per minute."}"#;
        let response: GlobalQuoteResponse = serde_json::from_str(body).unwrap();
        assert!(AlphaVantageProvider::throttled(
            &response.note,
            &response.information
        ));
    }

    #[test]
    fn test_parse_overview_fundamentals() {
        let body = r#"{
            "Symbol": "NVDA",
            "AssetType": "Common Stock",
            "QuarterlyRevenueGrowthYOY": "0.122",
            "GrossProfitTTM": "44301000000",
            "RevenueTTM": "60922000000"
        }"#;

        let overview: OverviewResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            parse_decimal(overview.quarterly_revenue_growth_yoy.as_deref().unwrap()),
            Some(dec!(0.122))
        );
        assert_eq!(overview.asset_type.as_deref(), Some("Common Stock"));
    }

    #[test]
    fn test_parse_decimal_sentinels() {
        assert_eq!(parse_decimal("None"), None);
        assert_eq!(parse_decimal("-"), None);
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("4.16%"), Some(dec!(4.16)));
    }
}
