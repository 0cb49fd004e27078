//! Provider capability and rate limit descriptors.

use std::time::Duration;

/// Describes what a metric provider can supply.
///
/// The fetcher uses this to decide which required fields a provider
/// can reasonably be expected to fill.
#[derive(Clone, Debug)]
pub struct ProviderCapabilities {
    /// Whether the provider supplies fundamental metrics
    /// (revenue growth, gross margin) in addition to price data.
    pub supports_fundamentals: bool,

    /// Whether the provider reports a fund/ETF indicator.
    pub reports_asset_type: bool,
}

/// Rate limit contract for one provider.
///
/// Interpreted as strict spacing: one call per `window / max_calls_per_window`,
/// never bursts. Concurrent fetches across tickers share the same gate.
#[derive(Clone, Copy, Debug)]
pub struct RateLimitSpec {
    /// Maximum calls allowed per window.
    pub max_calls_per_window: u32,

    /// Window the limit applies to.
    pub window: Duration,
}

impl RateLimitSpec {
    /// Minimum spacing between consecutive calls.
    pub fn min_spacing(&self) -> Duration {
        if self.max_calls_per_window == 0 {
            return self.window;
        }
        self.window / self.max_calls_per_window
    }
}

impl Default for RateLimitSpec {
    fn default() -> Self {
        Self {
            max_calls_per_window: 60,
            window: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_spacing() {
        let spec = RateLimitSpec {
            max_calls_per_window: 5,
            window: Duration::from_secs(60),
        };
        assert_eq!(spec.min_spacing(), Duration::from_secs(12));
    }

    #[test]
    fn test_zero_calls_spaces_by_full_window() {
        let spec = RateLimitSpec {
            max_calls_per_window: 0,
            window: Duration::from_secs(60),
        };
        assert_eq!(spec.min_spacing(), Duration::from_secs(60));
    }
}
