//! Metric provider implementations and the trait they share.

pub mod alpha_vantage;
mod capabilities;
pub mod finnhub;
mod traits;
pub mod yahoo;

pub use capabilities::{ProviderCapabilities, RateLimitSpec};
pub use traits::MetricsProvider;

use std::env;
use std::sync::Arc;

use log::info;

use alpha_vantage::AlphaVantageProvider;
use finnhub::FinnhubProvider;
use yahoo::YahooProvider;

/// Environment variable holding the Alpha Vantage key.
pub const ALPHA_VANTAGE_API_KEY: &str = "ALPHA_VANTAGE_API_KEY";

/// Environment variable holding the Finnhub key.
pub const FINNHUB_API_KEY: &str = "FINNHUB_API_KEY";

/// Build the fallback chain from the environment.
///
/// Yahoo needs no credential and is always present. The keyed tiers
/// are included only when their key is set; a missing key disables
/// the tier rather than erroring.
pub fn tiers_from_env() -> Vec<Arc<dyn MetricsProvider>> {
    let mut tiers: Vec<Arc<dyn MetricsProvider>> = vec![Arc::new(YahooProvider::new())];

    match non_empty_env(ALPHA_VANTAGE_API_KEY) {
        Some(key) => tiers.push(Arc::new(AlphaVantageProvider::new(key))),
        None => info!("{} not set, fallback tier disabled", ALPHA_VANTAGE_API_KEY),
    }

    match non_empty_env(FINNHUB_API_KEY) {
        Some(key) => tiers.push(Arc::new(FinnhubProvider::new(key))),
        None => info!("{} not set, paid fallback tier disabled", FINNHUB_API_KEY),
    }

    tiers
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
