//! FolioAlert Market Data Crate
//!
//! Provider-agnostic acquisition of financial metrics for the
//! FolioAlert monitoring pipeline.
//!
//! # Overview
//!
//! This crate supports:
//! - Multiple providers in a fixed fallback order: Yahoo (primary),
//!   Alpha Vantage (fallback), Finnhub (paid fallback)
//! - Per-source rate limiting with strict call spacing
//! - Circuit breaking for providers failing across cycles
//! - Validation and normalization of provider responses
//! - Cache-only degradation when every live tier fails
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! | FallbackFetcher  |  (tier walk, one ticker per call)
//! +------------------+
//!    |         |
//!    v         v
//! +--------+ +----------------+
//! | Gates  | | MetricsProvider|  (Yahoo, AlphaVantage, Finnhub)
//! | limit/ | +----------------+
//! | breaker|         |
//! +--------+         v
//!            +----------------+
//!            |   RawMetrics   |  -> validated -> TickerRecord
//!            +----------------+
//!                    |
//!                    v
//!            +----------------+
//!            |  RecordStore   |  (trait; last write wins by fetched_at)
//!            +----------------+
//! ```
//!
//! # Core Types
//!
//! - [`TickerRecord`] - latest known data per ticker
//! - [`RawMetrics`] - unvalidated provider response
//! - [`AssetType`] / [`SourceTier`] - classification and provenance
//! - [`FetchOutcome`] - fresh record or cache degradation

pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;

// Re-export the error surface
pub use errors::{ChainDisposition, FetchError};

// Re-export the model surface
pub use models::{
    metric, required_metrics, AssetType, RawMetrics, RecordStore, SourceTier, StoreError,
    TickerRecord, UpsertOutcome,
};

// Re-export provider types
pub use provider::alpha_vantage::AlphaVantageProvider;
pub use provider::finnhub::FinnhubProvider;
pub use provider::yahoo::YahooProvider;
pub use provider::{tiers_from_env, MetricsProvider, ProviderCapabilities, RateLimitSpec};

// Re-export registry types
pub use registry::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, FallbackFetcher, FetchChainError,
    FetchOutcome, FetcherConfig, MetricsValidator, RateLimiter, ValidationFailure, ValidatorConfig,
};
