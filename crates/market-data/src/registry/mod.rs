//! Acquisition chain orchestration.
//!
//! This module provides the pieces that sit between the providers and
//! the record store:
//! - Rate limiting with strict per-source call spacing
//! - Circuit breaking for providers that fail across cycles
//! - Response validation before store writes
//! - The fallback fetcher that walks the tiers

mod circuit_breaker;
mod fetcher;
mod rate_limiter;
mod validator;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use fetcher::{FallbackFetcher, FetchChainError, FetchOutcome, FetcherConfig};
pub use rate_limiter::RateLimiter;
pub use validator::{MetricsValidator, ValidatedMetrics, ValidationFailure, ValidatorConfig};
