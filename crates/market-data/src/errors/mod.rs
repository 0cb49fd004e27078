//! Error types and fallback-chain classification for the acquisition layer.
//!
//! This module provides:
//! - [`FetchError`]: the error enum for all provider fetch operations
//! - [`ChainDisposition`]: classification that tells the fallback chain
//!   what to do with a failed tier

mod disposition;

pub use disposition::ChainDisposition;

use thiserror::Error;

/// Errors that can occur while fetching metrics from a data provider.
///
/// Each variant maps to a [`ChainDisposition`] via
/// [`disposition`](Self::disposition), which drives the fallback chain.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The provider does not know the ticker. This is a configuration
    /// problem, not an outage - falling back to another tier won't help.
    #[error("Ticker not found: {0}")]
    NotFound(String),

    /// The provider throttled the request (HTTP 429 or an in-body
    /// throttle notice). Try the next tier this cycle.
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that throttled the request
        provider: String,
    },

    /// The request exceeded its deadline. Try the next tier this cycle.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// The provider returned a body we could not interpret.
    /// Try the next tier this cycle.
    #[error("Malformed response from {provider}: {message}")]
    MalformedResponse {
        /// The provider that returned the response
        provider: String,
        /// What failed to parse
        message: String,
    },

    /// The credential for this provider is missing or rejected.
    /// The tier is useless until the key is fixed, so it is skipped
    /// for the rest of the process lifetime.
    #[error("Unauthorized: {provider}")]
    Unauthorized {
        /// The provider that rejected the credential
        provider: String,
    },

    /// A transport-level error occurred while talking to a provider.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl FetchError {
    /// Returns what the fallback chain should do about this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use folioalert_market_data::errors::{ChainDisposition, FetchError};
    ///
    /// let error = FetchError::Timeout { provider: "YAHOO".to_string() };
    /// assert_eq!(error.disposition(), ChainDisposition::NextTier);
    ///
    /// let error = FetchError::NotFound("XYZQ".to_string());
    /// assert_eq!(error.disposition(), ChainDisposition::Abort);
    /// ```
    pub fn disposition(&self) -> ChainDisposition {
        match self {
            // Invalid ticker is terminal for the whole chain
            Self::NotFound(_) => ChainDisposition::Abort,

            // Bad credential disables the tier, the chain continues
            Self::Unauthorized { .. } => ChainDisposition::TierDisabled,

            // Everything else is a tier-local failure
            Self::RateLimited { .. }
            | Self::Timeout { .. }
            | Self::MalformedResponse { .. }
            | Self::Network(_) => ChainDisposition::NextTier,
        }
    }

    /// Whether this failure should count toward opening the provider's
    /// circuit. Parse failures don't - the provider answered, we just
    /// couldn't use the answer.
    pub fn counts_against_circuit(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Timeout { .. } | Self::Network(_)
        )
    }
}
