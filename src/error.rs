//! Error types for the valuation engine.
//!
//! Most of these never reach a caller of the public valuation entry points: they are
//! absorbed into a zero/default value after being logged under the
//! [`DIAGNOSTICS_TARGET`] log target. Only configuration errors are surfaced.

use thiserror::Error;

/// Log target for degradation events, so operators can filter them out of normal traffic.
pub const DIAGNOSTICS_TARGET: &str = "fundscope::diagnostics";

#[derive(Debug, Error)]
pub enum ValuationError {
    /// The external price feed could not be reached or returned garbage.
    #[error("price feed unavailable: {0}")]
    FeedUnavailable(String),

    /// A token address could not be identified.
    #[error("unknown token at {0}")]
    UnknownToken(String),

    /// No USD price could be located for a token.
    #[error("no price available for {0}")]
    NoPriceAvailable(String),

    /// The campaign registry read failed.
    #[error("campaign registry fetch failed: {0}")]
    RegistryFetchFailed(String),

    /// An on-chain `symbol()`/`decimals()` read failed or timed out.
    #[error("token introspection failed: {0}")]
    Introspection(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ValuationError {
    fn from(e: reqwest::Error) -> Self {
        ValuationError::FeedUnavailable(e.to_string())
    }
}

impl From<::config::ConfigError> for ValuationError {
    fn from(e: ::config::ConfigError) -> Self {
        ValuationError::Config(e.to_string())
    }
}
