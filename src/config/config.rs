use std::collections::HashSet;
use std::str::FromStr;

use alloy::primitives::Address;
use ::config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use url::Url;

use crate::error::ValuationError;

/// Upper bound on token decimals; anything wider is treated as a misconfiguration.
pub const MAX_TOKEN_DECIMALS: u8 = 24;

/// Chain connection used for campaign registry reads and token introspection.
#[derive(Debug, Deserialize, Clone)]
pub struct ChainSettings {
    pub rpc_url: String,
    pub campaign_registry_address: String,
    /// Per-call timeout for `symbol()` / `decimals()` reads on unknown tokens
    #[serde(default = "default_introspection_timeout_ms")]
    pub introspection_timeout_ms: u64,
}

fn default_introspection_timeout_ms() -> u64 {
    5_000
}

/// External USD spot price endpoint.
///
/// The endpoint is queried as `GET <base_url>?ids=a,b,c&vs_currencies=usd`.
#[derive(Debug, Deserialize, Clone)]
pub struct PriceFeedSettings {
    pub base_url: String,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Sent as the `x-cg-demo-api-key` header when present
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_refresh_interval_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    10
}

/// A single token the platform knows about.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TokenSettings {
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub price_feed_id: Option<String>,
    /// Smallest plausible human-readable donation, used by the donation matcher
    #[serde(default)]
    pub min_amount: Option<f64>,
    /// Largest plausible human-readable donation, used by the donation matcher
    #[serde(default)]
    pub max_amount: Option<f64>,
}

impl TokenSettings {
    fn new(
        symbol: &str,
        name: &str,
        decimals: u8,
        address: &str,
        price_feed_id: &str,
        range: (f64, f64),
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            decimals,
            address: Some(address.to_string()),
            price_feed_id: Some(price_feed_id.to_string()),
            min_amount: Some(range.0),
            max_amount: Some(range.1),
        }
    }
}

/// Ethereum mainnet deployments of the three settlement tokens.
pub fn default_tokens() -> Vec<TokenSettings> {
    vec![
        TokenSettings::new(
            "USDC",
            "USD Coin",
            6,
            "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
            "usd-coin",
            (0.01, 10_000_000.0),
        ),
        TokenSettings::new(
            "WETH",
            "Wrapped Ether",
            18,
            "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2",
            "weth",
            (0.0001, 10_000.0),
        ),
        TokenSettings::new(
            "WBTC",
            "Wrapped Bitcoin",
            8,
            "0x2260fac5e5542a773aa44fbcfedf7c193bc2c599",
            "wrapped-bitcoin",
            (0.000001, 1_000.0),
        ),
    ]
}

fn default_reference_symbol() -> String {
    "USDC".to_string()
}

/// Background valuation loop run by the binary.
#[derive(Debug, Deserialize, Clone)]
pub struct MonitorSettings {
    /// Campaigns to value; empty means every campaign the registry lists
    #[serde(default)]
    pub campaign_ids: Vec<u64>,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_poll_interval_secs() -> u64 {
    60
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            campaign_ids: Vec::new(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

/// Root application configuration.
///
/// Loaded once from `config.yaml` (or any format the `config` crate understands) with
/// `FUNDSCOPE__SECTION__KEY` environment overrides, then validated before anything starts.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub chain: ChainSettings,
    pub price_feed: PriceFeedSettings,
    #[serde(default = "default_tokens")]
    pub tokens: Vec<TokenSettings>,
    /// Symbol of the stablecoin campaign goals are denominated in
    #[serde(default = "default_reference_symbol")]
    pub reference_symbol: String,
    #[serde(default)]
    pub monitor: MonitorSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ValuationError> {
        let s = Config::builder()
            .add_source(File::with_name("config"))
            .add_source(Environment::with_prefix("FUNDSCOPE").separator("__"))
            .build()?;

        let settings: Settings = s.try_deserialize()?;
        settings.validate()?;

        Ok(settings)
    }

    /// Parse settings from an in-memory document.
    pub fn parse(contents: &str, format: FileFormat) -> Result<Self, ValuationError> {
        let s = Config::builder()
            .add_source(File::from_str(contents, format))
            .build()?;

        let settings: Settings = s.try_deserialize()?;
        settings.validate()?;

        Ok(settings)
    }

    /// Fail fast on anything that would otherwise surface as `UNKNOWN` tokens at runtime.
    pub fn validate(&self) -> Result<(), ValuationError> {
        Url::parse(&self.chain.rpc_url)
            .map_err(|e| ValuationError::Config(format!("chain.rpc_url: {e}")))?;
        Url::parse(&self.price_feed.base_url)
            .map_err(|e| ValuationError::Config(format!("price_feed.base_url: {e}")))?;
        Address::from_str(&self.chain.campaign_registry_address).map_err(|e| {
            ValuationError::Config(format!("chain.campaign_registry_address: {e}"))
        })?;

        if self.price_feed.refresh_interval_secs == 0 {
            return Err(ValuationError::Config(
                "price_feed.refresh_interval_secs must be positive".to_string(),
            ));
        }

        if self.tokens.is_empty() {
            return Err(ValuationError::Config("no tokens configured".to_string()));
        }

        let mut symbols = HashSet::new();
        let mut addresses = HashSet::new();

        for token in &self.tokens {
            if token.symbol.trim().is_empty() {
                return Err(ValuationError::Config("token with empty symbol".to_string()));
            }
            if !symbols.insert(token.symbol.to_uppercase()) {
                return Err(ValuationError::Config(format!(
                    "duplicate token symbol {}",
                    token.symbol
                )));
            }
            if token.decimals > MAX_TOKEN_DECIMALS {
                return Err(ValuationError::Config(format!(
                    "{} has {} decimals (max {})",
                    token.symbol, token.decimals, MAX_TOKEN_DECIMALS
                )));
            }
            if let Some(address) = &token.address {
                Address::from_str(address).map_err(|e| {
                    ValuationError::Config(format!("{} address {address}: {e}", token.symbol))
                })?;
                if !addresses.insert(address.to_lowercase()) {
                    return Err(ValuationError::Config(format!(
                        "duplicate token address {address}"
                    )));
                }
            }
            if let (Some(min), Some(max)) = (token.min_amount, token.max_amount) {
                if !(min >= 0.0 && min < max) {
                    return Err(ValuationError::Config(format!(
                        "{} has an empty reasonable range [{min}, {max}]",
                        token.symbol
                    )));
                }
            }
        }

        let reference = self
            .tokens
            .iter()
            .find(|t| t.symbol.eq_ignore_ascii_case(&self.reference_symbol))
            .ok_or_else(|| {
                ValuationError::Config(format!(
                    "reference token {} is not configured",
                    self.reference_symbol
                ))
            })?;

        if reference.address.is_none() {
            return Err(ValuationError::Config(format!(
                "reference token {} has no address",
                reference.symbol
            )));
        }

        Ok(())
    }
}
