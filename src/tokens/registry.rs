use rustc_hash::FxHashMap;

use crate::config::TokenSettings;
use crate::error::ValuationError;

/// Symbol given to tokens that could not be identified.
pub const UNKNOWN_SYMBOL: &str = "UNKNOWN";

/// Width assumed for tokens whose `decimals()` could not be read (ERC-20 default).
pub const DEFAULT_UNKNOWN_DECIMALS: u8 = 18;

/// Canonical attributes of a token.
///
/// Addresses are always stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TokenConfig {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub address: Option<String>,
    pub price_feed_id: Option<String>,
}

impl TokenConfig {
    pub fn new(
        name: String,
        symbol: String,
        decimals: u8,
        address: Option<String>,
        price_feed_id: Option<String>,
    ) -> Self {
        Self {
            name,
            symbol,
            decimals,
            address: address.map(|a| a.to_lowercase()),
            price_feed_id,
        }
    }

    /// Minimal config for a token the registry does not know.
    ///
    /// Missing introspection data falls back to [`UNKNOWN_SYMBOL`] and
    /// [`DEFAULT_UNKNOWN_DECIMALS`].
    pub fn synthetic(address: &str, symbol: Option<String>, decimals: Option<u8>) -> Self {
        let symbol = symbol
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_SYMBOL.to_string());

        Self::new(
            symbol.clone(),
            symbol,
            decimals.unwrap_or(DEFAULT_UNKNOWN_DECIMALS),
            Some(address.to_string()),
            None,
        )
    }

    /// Same token attributes, deployed at a different address.
    pub fn with_address(&self, address: &str) -> Self {
        Self {
            address: Some(address.to_lowercase()),
            ..self.clone()
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.symbol == UNKNOWN_SYMBOL
    }
}

impl From<&TokenSettings> for TokenConfig {
    fn from(settings: &TokenSettings) -> Self {
        TokenConfig::new(
            settings.name.clone(),
            settings.symbol.clone(),
            settings.decimals,
            settings.address.clone(),
            settings.price_feed_id.clone(),
        )
    }
}

/// Inclusive band of plausible human-readable amounts for a token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReasonableRange {
    pub min: f64,
    pub max: f64,
}

impl ReasonableRange {
    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }
}

/// Built-in ranges for the settlement tokens, used when the config omits them.
fn builtin_range(symbol: &str) -> Option<ReasonableRange> {
    let (min, max) = match symbol {
        "USDC" | "USDT" | "DAI" => (0.01, 10_000_000.0),
        "WETH" | "ETH" => (0.0001, 10_000.0),
        "WBTC" | "BTC" => (0.000001, 1_000.0),
        _ => return None,
    };
    Some(ReasonableRange { min, max })
}

/// Static symbol/address index over the configured tokens.
///
/// Lookups never fail; absent entries return `None`.
#[derive(Debug, Clone)]
pub struct TokenRegistry {
    tokens: Vec<TokenConfig>,
    // uppercase symbol -> index
    by_symbol: FxHashMap<String, usize>,
    // lowercase address -> index
    by_address: FxHashMap<String, usize>,
    ranges: FxHashMap<String, ReasonableRange>,
    reference: usize,
}

impl TokenRegistry {
    pub fn from_settings(
        settings: &[TokenSettings],
        reference_symbol: &str,
    ) -> Result<Self, ValuationError> {
        let mut tokens = Vec::with_capacity(settings.len());
        let mut by_symbol = FxHashMap::default();
        let mut by_address = FxHashMap::default();
        let mut ranges = FxHashMap::default();

        for (index, entry) in settings.iter().enumerate() {
            let token = TokenConfig::from(entry);
            let symbol_key = token.symbol.to_uppercase();

            if by_symbol.insert(symbol_key.clone(), index).is_some() {
                return Err(ValuationError::Config(format!(
                    "duplicate token symbol {}",
                    token.symbol
                )));
            }
            if let Some(address) = &token.address {
                if by_address.insert(address.clone(), index).is_some() {
                    return Err(ValuationError::Config(format!(
                        "duplicate token address {address}"
                    )));
                }
            }

            let range = match (entry.min_amount, entry.max_amount) {
                (Some(min), Some(max)) => Some(ReasonableRange { min, max }),
                _ => builtin_range(&symbol_key),
            };
            if let Some(range) = range {
                ranges.insert(symbol_key, range);
            }

            tokens.push(token);
        }

        let reference = *by_symbol
            .get(&reference_symbol.to_uppercase())
            .ok_or_else(|| {
                ValuationError::Config(format!(
                    "reference token {reference_symbol} is not configured"
                ))
            })?;

        Ok(Self {
            tokens,
            by_symbol,
            by_address,
            ranges,
            reference,
        })
    }

    /// Case-insensitive symbol lookup.
    pub fn lookup_by_symbol(&self, symbol: &str) -> Option<&TokenConfig> {
        self.by_symbol
            .get(&symbol.to_uppercase())
            .map(|&i| &self.tokens[i])
    }

    /// Case-insensitive address lookup.
    pub fn lookup_by_address(&self, address: &str) -> Option<&TokenConfig> {
        self.by_address
            .get(&address.to_lowercase())
            .map(|&i| &self.tokens[i])
    }

    /// All tokens in configuration order.
    pub fn tokens(&self) -> &[TokenConfig] {
        &self.tokens
    }

    /// The stablecoin goals are denominated in.
    pub fn reference_token(&self) -> &TokenConfig {
        &self.tokens[self.reference]
    }

    /// Feed ids for every token that has one, in configuration order.
    pub fn price_feed_ids(&self) -> Vec<String> {
        self.tokens
            .iter()
            .filter_map(|t| t.price_feed_id.clone())
            .collect()
    }

    pub fn reasonable_range(&self, symbol: &str) -> Option<ReasonableRange> {
        self.ranges.get(&symbol.to_uppercase()).copied()
    }
}
