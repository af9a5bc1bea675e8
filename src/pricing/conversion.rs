use std::sync::Arc;

use alloy::primitives::U256;
use log::warn;

use super::cache::{PriceCache, PriceSnapshot};
use crate::error::DIAGNOSTICS_TARGET;
use crate::tokens::{TokenConfig, TokenRegistry};
use crate::utils::{u256_to_f64_safe, validate_usd_value};

/// Last-resort lowercase symbol -> feed id table for the settlement tokens.
pub const FALLBACK_FEED_IDS: [(&str, &str); 3] = [
    ("usdc", "usd-coin"),
    ("weth", "weth"),
    ("wbtc", "wrapped-bitcoin"),
];

/// Which strategy located the price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum PriceLookup {
    FeedId,
    Symbol,
    FallbackTable,
}

/// Outcome of a USD conversion.
///
/// `price` is `None` when nothing could be located; `usd_value` is then 0 and the caller's
/// total becomes a lower bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conversion {
    pub usd_value: f64,
    pub price: Option<(f64, PriceLookup)>,
}

impl Conversion {
    fn zero() -> Self {
        Self {
            usd_value: 0.0,
            price: None,
        }
    }

    pub fn has_price(&self) -> bool {
        self.price.is_some()
    }
}

/// Locate a USD price for `token`, stopping at the first hit:
/// 1. the token's feed id
/// 2. the token's lowercase symbol
/// 3. the built-in symbol -> feed id table
pub fn lookup_price(snapshot: &PriceSnapshot, token: &TokenConfig) -> Option<(f64, PriceLookup)> {
    if let Some(usd) = token.price_feed_id.as_deref().and_then(|id| snapshot.usd(id)) {
        return Some((usd, PriceLookup::FeedId));
    }

    let symbol = token.symbol.to_lowercase();
    if let Some(usd) = snapshot.usd(&symbol) {
        return Some((usd, PriceLookup::Symbol));
    }

    FALLBACK_FEED_IDS
        .iter()
        .find(|(s, _)| *s == symbol)
        .and_then(|(_, id)| snapshot.usd(id))
        .map(|usd| (usd, PriceLookup::FallbackTable))
}

/// `raw / 10^decimals * price`, with the decimal shift done in exact integer arithmetic.
pub fn convert_with_snapshot(snapshot: &PriceSnapshot, raw: U256, token: &TokenConfig) -> Conversion {
    if raw.is_zero() || snapshot.is_empty() {
        return Conversion::zero();
    }

    let Some((price, lookup)) = lookup_price(snapshot, token) else {
        return Conversion::zero();
    };

    let Some(human) = u256_to_f64_safe(raw, token.decimals) else {
        return Conversion::zero();
    };

    // An undisplayable product is reported as unpriced, not as a silent 0
    match validate_usd_value(human * price) {
        Some(usd_value) => Conversion {
            usd_value,
            price: Some((price, lookup)),
        },
        None => Conversion::zero(),
    }
}

/// Converts raw token amounts to USD against the shared [`PriceCache`].
///
/// Never fails: every miss is a 0 contribution plus a `no_price_available` diagnostic.
#[derive(Clone)]
pub struct UsdConverter {
    registry: Arc<TokenRegistry>,
    prices: Arc<PriceCache>,
}

impl UsdConverter {
    pub fn new(registry: Arc<TokenRegistry>, prices: Arc<PriceCache>) -> Self {
        Self { registry, prices }
    }

    pub fn convert_to_usd(
        &self,
        raw: U256,
        token_address: &str,
        token_hint: Option<&TokenConfig>,
    ) -> f64 {
        self.convert_detailed(raw, token_address, token_hint)
            .usd_value
    }

    pub fn convert_detailed(
        &self,
        raw: U256,
        token_address: &str,
        token_hint: Option<&TokenConfig>,
    ) -> Conversion {
        if raw.is_zero() {
            return Conversion::zero();
        }

        let Some(token) = token_hint.or_else(|| self.registry.lookup_by_address(token_address))
        else {
            warn!(
                target: DIAGNOSTICS_TARGET,
                "no_price_available address={} reason=unidentified token", token_address
            );
            return Conversion::zero();
        };

        let snapshot = self.prices.current_prices();
        let conversion = convert_with_snapshot(&snapshot, raw, token);

        if !conversion.has_price() {
            warn!(
                target: DIAGNOSTICS_TARGET,
                "no_price_available address={} symbol={} snapshot_entries={}",
                token_address,
                token.symbol,
                snapshot.len()
            );
        }

        conversion
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::feed::{FeedPrices, FeedQuote};
    use chrono::Utc;

    fn snapshot(entries: &[(&str, f64)]) -> PriceSnapshot {
        let quotes: FeedPrices = entries
            .iter()
            .map(|(id, usd)| {
                (
                    id.to_string(),
                    FeedQuote {
                        usd: Some(*usd),
                        usd_24h_change: None,
                        last_updated_at: None,
                    },
                )
            })
            .collect();
        PriceSnapshot::from_feed(quotes, Utc::now())
    }

    fn token(symbol: &str, decimals: u8, feed_id: Option<&str>) -> TokenConfig {
        TokenConfig::new(
            symbol.to_string(),
            symbol.to_string(),
            decimals,
            None,
            feed_id.map(str::to_string),
        )
    }

    #[test]
    fn test_conversion_formula_at_each_width() {
        let prices = snapshot(&[("usd-coin", 1.0), ("weth", 3000.0), ("wrapped-bitcoin", 65000.0)]);
        let raw = U256::from(123_456_789u64);

        for (symbol, decimals, feed_id, price) in [
            ("USDC", 6u8, "usd-coin", 1.0),
            ("WBTC", 8, "wrapped-bitcoin", 65000.0),
            ("WETH", 18, "weth", 3000.0),
        ] {
            let conversion = convert_with_snapshot(&prices, raw, &token(symbol, decimals, Some(feed_id)));
            let expected = (123_456_789f64 / 10f64.powi(decimals as i32)) * price;
            assert!(
                (conversion.usd_value - expected).abs() <= expected * 1e-12,
                "{symbol}: {} != {}",
                conversion.usd_value,
                expected
            );
            assert_eq!(conversion.price, Some((price, PriceLookup::FeedId)));
        }
    }

    #[test]
    fn test_symbol_namespace_is_second_choice() {
        let prices = snapshot(&[("pepe", 0.00001)]);
        let pepe = token("PEPE", 18, Some("pepe-token"));

        let conversion = convert_with_snapshot(&prices, U256::from(10u64).pow(U256::from(24u64)), &pepe);
        assert_eq!(conversion.price, Some((0.00001, PriceLookup::Symbol)));
        assert!((conversion.usd_value - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_fallback_table_is_last_resort() {
        let prices = snapshot(&[("wrapped-bitcoin", 60000.0)]);
        // Bridged WBTC with no feed id of its own
        let wbtc = token("WBTC", 8, None);

        let conversion = convert_with_snapshot(&prices, U256::from(50_000_000u64), &wbtc);
        assert_eq!(conversion.price, Some((60000.0, PriceLookup::FallbackTable)));
        assert_eq!(conversion.usd_value, 30000.0);
    }

    #[test]
    fn test_large_balances_are_not_capped() {
        let prices = snapshot(&[("usd-coin", 1.0), ("wrapped-bitcoin", 2e7)]);

        // 2e18 raw USDC is $2 trillion
        let raw = U256::from(2_000_000_000_000_000_000u128);
        let conversion = convert_with_snapshot(&prices, raw, &token("USDC", 6, Some("usd-coin")));
        assert_eq!(conversion.usd_value, 2e12);
        assert_eq!(conversion.price, Some((1.0, PriceLookup::FeedId)));

        assert_eq!(prices.usd("wrapped-bitcoin"), Some(2e7));
        let wbtc = token("WBTC", 8, Some("wrapped-bitcoin"));
        let conversion = convert_with_snapshot(&prices, U256::from(100_000_000u64), &wbtc);
        assert_eq!(conversion.usd_value, 2e7);
    }

    #[test]
    fn test_unrepresentable_value_is_unpriced() {
        let prices = snapshot(&[("weth", 1e300)]);
        let weth = token("WETH", 18, Some("weth"));

        // 1e30 WETH at 1e300 overflows f64
        let raw = U256::from(10u64).pow(U256::from(48u64));
        let conversion = convert_with_snapshot(&prices, raw, &weth);
        assert_eq!(conversion.usd_value, 0.0);
        assert!(!conversion.has_price());
    }

    #[test]
    fn test_zero_cases() {
        let prices = snapshot(&[("weth", 3000.0)]);
        let weth = token("WETH", 18, Some("weth"));

        assert_eq!(convert_with_snapshot(&prices, U256::ZERO, &weth), Conversion::zero());
        assert_eq!(
            convert_with_snapshot(&PriceSnapshot::empty(), U256::from(1u64), &weth),
            Conversion::zero()
        );

        let unknown = TokenConfig::synthetic("0xdead", None, None);
        let conversion = convert_with_snapshot(&prices, U256::from(1u64), &unknown);
        assert_eq!(conversion.usd_value, 0.0);
        assert!(!conversion.has_price());
    }
}
