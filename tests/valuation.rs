use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::U256;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use fundscope::config::default_tokens;
use fundscope::portfolio::{CampaignRegistry, CampaignSummary, RawDonation, TokenBalances};
use fundscope::pricing::{FeedPrices, FeedQuote, FixedClock, PriceFeed, RefreshOutcome};
use fundscope::tokens::{ResolutionSource, TokenIntrospector};
use fundscope::{PriceCache, SnapshotStatus, TokenRegistry, ValuationEngine, ValuationError};

const USDC: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";
const WETH: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";
const STRAY: &str = "0x1111111111111111111111111111111111111111";

/// Serves scripted responses in order, then fails.
struct ScriptedFeed {
    responses: Mutex<VecDeque<Result<FeedPrices, ValuationError>>>,
}

impl ScriptedFeed {
    fn new(responses: Vec<Result<FeedPrices, ValuationError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }
}

#[async_trait]
impl PriceFeed for ScriptedFeed {
    async fn fetch_prices(&self, _ids: &[String]) -> Result<FeedPrices, ValuationError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ValuationError::FeedUnavailable("HTTP 503".to_string())))
    }
}

fn quotes(entries: &[(&str, f64)]) -> FeedPrices {
    entries
        .iter()
        .map(|(id, usd)| {
            (
                id.to_string(),
                FeedQuote {
                    usd: Some(*usd),
                    usd_24h_change: Some(0.5),
                    last_updated_at: Some(1_700_000_000),
                },
            )
        })
        .collect()
}

/// A contract that answers neither `symbol()` nor `decimals()`.
struct UnreadableIntrospector;

#[async_trait]
impl TokenIntrospector for UnreadableIntrospector {
    async fn symbol(&self, address: &str) -> Result<String, ValuationError> {
        Err(ValuationError::Introspection(format!("symbol() reverted on {address}")))
    }

    async fn decimals(&self, address: &str) -> Result<u8, ValuationError> {
        Err(ValuationError::Introspection(format!("decimals() reverted on {address}")))
    }
}

struct FixedCampaigns {
    balances: Option<TokenBalances>,
}

#[async_trait]
impl CampaignRegistry for FixedCampaigns {
    async fn list_campaigns(&self) -> Result<Vec<CampaignSummary>, ValuationError> {
        Ok(Vec::new())
    }

    async fn campaign_donations(&self, _id: u64) -> Result<Vec<RawDonation>, ValuationError> {
        Ok(Vec::new())
    }

    async fn campaign_token_balances(&self, _id: u64) -> Result<TokenBalances, ValuationError> {
        self.balances
            .clone()
            .ok_or_else(|| ValuationError::RegistryFetchFailed("execution reverted".to_string()))
    }
}

fn holdings(entries: &[(&str, U256)]) -> Option<TokenBalances> {
    Some(TokenBalances {
        addresses: entries.iter().map(|(a, _)| a.to_string()).collect(),
        balances: entries.iter().map(|(_, b)| *b).collect(),
    })
}

async fn engine(
    feed: Vec<Result<FeedPrices, ValuationError>>,
    balances: Option<TokenBalances>,
) -> ValuationEngine {
    let registry = Arc::new(TokenRegistry::from_settings(&default_tokens(), "USDC").unwrap());
    let prices = Arc::new(PriceCache::new(
        Arc::new(ScriptedFeed::new(feed)),
        Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        )),
        registry.price_feed_ids(),
        Duration::from_secs(30),
    ));

    let engine = ValuationEngine::new(
        registry,
        prices,
        Some(Arc::new(UnreadableIntrospector)),
        Arc::new(FixedCampaigns { balances }),
    );
    engine.refresh_prices().await;
    engine
}

#[tokio::test]
async fn test_mixed_portfolio_skips_zero_balances() {
    let engine = engine(
        vec![Ok(quotes(&[("usd-coin", 1.0), ("weth", 3000.0)]))],
        holdings(&[(USDC, U256::from(250_000_000u64)), (WETH, U256::ZERO)]),
    )
    .await;

    let snapshot = engine.portfolio(7, U256::from(500_000_000u64)).await;

    assert_eq!(snapshot.total_usd_value, 250.0);
    assert_eq!(snapshot.raised_usd, 250.0);
    assert_eq!(snapshot.goal_usd, 500.0);
    assert_eq!(snapshot.progress_pct, 50.0);
    assert_eq!(snapshot.status, SnapshotStatus::Complete);
    assert_eq!(snapshot.token_balances.len(), 1);

    let usdc = &snapshot.token_balances[0];
    assert_eq!(usdc.symbol, "USDC");
    assert_eq!(usdc.token_address, USDC.to_lowercase());
    assert_eq!(usdc.balance_formatted, "250.000000");
    assert!(snapshot.token_balances.iter().all(|b| !b.raw_amount.is_zero()));
}

#[tokio::test]
async fn test_unreadable_token_is_unknown_and_worthless() {
    let engine = engine(
        vec![Ok(quotes(&[("usd-coin", 1.0), ("weth", 3000.0)]))],
        holdings(&[
            (STRAY, U256::from(10u64).pow(U256::from(21u64))),
            (USDC, U256::from(1_000_000u64)),
        ]),
    )
    .await;

    let snapshot = engine.portfolio(7, U256::from(500_000_000u64)).await;

    assert_eq!(snapshot.token_balances.len(), 2);
    let stray = &snapshot.token_balances[0];
    assert_eq!(stray.symbol, "UNKNOWN");
    assert_eq!(stray.decimals, 18);
    assert_eq!(stray.usd_value, 0.0);
    assert!(!stray.priced);
    assert_eq!(stray.resolution, ResolutionSource::Unknown);

    assert_eq!(snapshot.total_usd_value, 1.0);
    assert_eq!(snapshot.status, SnapshotStatus::Partial);
}

#[tokio::test]
async fn test_repeat_valuation_is_identical() {
    let engine = engine(
        vec![Ok(quotes(&[
            ("usd-coin", 0.9998),
            ("weth", 3187.42),
            ("wrapped-bitcoin", 67012.5),
        ]))],
        holdings(&[
            (USDC, U256::from(123_456_789u64)),
            (WETH, U256::from(1_234_567_890_123_456_789u128)),
            ("0x2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599", U256::from(3_141_592u64)),
        ]),
    )
    .await;

    let first = engine.portfolio(7, U256::from(10_000_000_000u64)).await;
    let second = engine.portfolio(7, U256::from(10_000_000_000u64)).await;

    assert_eq!(first, second);
    assert_eq!(
        first.total_usd_value.to_bits(),
        second.total_usd_value.to_bits()
    );
}

#[tokio::test]
async fn test_feed_outage_keeps_previous_prices() {
    let engine = engine(
        vec![Ok(quotes(&[("usd-coin", 1.0), ("weth", 3000.0)]))],
        holdings(&[(WETH, U256::from(2_000_000_000_000_000_000u128))]),
    )
    .await;

    let before = engine.current_prices();
    assert_eq!(engine.refresh_prices().await, RefreshOutcome::Retained);
    assert_eq!(engine.current_prices(), before);

    let snapshot = engine.portfolio(7, U256::from(12_000_000_000u64)).await;
    assert_eq!(snapshot.total_usd_value, 6000.0);
    assert_eq!(snapshot.progress_pct, 50.0);
}

#[tokio::test]
async fn test_feed_never_answering_uses_fallback_prices() {
    let engine = engine(
        Vec::new(),
        holdings(&[(WETH, U256::from(1_000_000_000_000_000_000u128))]),
    )
    .await;

    let snapshot = engine.portfolio(7, U256::from(6_000_000_000u64)).await;
    assert_eq!(snapshot.total_usd_value, 3000.0);
    assert_eq!(snapshot.progress_pct, 50.0);
}

#[tokio::test]
async fn test_registry_failure_zeroes_snapshot() {
    let engine = engine(vec![Ok(quotes(&[("usd-coin", 1.0)]))], None).await;

    let snapshot = engine.portfolio(7, U256::from(500_000_000u64)).await;

    assert_eq!(snapshot.status, SnapshotStatus::RegistryUnavailable);
    assert_eq!(snapshot.total_usd_value, 0.0);
    assert_eq!(snapshot.progress_pct, 0.0);
    assert_eq!(snapshot.goal_usd, 500.0);
    assert!(snapshot.token_balances.is_empty());
}

#[tokio::test]
async fn test_overfunded_campaign_caps_progress() {
    let engine = engine(
        vec![Ok(quotes(&[("usd-coin", 1.0), ("weth", 3000.0)]))],
        holdings(&[(WETH, U256::from(1_000_000_000_000_000_000u128))]),
    )
    .await;

    let snapshot = engine.portfolio(7, U256::from(1_000_000_000u64)).await;
    assert_eq!(snapshot.progress_pct, 100.0);
    assert!(snapshot.is_overfunded());
}

#[tokio::test]
async fn test_very_large_balance_is_valued_in_full() {
    let engine = engine(
        vec![Ok(quotes(&[("usd-coin", 1.0), ("wrapped-bitcoin", 2e7)]))],
        holdings(&[(USDC, U256::from(2_000_000_000_000_000_000u128))]),
    )
    .await;

    assert_eq!(engine.current_prices().usd("wrapped-bitcoin"), Some(2e7));

    let snapshot = engine.portfolio(7, U256::from(500_000_000u64)).await;
    assert_eq!(snapshot.total_usd_value, 2e12);
    assert_eq!(snapshot.status, SnapshotStatus::Complete);
    assert!(snapshot.token_balances[0].priced);
    assert_eq!(snapshot.progress_pct, 100.0);
}
