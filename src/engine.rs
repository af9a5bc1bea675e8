use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, ProviderBuilder};
use log::{error, info};
use url::Url;

use crate::config::Settings;
use crate::error::{ValuationError, DIAGNOSTICS_TARGET};
use crate::portfolio::{
    progress_pct, CampaignRegistry, CampaignSummary, DecimalDisambiguator, DecimalGuess,
    DonationRecord, DonationTokenMatcher, OnChainCampaignRegistry, PortfolioAggregator,
    PortfolioSnapshot, SnapshotStatus,
};
use crate::pricing::{
    HttpPriceFeed, PriceCache, PriceSnapshot, RefreshOutcome, SystemClock, UsdConverter,
};
use crate::tokens::{ChainIntrospector, TokenIntrospector, TokenRegistry, TokenResolver};

/// Timeout for campaign registry reads
const REGISTRY_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Where a funding figure came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FundingSource {
    /// Valued from the campaign's token holdings
    Portfolio(SnapshotStatus),
    /// Holdings unavailable; the raw donated total was valued at a guessed width
    Heuristic(DecimalGuess),
}

impl FundingSource {
    pub fn is_heuristic(&self) -> bool {
        matches!(self, FundingSource::Heuristic(_))
    }
}

/// Display-ready funding figures for one campaign.
#[derive(Debug, Clone, PartialEq)]
pub struct FundingProgress {
    pub campaign_id: u64,
    pub goal_usd: f64,
    pub raised_usd: f64,
    pub progress_pct: f64,
    pub source: FundingSource,
    pub portfolio: PortfolioSnapshot,
}

impl FundingProgress {
    pub fn is_overfunded(&self) -> bool {
        self.goal_usd > 0.0 && self.raised_usd > self.goal_usd
    }
}

/// Wires the registry, price cache, resolver and campaign reads together.
///
/// Every valuation method degrades to a defined default instead of failing; only
/// construction returns errors.
pub struct ValuationEngine {
    registry: Arc<TokenRegistry>,
    prices: Arc<PriceCache>,
    feed_ids: Vec<String>,
    aggregator: PortfolioAggregator,
    matcher: DonationTokenMatcher,
    disambiguator: DecimalDisambiguator,
    campaigns: Arc<dyn CampaignRegistry>,
}

impl ValuationEngine {
    pub fn new(
        registry: Arc<TokenRegistry>,
        prices: Arc<PriceCache>,
        introspector: Option<Arc<dyn TokenIntrospector>>,
        campaigns: Arc<dyn CampaignRegistry>,
    ) -> Self {
        let resolver = TokenResolver::new(registry.clone(), introspector);
        let converter = UsdConverter::new(registry.clone(), prices.clone());

        Self {
            feed_ids: registry.price_feed_ids(),
            aggregator: PortfolioAggregator::new(resolver, converter),
            matcher: DonationTokenMatcher::new(registry.clone()),
            disambiguator: DecimalDisambiguator::from_registry(&registry),
            registry,
            prices,
            campaigns,
        }
    }

    /// Build the live engine: HTTP price feed plus a JSON-RPC provider shared by token
    /// introspection and the campaign registry. Nothing is fetched until [`start`](Self::start).
    pub fn from_settings(settings: &Settings) -> Result<Self, ValuationError> {
        let registry = Arc::new(TokenRegistry::from_settings(
            &settings.tokens,
            &settings.reference_symbol,
        )?);

        let url = Url::parse(&settings.chain.rpc_url)
            .map_err(|e| ValuationError::Config(format!("chain.rpc_url: {e}")))?;
        let provider = DynProvider::new(ProviderBuilder::new().connect_http(url));

        let registry_address = Address::from_str(&settings.chain.campaign_registry_address)
            .map_err(|e| {
                ValuationError::Config(format!("chain.campaign_registry_address: {e}"))
            })?;

        let introspection_timeout = Duration::from_millis(settings.chain.introspection_timeout_ms);

        let prices = Arc::new(PriceCache::new(
            Arc::new(HttpPriceFeed::new(&settings.price_feed)?),
            Arc::new(SystemClock),
            registry.price_feed_ids(),
            Duration::from_secs(settings.price_feed.refresh_interval_secs),
        ));

        let introspector: Arc<dyn TokenIntrospector> =
            Arc::new(ChainIntrospector::new(provider.clone(), introspection_timeout));
        let campaigns: Arc<dyn CampaignRegistry> = Arc::new(OnChainCampaignRegistry::new(
            provider,
            registry_address,
            REGISTRY_CALL_TIMEOUT,
        ));

        info!(
            "Valuation engine configured with {} tokens, reference {}",
            registry.tokens().len(),
            registry.reference_token().symbol
        );

        Ok(Self::new(registry, prices, Some(introspector), campaigns))
    }

    /// Start the background price refresh.
    pub fn start(&self) {
        self.prices.start();
    }

    pub async fn stop(&self) {
        self.prices.stop().await;
    }

    /// One refresh outside the background loop.
    pub async fn refresh_prices(&self) -> RefreshOutcome {
        self.prices.refresh(&self.feed_ids).await
    }

    pub fn current_prices(&self) -> Arc<PriceSnapshot> {
        self.prices.current_prices()
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    pub async fn list_campaigns(&self) -> Result<Vec<CampaignSummary>, ValuationError> {
        self.campaigns.list_campaigns().await
    }

    pub async fn portfolio(&self, campaign_id: u64, goal_amount_raw: U256) -> PortfolioSnapshot {
        self.aggregator
            .calculate_portfolio_value(campaign_id, goal_amount_raw, self.campaigns.as_ref())
            .await
    }

    /// Funding figures for a campaign, from its holdings when there are any.
    ///
    /// With no holdings but a non-zero on-chain donated total, the total is valued at the
    /// disambiguator's guessed width as reference-stablecoin dollars.
    pub async fn campaign_progress(&self, campaign: &CampaignSummary) -> FundingProgress {
        let portfolio = self.portfolio(campaign.id, campaign.goal).await;

        if portfolio.token_balances.is_empty() && !campaign.total_donated.is_zero() {
            let guess = self
                .disambiguator
                .disambiguate(campaign.goal, campaign.total_donated);

            return FundingProgress {
                campaign_id: campaign.id,
                goal_usd: guess.goal,
                raised_usd: guess.donated,
                progress_pct: progress_pct(guess.donated, guess.goal),
                source: FundingSource::Heuristic(guess),
                portfolio,
            };
        }

        FundingProgress {
            campaign_id: campaign.id,
            goal_usd: portfolio.goal_usd,
            raised_usd: portfolio.raised_usd,
            progress_pct: portfolio.progress_pct,
            source: FundingSource::Portfolio(portfolio.status),
            portfolio,
        }
    }

    /// Donation history with token identities attached, held tokens tried first.
    ///
    /// A failed registry read yields an empty history.
    pub async fn match_donations(&self, campaign_id: u64) -> Vec<DonationRecord> {
        let donations = match self.campaigns.campaign_donations(campaign_id).await {
            Ok(donations) => donations,
            Err(e) => {
                error!(
                    target: DIAGNOSTICS_TARGET,
                    "registry_fetch_failed campaign={} error={}", campaign_id, e
                );
                return Vec::new();
            },
        };

        if donations.is_empty() {
            return Vec::new();
        }

        // Goal is irrelevant here, only the held symbols are used
        let held = self.portfolio(campaign_id, U256::ZERO).await.held_symbols();

        self.matcher.match_tokens(donations, &held)
    }
}
