use std::time::Duration;

use alloy::primitives::{Address, U256};
use alloy::providers::DynProvider;
use async_trait::async_trait;

use crate::abis::ICampaignRegistry;
use crate::error::ValuationError;

/// Campaign record as listed by the registry contract.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignSummary {
    pub id: u64,
    pub owner: String,
    pub title: String,
    /// Goal in raw units of the reference stablecoin
    pub goal: U256,
    /// Raw total of all donations, width unknown when several tokens were donated
    pub total_donated: U256,
    pub deadline: u64,
}

/// Historical donation, possibly without token metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDonation {
    pub donor: String,
    pub raw_amount: U256,
    pub timestamp_sec: u64,
    pub token_address: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
}

impl RawDonation {
    /// A donation with no token metadata at all.
    pub fn untagged(donor: &str, raw_amount: U256, timestamp_sec: u64) -> Self {
        Self {
            donor: donor.to_lowercase(),
            raw_amount,
            timestamp_sec,
            token_address: None,
            symbol: None,
            decimals: None,
        }
    }
}

/// Parallel arrays of token addresses and raw balances held by a campaign.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenBalances {
    pub addresses: Vec<String>,
    pub balances: Vec<U256>,
}

/// Read side of the campaign registry.
#[async_trait]
pub trait CampaignRegistry: Send + Sync {
    async fn list_campaigns(&self) -> Result<Vec<CampaignSummary>, ValuationError>;

    async fn campaign_donations(&self, campaign_id: u64) -> Result<Vec<RawDonation>, ValuationError>;

    async fn campaign_token_balances(&self, campaign_id: u64) -> Result<TokenBalances, ValuationError>;
}

/// Registry contract reached over JSON-RPC.
#[derive(Clone)]
pub struct OnChainCampaignRegistry {
    provider: DynProvider,
    address: Address,
    call_timeout: Duration,
}

impl OnChainCampaignRegistry {
    pub fn new(provider: DynProvider, address: Address, call_timeout: Duration) -> Self {
        Self {
            provider,
            address,
            call_timeout,
        }
    }
}

fn lower_hex(address: Address) -> String {
    address.to_string().to_lowercase()
}

fn registry_error(method: &str, e: impl std::fmt::Display) -> ValuationError {
    ValuationError::RegistryFetchFailed(format!("{method}: {e}"))
}

#[async_trait]
impl CampaignRegistry for OnChainCampaignRegistry {
    async fn list_campaigns(&self) -> Result<Vec<CampaignSummary>, ValuationError> {
        let contract = ICampaignRegistry::new(self.address, &self.provider);
        let campaigns = tokio::time::timeout(self.call_timeout, contract.getCampaigns().call())
            .await
            .map_err(|_| registry_error("getCampaigns", "timed out"))?
            .map_err(|e| registry_error("getCampaigns", e))?;

        Ok(campaigns
            .into_iter()
            .map(|c| CampaignSummary {
                id: c.id.saturating_to::<u64>(),
                owner: lower_hex(c.owner),
                title: c.title,
                goal: c.goal,
                total_donated: c.totalDonated,
                deadline: c.deadline.saturating_to::<u64>(),
            })
            .collect())
    }

    async fn campaign_donations(&self, campaign_id: u64) -> Result<Vec<RawDonation>, ValuationError> {
        let contract = ICampaignRegistry::new(self.address, &self.provider);
        let donations = tokio::time::timeout(
            self.call_timeout,
            contract.getCampaignDonations(U256::from(campaign_id)).call(),
        )
        .await
        .map_err(|_| registry_error("getCampaignDonations", "timed out"))?
        .map_err(|e| registry_error("getCampaignDonations", e))?;

        Ok(donations
            .into_iter()
            .map(|d| {
                RawDonation::untagged(
                    &lower_hex(d.donor),
                    d.amount,
                    d.timestamp.saturating_to::<u64>(),
                )
            })
            .collect())
    }

    async fn campaign_token_balances(&self, campaign_id: u64) -> Result<TokenBalances, ValuationError> {
        let contract = ICampaignRegistry::new(self.address, &self.provider);
        let result = tokio::time::timeout(
            self.call_timeout,
            contract.getCampaignTokenBalances(U256::from(campaign_id)).call(),
        )
        .await
        .map_err(|_| registry_error("getCampaignTokenBalances", "timed out"))?
        .map_err(|e| registry_error("getCampaignTokenBalances", e))?;

        Ok(TokenBalances {
            addresses: result.tokens.into_iter().map(lower_hex).collect(),
            balances: result.balances,
        })
    }
}
