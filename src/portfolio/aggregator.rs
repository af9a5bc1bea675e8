use alloy::primitives::U256;
use futures::future::join_all;
use log::{error, warn};

use super::campaigns::CampaignRegistry;
use crate::error::DIAGNOSTICS_TARGET;
use crate::pricing::UsdConverter;
use crate::tokens::{ResolutionSource, TokenResolver};
use crate::utils::{format_units, u256_to_f64};

/// Goals are always denominated in the reference stablecoin at this width.
pub const SETTLEMENT_DECIMALS: u8 = 6;

/// One non-zero token holding of a campaign.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenBalance {
    pub token_address: String,
    pub symbol: String,
    pub raw_amount: U256,
    pub decimals: u8,
    pub balance_formatted: String,
    pub usd_value: f64,
    /// False when no USD price could be located (`usd_value` is then 0)
    pub priced: bool,
    pub resolution: ResolutionSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum SnapshotStatus {
    /// Every holding was priced
    Complete,
    /// At least one holding had no price; the total is a lower bound
    Partial,
    /// The registry could not be read; everything is zeroed
    RegistryUnavailable,
}

/// USD view of a campaign's holdings at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSnapshot {
    pub total_usd_value: f64,
    pub goal_usd: f64,
    pub raised_usd: f64,
    /// Funding progress, clamped to `[0, 100]`
    pub progress_pct: f64,
    pub token_balances: Vec<TokenBalance>,
    pub status: SnapshotStatus,
}

impl PortfolioSnapshot {
    fn zero(goal_usd: f64, status: SnapshotStatus) -> Self {
        Self {
            total_usd_value: 0.0,
            goal_usd,
            raised_usd: 0.0,
            progress_pct: 0.0,
            token_balances: Vec::new(),
            status,
        }
    }

    /// Uncapped comparison; `progress_pct` alone cannot show overfunding.
    pub fn is_overfunded(&self) -> bool {
        self.goal_usd > 0.0 && self.raised_usd > self.goal_usd
    }

    /// Symbols of the tokens currently held, in holding order.
    pub fn held_symbols(&self) -> Vec<String> {
        self.token_balances
            .iter()
            .map(|b| b.symbol.clone())
            .collect()
    }
}

/// Progress percentage, clamped for display.
pub fn progress_pct(raised_usd: f64, goal_usd: f64) -> f64 {
    if goal_usd > 0.0 && raised_usd.is_finite() {
        ((raised_usd / goal_usd) * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Values a campaign's token holdings in USD.
///
/// Per-token failures (unknown token, missing price) contribute 0 and are logged. Only a
/// failed registry read zeroes the whole snapshot.
#[derive(Clone)]
pub struct PortfolioAggregator {
    resolver: TokenResolver,
    converter: UsdConverter,
}

impl PortfolioAggregator {
    pub fn new(resolver: TokenResolver, converter: UsdConverter) -> Self {
        Self {
            resolver,
            converter,
        }
    }

    pub async fn calculate_portfolio_value(
        &self,
        campaign_id: u64,
        goal_amount_raw: U256,
        token_balance_source: &dyn CampaignRegistry,
    ) -> PortfolioSnapshot {
        let goal_usd = u256_to_f64(goal_amount_raw, SETTLEMENT_DECIMALS);

        let balances = match token_balance_source.campaign_token_balances(campaign_id).await {
            Ok(balances) => balances,
            Err(e) => {
                error!(
                    target: DIAGNOSTICS_TARGET,
                    "registry_fetch_failed campaign={} error={}", campaign_id, e
                );
                return PortfolioSnapshot::zero(goal_usd, SnapshotStatus::RegistryUnavailable);
            },
        };

        if balances.addresses.len() != balances.balances.len() {
            warn!(
                "Campaign {} returned {} token addresses but {} balances, ignoring the excess",
                campaign_id,
                balances.addresses.len(),
                balances.balances.len()
            );
        }

        // Zero balances are not part of the portfolio
        let held: Vec<(&String, U256)> = balances
            .addresses
            .iter()
            .zip(balances.balances.iter().copied())
            .filter(|(_, balance)| !balance.is_zero())
            .collect();

        // Resolve concurrently; join_all keeps input order so totals are reproducible
        let resolved = join_all(
            held.iter()
                .map(|(address, _)| self.resolver.resolve_detailed(address)),
        )
        .await;

        let mut token_balances = Vec::with_capacity(held.len());
        let mut total_usd_value = 0.0;
        let mut all_priced = true;

        for ((address, raw_amount), token) in held.into_iter().zip(resolved) {
            let conversion =
                self.converter
                    .convert_detailed(raw_amount, address, Some(&token.config));

            total_usd_value += conversion.usd_value;
            all_priced &= conversion.has_price();

            token_balances.push(TokenBalance {
                token_address: address.to_lowercase(),
                symbol: token.config.symbol.clone(),
                raw_amount,
                decimals: token.config.decimals,
                balance_formatted: format_units(raw_amount, token.config.decimals),
                usd_value: conversion.usd_value,
                priced: conversion.has_price(),
                resolution: token.source,
            });
        }

        PortfolioSnapshot {
            total_usd_value,
            goal_usd,
            raised_usd: total_usd_value,
            progress_pct: progress_pct(total_usd_value, goal_usd),
            token_balances,
            status: if all_priced {
                SnapshotStatus::Complete
            } else {
                SnapshotStatus::Partial
            },
        }
    }
}
