//! Best-effort token identity for donation records that lack it.
//!
//! A raw integer is ambiguous across widths (`100000000` is 100 USDC or 1 WBTC), so each
//! candidate token's width is tried against a per-symbol plausible range, with tokens the
//! campaign currently holds tried first. Overlapping ranges are resolved purely by that
//! order. The result is for display grouping only.

use std::sync::Arc;

use alloy::primitives::U256;
use log::debug;

use super::campaigns::RawDonation;
use crate::error::DIAGNOSTICS_TARGET;
use crate::tokens::{TokenConfig, TokenRegistry};
use crate::utils::{format_units, u256_to_f64_safe};

/// How a donation's token identity was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum MatchConfidence {
    /// The record carried its own token metadata
    Explicit,
    /// A candidate's plausible range matched
    Heuristic,
    /// Nothing matched; reference stablecoin assumed
    Default,
}

/// Donation with an attached token identity.
#[derive(Debug, Clone, PartialEq)]
pub struct DonationRecord {
    pub donor: String,
    pub raw_amount: U256,
    pub timestamp_sec: u64,
    /// Empty when the token has no known address
    pub token_address: String,
    pub symbol: String,
    pub decimals: u8,
    pub amount_formatted: String,
    pub confidence: MatchConfidence,
}

impl DonationRecord {
    fn from_raw(raw: RawDonation, token: &TokenConfig, confidence: MatchConfidence) -> Self {
        Self {
            amount_formatted: format_units(raw.raw_amount, token.decimals),
            donor: raw.donor,
            raw_amount: raw.raw_amount,
            timestamp_sec: raw.timestamp_sec,
            token_address: token.address.clone().unwrap_or_default(),
            symbol: token.symbol.clone(),
            decimals: token.decimals,
            confidence,
        }
    }
}

/// Donations summed per matched symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolTotal {
    pub symbol: String,
    pub decimals: u8,
    pub raw_total: U256,
    pub count: usize,
}

impl SymbolTotal {
    pub fn formatted(&self) -> String {
        format_units(self.raw_total, self.decimals)
    }
}

/// Group matched donations by symbol and width, in first-seen order.
pub fn totals_by_symbol(records: &[DonationRecord]) -> Vec<SymbolTotal> {
    let mut totals: Vec<SymbolTotal> = Vec::new();

    for record in records {
        match totals
            .iter_mut()
            .find(|t| t.symbol == record.symbol && t.decimals == record.decimals)
        {
            Some(total) => {
                total.raw_total = total.raw_total.saturating_add(record.raw_amount);
                total.count += 1;
            },
            None => totals.push(SymbolTotal {
                symbol: record.symbol.clone(),
                decimals: record.decimals,
                raw_total: record.raw_amount,
                count: 1,
            }),
        }
    }

    totals
}

#[derive(Debug, Clone)]
pub struct DonationTokenMatcher {
    registry: Arc<TokenRegistry>,
}

impl DonationTokenMatcher {
    pub fn new(registry: Arc<TokenRegistry>) -> Self {
        Self { registry }
    }

    /// Registry tokens ordered with currently held symbols first, otherwise registry order.
    pub fn candidates(&self, held_symbols: &[String]) -> Vec<&TokenConfig> {
        let is_held = |token: &TokenConfig| {
            held_symbols
                .iter()
                .any(|s| s.eq_ignore_ascii_case(&token.symbol))
        };

        let mut ordered: Vec<&TokenConfig> = self.registry.tokens().iter().collect();
        ordered.sort_by_key(|token| !is_held(token));
        ordered
    }

    /// Attach a token identity to every donation.
    ///
    /// `held_symbols` are the symbols of the campaign's current holdings, usually from
    /// [`PortfolioSnapshot::held_symbols`](super::PortfolioSnapshot::held_symbols).
    pub fn match_tokens(
        &self,
        donations: Vec<RawDonation>,
        held_symbols: &[String],
    ) -> Vec<DonationRecord> {
        let candidates = self.candidates(held_symbols);

        donations
            .into_iter()
            .map(|donation| self.match_one(donation, &candidates))
            .collect()
    }

    fn match_one(&self, donation: RawDonation, candidates: &[&TokenConfig]) -> DonationRecord {
        if let Some(token) = self.explicit_token(&donation) {
            return DonationRecord::from_raw(donation, &token, MatchConfidence::Explicit);
        }

        let matched = candidates.iter().find(|token| {
            let Some(range) = self.registry.reasonable_range(&token.symbol) else {
                return false;
            };
            u256_to_f64_safe(donation.raw_amount, token.decimals)
                .is_some_and(|value| range.contains(value))
        });

        match matched {
            Some(token) => {
                debug!(
                    target: DIAGNOSTICS_TARGET,
                    "heuristic_donation_match donor={} raw={} symbol={}",
                    donation.donor,
                    donation.raw_amount,
                    token.symbol
                );
                DonationRecord::from_raw(donation, token, MatchConfidence::Heuristic)
            },
            None => {
                let reference = self.registry.reference_token();
                debug!(
                    target: DIAGNOSTICS_TARGET,
                    "heuristic_donation_match donor={} raw={} symbol={} defaulted=true",
                    donation.donor,
                    donation.raw_amount,
                    reference.symbol
                );
                DonationRecord::from_raw(donation, reference, MatchConfidence::Default)
            },
        }
    }

    /// Token metadata already present on the record, if it is complete enough to trust.
    fn explicit_token(&self, donation: &RawDonation) -> Option<TokenConfig> {
        let address = donation
            .token_address
            .as_deref()
            .filter(|a| !a.is_empty());

        if let Some(token) = address.and_then(|a| self.registry.lookup_by_address(a)) {
            return Some(token.clone());
        }

        let symbol = donation.symbol.as_deref().filter(|s| !s.is_empty())?;
        let known = self.registry.lookup_by_symbol(symbol);
        let decimals = donation.decimals.or(known.map(|t| t.decimals))?;

        Some(TokenConfig::new(
            known.map_or_else(|| symbol.to_string(), |t| t.name.clone()),
            symbol.to_string(),
            decimals,
            address
                .map(str::to_string)
                .or_else(|| known.and_then(|t| t.address.clone())),
            known.and_then(|t| t.price_feed_id.clone()),
        ))
    }
}
