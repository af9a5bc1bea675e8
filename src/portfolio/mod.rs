//! Campaign-level valuation: holdings, donation history and the decimal heuristics.

pub mod aggregator;
pub mod campaigns;
pub mod disambiguator;
pub mod donations;

pub use aggregator::{
    progress_pct, PortfolioAggregator, PortfolioSnapshot, SnapshotStatus, TokenBalance,
    SETTLEMENT_DECIMALS,
};
pub use campaigns::{
    CampaignRegistry, CampaignSummary, OnChainCampaignRegistry, RawDonation, TokenBalances,
};
pub use disambiguator::{
    Confidence, DecimalDisambiguator, DecimalGuess, CANDIDATE_DECIMALS, MAX_SCORE,
    PREFERRED_DECIMALS,
};
pub use donations::{
    totals_by_symbol, DonationRecord, DonationTokenMatcher, MatchConfidence, SymbolTotal,
};
