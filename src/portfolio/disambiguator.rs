//! Heuristic decimal-width guess for campaigns whose raw totals carry no token identity.
//!
//! This is an approximation, used only when no per-token portfolio data exists. The result
//! carries a [`Confidence`] so callers never present it as ground truth.

use alloy::primitives::U256;
use log::info;

use crate::error::DIAGNOSTICS_TARGET;
use crate::tokens::TokenRegistry;
use crate::utils::u256_to_f64_safe;

/// Widths of the settlement tokens.
pub const CANDIDATE_DECIMALS: [u8; 3] = [6, 8, 18];

/// Width preferred on ties (the primary settlement stablecoin).
pub const PREFERRED_DECIMALS: u8 = 6;

/// Goal must be strictly positive and below this, in human units.
const MAX_PLAUSIBLE_GOAL: f64 = 1e7;
/// Donated total must be below this, in human units.
const MAX_PLAUSIBLE_DONATED: f64 = 1e9;
/// Donated/goal ratio must be below this.
const MAX_PLAUSIBLE_OVERFUNDING: f64 = 1_000.0;

/// Maximum score a candidate can reach.
pub const MAX_SCORE: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Confidence {
    /// Every plausibility check passed
    High,
    Medium,
    Low,
}

impl Confidence {
    fn from_score(score: u8) -> Self {
        match score {
            s if s >= MAX_SCORE => Confidence::High,
            2 => Confidence::Medium,
            _ => Confidence::Low,
        }
    }
}

/// Chosen width plus the values it implies.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct DecimalGuess {
    pub decimals: u8,
    pub score: u8,
    pub confidence: Confidence,
    /// Goal in human units at `decimals`
    pub goal: f64,
    /// Donated total in human units at `decimals`
    pub donated: f64,
}

/// Picks the most plausible width for a `(goal, donated)` pair among a fixed candidate set.
#[derive(Debug, Clone)]
pub struct DecimalDisambiguator {
    /// Tried in order; the first candidate with the top score wins
    candidates: Vec<u8>,
}

impl Default for DecimalDisambiguator {
    fn default() -> Self {
        Self::new(&CANDIDATE_DECIMALS, PREFERRED_DECIMALS)
    }
}

impl DecimalDisambiguator {
    /// Candidates are tried preferred-width first, then ascending.
    pub fn new(candidates: &[u8], preferred: u8) -> Self {
        let mut ordered: Vec<u8> = candidates.to_vec();
        ordered.sort_unstable();
        ordered.dedup();
        ordered.sort_by_key(|d| *d != preferred);

        Self { candidates: ordered }
    }

    /// Candidate widths taken from the registry's tokens, preferring the reference token.
    pub fn from_registry(registry: &TokenRegistry) -> Self {
        let widths: Vec<u8> = registry.tokens().iter().map(|t| t.decimals).collect();
        Self::new(&widths, registry.reference_token().decimals)
    }

    pub fn candidates(&self) -> &[u8] {
        &self.candidates
    }

    /// Score one width; a value that cannot be represented scores 0.
    pub fn score(goal: U256, donated: U256, decimals: u8) -> u8 {
        let (Some(goal_val), Some(donated_val)) = (
            u256_to_f64_safe(goal, decimals),
            u256_to_f64_safe(donated, decimals),
        ) else {
            return 0;
        };

        let mut score = 0;
        if goal_val > 0.0 && goal_val < MAX_PLAUSIBLE_GOAL {
            score += 1;
        }
        if (0.0..MAX_PLAUSIBLE_DONATED).contains(&donated_val) {
            score += 1;
        }
        if donated_val / goal_val.max(1.0) < MAX_PLAUSIBLE_OVERFUNDING {
            score += 1;
        }
        score
    }

    /// Best-scoring width. Ties go to the earlier candidate (preferred, then ascending).
    pub fn disambiguate(&self, goal: U256, donated: U256) -> DecimalGuess {
        let mut best: Option<(u8, u8)> = None;

        for &decimals in &self.candidates {
            let score = Self::score(goal, donated, decimals);
            match best {
                Some((_, top)) if score <= top => {},
                _ => best = Some((decimals, score)),
            }
        }

        let (decimals, score) = best.unwrap_or((PREFERRED_DECIMALS, 0));
        let guess = DecimalGuess {
            decimals,
            score,
            confidence: Confidence::from_score(score),
            goal: u256_to_f64_safe(goal, decimals).unwrap_or(0.0),
            donated: u256_to_f64_safe(donated, decimals).unwrap_or(0.0),
        };

        info!(
            target: DIAGNOSTICS_TARGET,
            "heuristic_decimals goal={} donated={} decimals={} score={}",
            goal,
            donated,
            guess.decimals,
            guess.score
        );

        guess
    }
}
