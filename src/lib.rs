pub mod abis;
pub mod config;
pub mod engine;
pub mod error;
pub mod portfolio;
pub mod pricing;
pub mod tokens;
pub mod utils;

pub use crate::config::Settings;
pub use engine::{FundingProgress, FundingSource, ValuationEngine};
pub use error::{ValuationError, DIAGNOSTICS_TARGET};
pub use portfolio::{PortfolioAggregator, PortfolioSnapshot, SnapshotStatus, TokenBalance};
pub use pricing::{PriceCache, PriceSnapshot, UsdConverter};
pub use tokens::{TokenConfig, TokenRegistry, TokenResolver};
