//! Numeric helpers shared by the valuation engine.
//!
//! - [`conversion`] - U256 to decimal/f64 conversions at a given token width
//! - [`validation`] - Sanity checks for USD prices and values

mod conversion;
mod validation;

pub use conversion::{format_units, u256_to_big_decimal, u256_to_f64, u256_to_f64_safe};

pub use validation::{validate_usd_price, validate_usd_value};
