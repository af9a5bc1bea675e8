//! Type conversion and formatting utilities.
//!
//! Raw token amounts stay in integer form until the final decimal shift, so balances
//! above 2^53 are not truncated before they are scaled down.

use alloy::primitives::{utils, U256};
use bigdecimal::BigDecimal;
use num_bigint::{BigInt, Sign};
use num_traits::ToPrimitive;

/// Convert a raw U256 amount into an exact decimal at the given width.
///
/// `1_500_000` at 6 decimals becomes `1.500000` with no rounding.
pub fn u256_to_big_decimal(value: U256, decimals: u8) -> BigDecimal {
    // Convert via bytes (faster than string parsing)
    let bytes: [u8; 32] = value.to_le_bytes();
    let big_int = BigInt::from_bytes_le(Sign::Plus, &bytes);

    BigDecimal::new(big_int, decimals as i64)
}

/// Convert U256 to f64 with decimal adjustment.
///
/// # Returns
/// * The adjusted f64 value, or 0.0 if conversion fails
///
/// # Example
/// ```ignore
/// let value = U256::from(1_000_000_000_000_000_000u128); // 1e18
/// let adjusted = u256_to_f64(value, 18); // Returns 1.0
/// ```
pub fn u256_to_f64(value: U256, decimals: u8) -> f64 {
    u256_to_f64_safe(value, decimals).unwrap_or(0.0)
}

/// Convert U256 to f64 with decimal adjustment, returning Option for error handling.
///
/// Returns None if the value cannot be represented as a finite f64.
pub fn u256_to_f64_safe(value: U256, decimals: u8) -> Option<f64> {
    let result = u256_to_big_decimal(value, decimals).to_f64()?;

    if result.is_finite() {
        Some(result)
    } else {
        None
    }
}

/// Human-readable rendering of a raw amount, e.g. `"250.000000"` for 250 USDC.
///
/// Falls back to the raw integer if the width is not a valid unit.
pub fn format_units(value: U256, decimals: u8) -> String {
    utils::format_units(value, decimals).unwrap_or_else(|_| value.to_string())
}
