//! USD sanity checks.
//!
//! Only values that cannot be displayed (negative, NaN, infinite) are rejected. Large but
//! finite figures pass through unchanged.

/// Validate a USD price quote.
/// Returns Some(price) if usable, None if negative or non-finite.
#[inline]
pub fn validate_usd_price(price: f64) -> Option<f64> {
    (price >= 0.0 && price.is_finite()).then_some(price)
}

/// Validate a USD value computed from a balance.
/// Returns None if negative or non-finite, so callers can treat the holding as unpriced.
#[inline]
pub fn validate_usd_value(value: f64) -> Option<f64> {
    (value >= 0.0 && value.is_finite()).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_bounds() {
        assert_eq!(validate_usd_price(0.0), Some(0.0));
        assert_eq!(validate_usd_price(3000.0), Some(3000.0));
        assert_eq!(validate_usd_price(2e7), Some(2e7));
        assert_eq!(validate_usd_price(-1.0), None);
        assert_eq!(validate_usd_price(f64::NAN), None);
    }

    #[test]
    fn test_value_bounds() {
        assert_eq!(validate_usd_value(250.0), Some(250.0));
        assert_eq!(validate_usd_value(2e12), Some(2e12));
        assert_eq!(validate_usd_value(f64::INFINITY), None);
        assert_eq!(validate_usd_value(-0.5), None);
    }
}
