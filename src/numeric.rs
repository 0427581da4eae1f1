//! Exact decimal handling for wire values.
//!
//! Prices and volumes arrive as JSON strings (`"50251.20000"`); counters may
//! arrive as JSON numbers. Nothing here goes through `f64`: strings are parsed
//! with [`Decimal::from_str_exact`] and numbers through their JSON text.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value;

use crate::decode::DecodeError;

/// Rounding rule shared by book keys and checksum rendering.
///
/// Both must agree, otherwise a level stored under one key renders
/// differently in the digest.
const ROUNDING: RoundingStrategy = RoundingStrategy::MidpointNearestEven;

/// Parses a wire value (string or number) into an exact [`Decimal`].
pub fn parse_decimal(value: &Value, field: &'static str) -> Result<Decimal, DecodeError> {
    match value {
        Value::String(s) => decimal_from_str(s, field),
        Value::Number(n) => decimal_from_str(&n.to_string(), field),
        other => Err(DecodeError::InvalidDecimal {
            field,
            value: other.to_string(),
        }),
    }
}

/// Parses decimal text, accepting scientific notation as a fallback.
pub fn decimal_from_str(s: &str, field: &'static str) -> Result<Decimal, DecodeError> {
    Decimal::from_str_exact(s)
        .or_else(|_| Decimal::from_scientific(s))
        .or_else(|_| Decimal::from_str(s))
        .map_err(|_| DecodeError::InvalidDecimal {
            field,
            value: s.to_string(),
        })
}

/// Parses a non-negative integer counter sent as a number or a string.
pub fn parse_u64(value: &Value, field: &'static str) -> Result<u64, DecodeError> {
    match value {
        Value::Number(n) => n.as_u64().ok_or_else(|| DecodeError::InvalidInteger {
            field,
            value: n.to_string(),
        }),
        Value::String(s) => s.parse().map_err(|_| DecodeError::InvalidInteger {
            field,
            value: s.clone(),
        }),
        other => Err(DecodeError::InvalidInteger {
            field,
            value: other.to_string(),
        }),
    }
}

/// Rounds `value` to `precision` fractional digits with the shared rule.
pub fn round_fixed(value: Decimal, precision: u32) -> Decimal {
    value.round_dp_with_strategy(precision, ROUNDING)
}

/// Renders `value` with exactly `precision` fractional digits.
///
/// `50251.2` at precision 5 renders as `"50251.20000"`.
pub fn render_fixed(value: Decimal, precision: u32) -> String {
    let mut rounded = round_fixed(value, precision);
    rounded.rescale(precision);
    rounded.to_string()
}

/// Renders `value` the way the exchange feeds it into the book checksum:
/// fixed precision, decimal point removed, leading zeros stripped.
///
/// `"0.00000500"` becomes `"500"`.
pub fn checksum_digits(value: Decimal, precision: u32) -> String {
    let fixed = render_fixed(value, precision);
    let digits: String = fixed.chars().filter(|c| *c != '.' && *c != '-').collect();
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn parses_string_without_losing_trailing_zeros() {
        let d = parse_decimal(&json!("50251.20000"), "price").unwrap();
        assert_eq!(d, dec!(50251.2));
        assert_eq!(d.to_string(), "50251.20000");
    }

    #[test]
    fn parses_json_numbers_through_their_text() {
        assert_eq!(parse_decimal(&json!(11493), "count").unwrap(), dec!(11493));
        assert_eq!(parse_decimal(&json!(0.1), "x").unwrap(), dec!(0.1));
    }

    #[test]
    fn rejects_garbage() {
        let err = parse_decimal(&json!("12a.0"), "price").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidDecimal { field: "price", .. }));
        assert!(parse_decimal(&json!(null), "price").is_err());
    }

    #[test]
    fn counters_accept_numbers_and_strings() {
        assert_eq!(parse_u64(&json!(42), "n").unwrap(), 42);
        assert_eq!(parse_u64(&json!("974942666"), "c").unwrap(), 974_942_666);
        assert!(parse_u64(&json!(-1), "n").is_err());
    }

    #[test]
    fn renders_at_fixed_precision() {
        assert_eq!(render_fixed(dec!(50251.2), 5), "50251.20000");
        assert_eq!(render_fixed(dec!(0.000005), 8), "0.00000500");
        assert_eq!(render_fixed(dec!(1.234565), 5), "1.23456");
        assert_eq!(render_fixed(dec!(1.234575), 5), "1.23458");
    }

    #[test]
    fn checksum_digits_strip_point_and_leading_zeros() {
        assert_eq!(checksum_digits(dec!(0.05005), 5), "5005");
        assert_eq!(checksum_digits(dec!(0.000005), 8), "500");
        assert_eq!(checksum_digits(dec!(50251.2), 5), "5025120000");
        assert_eq!(checksum_digits(dec!(1.5), 8), "150000000");
    }
}
