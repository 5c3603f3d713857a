//! Fixed-point helpers shared by the ledger and the billing wire types
//!
//! Credits are rounded half away from zero to a fixed number of fractional
//! digits. Gas spend is reported in native token units and shifted to the
//! chain's smallest unit before conversion.

use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Fractional digits kept for credit amounts
pub const DEFAULT_PRECISION: u32 = 10;

/// Decimals of an EVM native token (wei per ether)
pub const DEFAULT_GAS_TOKEN_DECIMALS: u32 = 18;

/// Round a credit amount to `dp` fractional digits
#[inline]
pub fn round_to(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Multiply `value` by `10^exp`, failing on overflow
pub fn shift(value: Decimal, exp: u32) -> Option<Decimal> {
    (0..exp).try_fold(value, |acc, _| acc.checked_mul(Decimal::TEN))
}

/// Parse a decimal string as sent over the wire
///
/// Accepts plain (`"12.5"`) and scientific (`"1.25e1"`) notation.
pub fn parse(raw: &str) -> Result<Decimal, rust_decimal::Error> {
    let raw = raw.trim();
    Decimal::from_str(raw).or_else(|err| {
        if raw.contains(['e', 'E']) {
            Decimal::from_scientific(raw)
        } else {
            Err(err)
        }
    })
}

/// Format a decimal for the wire without trailing zeros
pub fn format(value: Decimal) -> String {
    value.normalize().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(round_to(dec!(0.00000000005), 10), dec!(0.0000000001));
        assert_eq!(round_to(dec!(-0.00000000005), 10), dec!(-0.0000000001));
        assert_eq!(round_to(dec!(2.5), 0), dec!(3));
    }

    #[test]
    fn test_shift() {
        assert_eq!(shift(dec!(0.000000001), 18), Some(dec!(1000000000)));
        assert_eq!(shift(dec!(1.5), 0), Some(dec!(1.5)));
        assert_eq!(shift(Decimal::MAX, 1), None);
    }

    #[test]
    fn test_parse() {
        assert_eq!(parse("12.5").unwrap(), dec!(12.5));
        assert_eq!(parse(" 3 ").unwrap(), dec!(3));
        assert_eq!(parse("1.25e1").unwrap(), dec!(12.5));
        assert!(parse("abc").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn test_format_strips_trailing_zeros() {
        assert_eq!(format(dec!(1.5000)), "1.5");
        assert_eq!(format(dec!(100)), "100");
    }
}
