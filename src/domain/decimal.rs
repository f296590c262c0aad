//! Lossless decimal numeric type backed by rust_decimal.
//!
//! Provides canonical parsing from strings, formatting without exponent notation,
//! and conversion from raw on-chain integer amounts.

use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest mantissa a rust_decimal value can carry (2^96 - 1).
const MAX_MANTISSA: u128 = 79_228_162_514_264_337_593_543_950_335;

/// Largest scale rust_decimal supports.
const MAX_SCALE: u32 = 28;

/// Lossless decimal numeric type for financial calculations.
///
/// Backed by rust_decimal to avoid floating-point drift.
/// Serializes to a JSON string so persisted records round-trip exactly.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Decimal(#[serde(with = "rust_decimal::serde::str")] RustDecimal);

impl Decimal {
    /// Create a Decimal from a RustDecimal.
    pub fn new(value: RustDecimal) -> Self {
        Decimal(value)
    }

    /// Parse a Decimal from a string losslessly.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s).map(Decimal)
    }

    /// Format the Decimal as a canonical string (no exponent notation).
    pub fn to_canonical_string(&self) -> String {
        let normalized = self.0.normalize();
        format!("{}", normalized)
    }

    /// Get the underlying RustDecimal.
    pub fn inner(&self) -> RustDecimal {
        self.0
    }

    /// The additive identity (0).
    pub fn zero() -> Self {
        Decimal(RustDecimal::ZERO)
    }

    /// The multiplicative identity (1).
    pub fn one() -> Self {
        Decimal(RustDecimal::ONE)
    }

    /// Returns the value 100.
    pub fn hundred() -> Self {
        Decimal(RustDecimal::ONE_HUNDRED)
    }

    pub fn from_u64(value: u64) -> Self {
        Decimal(RustDecimal::from(value))
    }

    pub fn from_i64(value: i64) -> Self {
        Decimal(RustDecimal::from(value))
    }

    /// Convert a raw integer token amount into a decimal-adjusted value.
    ///
    /// Amounts wider than the 96-bit mantissa lose their least significant
    /// digits instead of failing.
    pub fn from_raw(raw: u128, decimals: u32) -> Self {
        let mut mantissa = raw;
        let mut scale = decimals;
        let mut exponent = 0u32;
        while mantissa > MAX_MANTISSA {
            mantissa /= 10;
            if scale > 0 {
                scale -= 1;
            } else {
                exponent += 1;
            }
        }
        while scale > MAX_SCALE {
            mantissa /= 10;
            scale -= 1;
        }
        let base = match RustDecimal::try_from_i128_with_scale(mantissa as i128, scale) {
            Ok(value) => value,
            Err(_) => return Decimal::zero(),
        };
        let mut value = Decimal(base);
        for _ in 0..exponent {
            value = value.saturating_mul(Decimal::from_u64(10));
        }
        value
    }

    /// 10^exp, saturating at the largest representable value.
    pub fn pow10(exp: u32) -> Self {
        let ten = Decimal::from_u64(10);
        (0..exp).fold(Decimal::one(), |acc, _| acc.saturating_mul(ten))
    }

    /// Returns true if the value is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the value is > 0.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    /// Returns true if the value is < 0.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    /// Absolute value.
    pub fn abs(&self) -> Self {
        Decimal(self.0.abs())
    }

    pub fn checked_add(self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_add(rhs.0).map(Decimal)
    }

    pub fn checked_sub(self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_sub(rhs.0).map(Decimal)
    }

    pub fn checked_mul(self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_mul(rhs.0).map(Decimal)
    }

    pub fn checked_div(self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_div(rhs.0).map(Decimal)
    }

    pub fn saturating_mul(self, rhs: Decimal) -> Decimal {
        Decimal(self.0.saturating_mul(rhs.0))
    }

    /// Division that yields zero for a zero denominator or an overflowing result.
    ///
    /// Every ratio in the valuation pipeline treats "undefined" as "unpriced".
    pub fn safe_div(self, rhs: Decimal) -> Decimal {
        if rhs.is_zero() {
            return Decimal::zero();
        }
        self.checked_div(rhs).unwrap_or_default()
    }

    /// Multiplication that yields zero on overflow.
    pub fn safe_mul(self, rhs: Decimal) -> Decimal {
        self.checked_mul(rhs).unwrap_or_default()
    }

    /// Round to `dp` decimal places using banker's rounding.
    pub fn round_dp(&self, dp: u32) -> Self {
        Decimal(self.0.round_dp(dp))
    }

    /// Integer part, if it fits in an i64.
    pub fn trunc_i64(&self) -> Option<i64> {
        use rust_decimal::prelude::ToPrimitive;
        self.0.trunc().to_i64()
    }

    pub fn max(self, other: Decimal) -> Decimal {
        if self >= other {
            self
        } else {
            other
        }
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Decimal {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<RustDecimal> for Decimal {
    fn from(value: RustDecimal) -> Self {
        Decimal(value)
    }
}

impl From<Decimal> for RustDecimal {
    fn from(value: Decimal) -> Self {
        value.0
    }
}

impl std::iter::Sum for Decimal {
    fn sum<I: Iterator<Item = Decimal>>(iter: I) -> Self {
        iter.fold(Decimal::zero(), |acc, v| acc + v)
    }
}

// Arithmetic operations
impl std::ops::Add for Decimal {
    type Output = Decimal;

    fn add(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for Decimal {
    fn add_assign(&mut self, rhs: Decimal) {
        self.0 += rhs.0;
    }
}

impl std::ops::Sub for Decimal {
    type Output = Decimal;

    fn sub(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 - rhs.0)
    }
}

impl std::ops::SubAssign for Decimal {
    fn sub_assign(&mut self, rhs: Decimal) {
        self.0 -= rhs.0;
    }
}

impl std::ops::Mul for Decimal {
    type Output = Decimal;

    fn mul(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 * rhs.0)
    }
}

impl std::ops::Div for Decimal {
    type Output = Decimal;

    fn div(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 / rhs.0)
    }
}

impl std::ops::Neg for Decimal {
    type Output = Decimal;

    fn neg(self) -> Decimal {
        Decimal(-self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_decimal_parse_roundtrip() {
        for s in ["123.456", "0.0001", "1000000", "-123.456", "0"] {
            let decimal = d(s);
            let reparsed = d(&decimal.to_canonical_string());
            assert_eq!(decimal, reparsed, "roundtrip failed for {}", s);
        }
    }

    #[test]
    fn test_decimal_json_is_string() {
        let json = serde_json::to_value(d("123.456")).unwrap();
        assert!(json.is_string());
        assert_eq!(json.as_str(), Some("123.456"));
        let back: Decimal = serde_json::from_value(json).unwrap();
        assert_eq!(back, d("123.456"));
    }

    #[test]
    fn test_from_raw_scales_by_decimals() {
        assert_eq!(Decimal::from_raw(1_500_000, 6), d("1.5"));
        assert_eq!(
            Decimal::from_raw(1_000_000_000_000_000_000_000, 18),
            d("1000")
        );
        assert_eq!(Decimal::from_raw(0, 18), Decimal::zero());
        assert_eq!(Decimal::from_raw(42, 0), d("42"));
    }

    #[test]
    fn test_from_raw_wide_amounts_keep_magnitude() {
        // 10^30 raw with 18 decimals is 10^12 whole units.
        let raw = 1_000_000_000_000_000_000_000_000_000_000u128;
        assert_eq!(Decimal::from_raw(raw, 18), d("1000000000000"));

        // Larger than the mantissa even with zero decimals.
        let huge = u128::MAX;
        let value = Decimal::from_raw(huge, 0);
        assert!(value > d("340282366920938463463374607"));
    }

    #[test]
    fn test_safe_div_zero_denominator() {
        assert_eq!(d("10").safe_div(Decimal::zero()), Decimal::zero());
        assert_eq!(d("10").safe_div(d("4")), d("2.5"));
    }

    #[test]
    fn test_pow10() {
        assert_eq!(Decimal::pow10(0), Decimal::one());
        assert_eq!(Decimal::pow10(6), d("1000000"));
        assert_eq!(Decimal::pow10(18), d("1000000000000000000"));
    }

    #[test]
    fn test_sum_and_assign_ops() {
        let total: Decimal = vec![d("1.5"), d("2.5"), d("-1")].into_iter().sum();
        assert_eq!(total, d("3"));

        let mut x = d("10");
        x += d("5");
        x -= d("2.5");
        assert_eq!(x, d("12.5"));
    }
}
