//! Balance and voting weight amounts.
//!
//! Amounts are fixed-point integers (u128 raw units) to avoid floating-point errors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

/// Raw units per nano (10^30).
const NANO_RAW: u128 = 10u128.pow(30);

/// An account balance or representative weight in raw units.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Self = Self(0);
    pub const MAX: Self = Self(u128::MAX);

    pub const fn raw(raw: u128) -> Self {
        Self(raw)
    }

    /// `n` whole nano. Saturates at `Amount::MAX`.
    pub const fn nano(n: u128) -> Self {
        Self(n.saturating_mul(NANO_RAW))
    }

    pub fn number(&self) -> u128 {
        self.0
    }

    /// Whole nano, rounded down.
    pub fn to_nano(&self) -> u128 {
        self.0 / NANO_RAW
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// `self * numerator / denominator` without intermediate overflow.
    ///
    /// Splits `self` into quotient and remainder by `denominator` so the
    /// product never exceeds u128 for `numerator <= denominator`.
    pub fn scale(self, numerator: u128, denominator: u128) -> Self {
        if denominator == 0 {
            return Self::ZERO;
        }
        let whole = (self.0 / denominator).saturating_mul(numerator);
        let part = (self.0 % denominator).saturating_mul(numerator) / denominator;
        Self(whole.saturating_add(part))
    }

    pub fn to_be_bytes(&self) -> [u8; 16] {
        self.0.to_be_bytes()
    }

    pub fn from_be_bytes(bytes: [u8; 16]) -> Self {
        Self(u128::from_be_bytes(bytes))
    }
}

impl Add for Amount {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Amount {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, a| acc.saturating_add(a))
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl From<u128> for Amount {
    fn from(raw: u128) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} raw", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn nano_conversion() {
        assert_eq!(Amount::nano(1).number(), NANO_RAW);
        assert_eq!(Amount::nano(u128::MAX), Amount::MAX);
    }

    #[test]
    fn scale_small_values() {
        assert_eq!(Amount::raw(100).scale(67, 100), Amount::raw(67));
        assert_eq!(Amount::raw(150).scale(67, 100), Amount::raw(100));
        assert_eq!(Amount::raw(1).scale(67, 100), Amount::ZERO);
    }

    #[test]
    fn scale_max_does_not_overflow() {
        let scaled = Amount::MAX.scale(67, 100);
        assert!(scaled < Amount::MAX);
        assert!(scaled > Amount::MAX.scale(66, 100));
    }

    #[test]
    fn sum_saturates() {
        let total: Amount = [Amount::MAX, Amount::raw(1)].iter().sum();
        assert_eq!(total, Amount::MAX);
    }

    proptest! {
        #[test]
        fn scale_matches_wide_arithmetic(raw in any::<u64>(), pct in 0u128..=100) {
            let expected = (raw as u128) * pct / 100;
            prop_assert_eq!(Amount::raw(raw as u128).scale(pct, 100).number(), expected);
        }
    }
}
