//! Fixed-point monetary amounts.

use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Monetary amount backed by a 96-bit fixed-point decimal.
///
/// Prices and line totals never pass through floating point, so sums of many
/// lines are exact.
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(Decimal);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Build an amount from an integer count of minor units (`scale` decimal places).
    pub fn from_minor(units: i64, scale: u32) -> Self {
        Self(Decimal::new(units, scale))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Multiply a unit price by a quantity.
    pub fn times(self, quantity: i64) -> DomainResult<Money> {
        self.0
            .checked_mul(Decimal::from(quantity))
            .map(Money)
            .ok_or_else(|| DomainError::invalid_amount(format!("{self} x {quantity} overflows")))
    }

    /// `None` when the sum leaves the representable range.
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl FromStr for Money {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim())
            .map(Money)
            .map_err(|e| DomainError::invalid_amount(format!("{s:?}: {e}")))
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn times_is_exact_for_cents() {
        let price: Money = "0.10".parse().unwrap();
        assert_eq!(price.times(3).unwrap(), "0.30".parse().unwrap());
    }

    #[test]
    fn parse_rejects_non_numeric() {
        assert!(matches!(
            "twelve".parse::<Money>(),
            Err(DomainError::InvalidAmount(_))
        ));
    }

    #[test]
    fn zero_is_not_negative() {
        assert!(!Money::ZERO.is_negative());
        assert!(Money::from_minor(-1, 2).is_negative());
    }

    #[test]
    fn checked_add_reports_overflow() {
        let huge: Money = "50000000000000000000000000000".parse().unwrap();
        assert_eq!(huge.checked_add(huge), None);
        assert_eq!(
            Money::from_minor(150, 2).checked_add(Money::from_minor(5, 2)),
            Some(Money::from_minor(155, 2))
        );
    }

    proptest! {
        /// Summing line totals matches multiplying in minor units.
        #[test]
        fn sum_of_line_totals_matches_integer_arithmetic(
            lines in proptest::collection::vec((0i64..1_000_000, 1i64..1_000), 1..20)
        ) {
            let total = lines
                .iter()
                .map(|(cents, qty)| Money::from_minor(*cents, 2).times(*qty).unwrap())
                .try_fold(Money::ZERO, Money::checked_add)
                .unwrap();
            let expected: i64 = lines.iter().map(|(cents, qty)| cents * qty).sum();
            prop_assert_eq!(total, Money::from_minor(expected, 2));
        }
    }
}
