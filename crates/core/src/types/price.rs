//! Kenyan shilling amounts using decimal arithmetic.
//!
//! Every price in the shop is quoted in KES. Catalog and cart pages show whole
//! shillings (`Ksh 1,250`), the payment page shows cents (`Ksh 1,250.00`) and
//! M-Pesa is charged the floor of the total in whole shillings.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A price in Kenyan shillings.
///
/// Serialized as a JSON number, which is what the remote API sends and expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(#[serde(with = "rust_decimal::serde::float")] Decimal);

impl Price {
    /// Zero shillings.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a decimal amount of shillings.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from a whole number of shillings.
    #[must_use]
    pub fn from_shillings(shillings: i64) -> Self {
        Self(Decimal::from(shillings))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// The amount floored to whole shillings.
    ///
    /// M-Pesa only accepts whole-shilling amounts.
    #[must_use]
    pub fn whole_shillings(&self) -> i64 {
        self.0.floor().to_i64().unwrap_or(0)
    }

    /// Multiply by a line quantity.
    #[must_use]
    pub fn times(&self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }

    /// Apply a percentage discount (0-100).
    #[must_use]
    pub fn discounted(&self, percent: Decimal) -> Self {
        if percent <= Decimal::ZERO {
            return *self;
        }
        let factor = (Decimal::ONE_HUNDRED - percent.min(Decimal::ONE_HUNDRED)) / Decimal::ONE_HUNDRED;
        Self(self.0 * factor)
    }

    /// Format rounded to whole shillings, e.g. `Ksh 1,250`.
    #[must_use]
    pub fn display(&self) -> String {
        let rounded = self
            .0
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        format_ksh(rounded, 0)
    }

    /// Format with two decimal places, e.g. `Ksh 1,250.00`.
    #[must_use]
    pub fn display_exact(&self) -> String {
        let rounded = self
            .0
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        format_ksh(rounded, 2)
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Price {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// Render an already-rounded amount with thousands separators.
fn format_ksh(amount: Decimal, decimals: usize) -> String {
    let negative = amount.is_sign_negative() && !amount.is_zero();
    let text = format!("{:.*}", decimals, amount.abs());
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), ""));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if negative { "-" } else { "" };
    if fraction.is_empty() {
        format!("{sign}Ksh {grouped}")
    } else {
        format!("{sign}Ksh {grouped}.{fraction}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn price(s: &str) -> Price {
        Price::new(Decimal::from_str(s).unwrap())
    }

    #[test]
    fn test_display_whole_shillings() {
        assert_eq!(price("0").display(), "Ksh 0");
        assert_eq!(price("999").display(), "Ksh 999");
        assert_eq!(price("1250").display(), "Ksh 1,250");
        assert_eq!(price("1234567.49").display(), "Ksh 1,234,567");
        assert_eq!(price("2.5").display(), "Ksh 3");
    }

    #[test]
    fn test_display_exact() {
        assert_eq!(price("1250").display_exact(), "Ksh 1,250.00");
        assert_eq!(price("1250.5").display_exact(), "Ksh 1,250.50");
        assert_eq!(price("-40").display_exact(), "-Ksh 40.00");
    }

    #[test]
    fn test_whole_shillings_floors() {
        assert_eq!(price("1499.99").whole_shillings(), 1499);
        assert_eq!(price("200").whole_shillings(), 200);
    }

    #[test]
    fn test_arithmetic() {
        let total: Price = [price("100"), price("250.50")].into_iter().sum();
        assert_eq!(total, price("350.50"));
        assert_eq!(price("120").times(3), price("360"));
        assert_eq!(price("1000").discounted(Decimal::from(15)), price("850"));
        assert_eq!(price("1000").discounted(Decimal::ZERO), price("1000"));
    }

    #[test]
    fn test_serde_uses_json_numbers() {
        let json = serde_json::to_string(&price("120.5")).unwrap();
        assert_eq!(json, "120.5");
        let parsed: Price = serde_json::from_str("1500.0").unwrap();
        assert_eq!(parsed, price("1500"));
    }
}
