//! `Quantity`: an exact decimal number of shares, with no currency.

use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A number of shares. Split-adjusted by the replay engine — never stored
/// pre-adjusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Quantity(Decimal);

impl Quantity {
    pub const ZERO: Quantity = Quantity(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn add(&self, other: Quantity) -> Quantity {
        Quantity(self.0 + other.0)
    }

    pub fn sub(&self, other: Quantity) -> Quantity {
        Quantity(self.0 - other.0)
    }

    /// Apply a `numerator/denominator` split ratio.
    pub fn apply_split(&self, numerator: u64, denominator: u64) -> Quantity {
        Quantity(self.0 * Decimal::from(numerator) / Decimal::from(denominator))
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::iter::Sum for Quantity {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Quantity::ZERO, |acc, q| acc.add(q))
    }
}
