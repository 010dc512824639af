//! `Money`: an exact decimal value paired with a currency.

use crate::currency::Currency;
use crate::error::MoneyError;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// An exact decimal monetary amount tagged with its currency.
///
/// `Add`/`Sub` require equal currencies and fail with
/// [`MoneyError::CurrencyMismatch`] otherwise; crossing currencies goes
/// through [`Money::convert`] with an explicit rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, JsonSchema)]
pub struct Money {
    pub amount: Decimal,
    pub currency: Currency,
}

impl Money {
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub fn zero(currency: Currency) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.amount.is_sign_positive() && !self.amount.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    /// Render with an explicit sign, e.g. `+120.00 GBP` or `-45.50 USD`.
    pub fn signed_string(&self) -> String {
        let sign = if self.amount.is_sign_negative() { "-" } else { "+" };
        format!("{sign}{} {}", self.amount.abs(), self.currency)
    }

    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.require_same_currency(other)?;
        Ok(Money::new(self.amount + other.amount, self.currency))
    }

    pub fn sub(&self, other: &Money) -> Result<Money, MoneyError> {
        self.require_same_currency(other)?;
        Ok(Money::new(self.amount - other.amount, self.currency))
    }

    pub fn neg(&self) -> Money {
        Money::new(-self.amount, self.currency)
    }

    /// Scale by a plain decimal factor (e.g. a quantity), keeping the currency.
    pub fn scale(&self, factor: Decimal) -> Money {
        Money::new(self.amount * factor, self.currency)
    }

    /// Convert to another currency using an explicit exchange rate
    /// (units of `to` per unit of `self.currency`).
    pub fn convert(&self, rate: Decimal, to: Currency) -> Money {
        Money::new(self.amount * rate, to)
    }

    fn require_same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                left: self.currency.to_string(),
                right: other.currency.to_string(),
            });
        }
        Ok(())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            amount: Decimal,
            #[serde(default)]
            currency: Currency,
        }
        let raw = Raw::deserialize(deserializer)?;
        Ok(Money::new(raw.amount, raw.currency))
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}
