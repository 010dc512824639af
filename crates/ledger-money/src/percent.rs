//! `Percent`: an exact decimal rate, rendered with two decimals and a sign.

use rust_decimal::{Decimal, RoundingStrategy};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Percent(Decimal);

impl Percent {
    pub const ZERO: Percent = Percent(Decimal::ZERO);

    /// Construct from a fractional ratio (e.g. `0.05` for 5%).
    pub fn from_ratio(ratio: Decimal) -> Self {
        Self(ratio * Decimal::ONE_HUNDRED)
    }

    pub fn ratio(&self) -> Decimal {
        self.0 / Decimal::ONE_HUNDRED
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl std::fmt::Display for Percent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rounded = self.0.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let sign = if rounded.is_sign_negative() { "" } else { "+" };
        write!(f, "{sign}{rounded:.2}%")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn from_ratio_converts_to_percent_points() {
        assert_eq!(Percent::from_ratio(dec!(0.0523)).value(), dec!(5.23));
    }

    #[test]
    fn display_always_shows_sign_and_two_decimals() {
        assert_eq!(Percent::from_ratio(dec!(0.05)).to_string(), "+5.00%");
        assert_eq!(Percent::from_ratio(dec!(-0.0523)).to_string(), "-5.23%");
        assert_eq!(Percent::ZERO.to_string(), "+0.00%");
    }
}
