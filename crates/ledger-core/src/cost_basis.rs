//! Cost-basis and realized-gain tracking: AVERAGE and FIFO lot trackers.
//!
//! Both trackers work entirely in the security's own currency; conversion to
//! the reporting currency happens one level up, in `review`, using the rate
//! at the relevant date (sell date for realized, valuation date for
//! unrealized) — never the rate at acquisition.

use std::collections::VecDeque;

use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::date::Date;
use crate::error::LedgerError;
use ledger_money::{Currency, Money, Quantity};

/// Which lot-matching convention realizes gains on a Sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// A single weighted-average lot per ticker.
    Average,
    /// An ordered queue of lots, consumed head-first (oldest first).
    Fifo,
}

impl Method {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "average" | "avg" => Some(Method::Average),
            "fifo" => Some(Method::Fifo),
            _ => None,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Average => write!(f, "average"),
            Method::Fifo => write!(f, "fifo"),
        }
    }
}

/// A single acquisition lot: quantity remaining, per-share cost, and the
/// date it was acquired (used only to prove FIFO ordering; AVERAGE collapses
/// all lots into one).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lot {
    pub quantity: Quantity,
    pub unit_cost: Money,
    pub acquired: Date,
}

/// The result of realizing a Sell against held lots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Realization {
    pub proceeds: Money,
    pub cost_basis: Money,
    pub gain: Money,
}

/// Per-ticker lot book. One instance tracks exactly one security in exactly
/// one currency.
#[derive(Debug, Clone, PartialEq)]
pub enum LotTracker {
    Average { quantity: Quantity, total_cost: Money },
    Fifo { lots: VecDeque<Lot> },
}

impl LotTracker {
    pub fn new(method: Method, currency: Currency) -> Self {
        match method {
            Method::Average => LotTracker::Average {
                quantity: Quantity::ZERO,
                total_cost: Money::zero(currency),
            },
            Method::Fifo => LotTracker::Fifo { lots: VecDeque::new() },
        }
    }

    pub fn position(&self) -> Quantity {
        match self {
            LotTracker::Average { quantity, .. } => *quantity,
            LotTracker::Fifo { lots } => lots.iter().map(|l| l.quantity).sum(),
        }
    }

    /// Average per-share cost of the current position, in the security's
    /// currency. Returns `None` when the position is flat.
    pub fn average_cost(&self, currency: Currency) -> Option<Money> {
        let position = self.position();
        if position.is_zero() {
            return None;
        }
        let total = match self {
            LotTracker::Average { total_cost, .. } => *total_cost,
            LotTracker::Fifo { lots } => lots.iter().fold(Money::zero(currency), |acc, lot| {
                acc.add(&lot.unit_cost.scale(lot.quantity.value())).unwrap_or(acc)
            }),
        };
        Some(total.scale(Decimal::ONE / position.value()))
    }

    pub fn buy(&mut self, quantity: Quantity, total_cost: Money, date: Date) -> Result<(), LedgerError> {
        match self {
            LotTracker::Average { quantity: q, total_cost: c } => {
                *q = q.add(quantity);
                *c = c.add(&total_cost)?;
            }
            LotTracker::Fifo { lots } => {
                let unit_cost = total_cost.scale(Decimal::ONE / quantity.value());
                lots.push_back(Lot { quantity, unit_cost, acquired: date });
            }
        }
        Ok(())
    }

    /// Realize a sell of `quantity` shares for `proceeds`. Caller has already
    /// checked `quantity <= position()`.
    pub fn sell(&mut self, quantity: Quantity, proceeds: Money) -> Result<Realization, LedgerError> {
        let cost_basis = match self {
            LotTracker::Average { quantity: q, total_cost: c } => {
                if q.is_zero() {
                    return Err(LedgerError::validation("sell against an empty average lot book"));
                }
                let avg = c.scale(Decimal::ONE / q.value());
                let basis = avg.scale(quantity.value());
                *q = q.sub(quantity);
                *c = c.sub(&basis)?;
                basis
            }
            LotTracker::Fifo { lots } => consume_fifo(lots, quantity, proceeds.currency)?,
        };
        let gain = proceeds.sub(&cost_basis)?;
        Ok(Realization { proceeds, cost_basis, gain })
    }

    /// Unrealized gain of the current position at `price` (per-share, in the
    /// security's currency).
    pub fn unrealized(&self, price: Money) -> Result<Money, LedgerError> {
        let position = self.position();
        if position.is_zero() {
            return Ok(Money::zero(price.currency));
        }
        let market_value = price.scale(position.value());
        let cost = match self.average_cost(price.currency) {
            Some(avg) => avg.scale(position.value()),
            None => Money::zero(price.currency),
        };
        market_value.sub(&cost)
    }

    /// Rewrite all held lots for a `numerator:denominator` split: quantity
    /// scales by `num/den`, per-share cost scales by `den/num` (total cost
    /// preserved).
    pub fn apply_split(&mut self, numerator: u64, denominator: u64) {
        let num = Decimal::from(numerator);
        let den = Decimal::from(denominator);
        match self {
            LotTracker::Average { quantity, .. } => {
                *quantity = quantity.apply_split(numerator, denominator);
            }
            LotTracker::Fifo { lots } => {
                for lot in lots.iter_mut() {
                    lot.quantity = lot.quantity.apply_split(numerator, denominator);
                    lot.unit_cost = lot.unit_cost.scale(den / num);
                }
            }
        }
    }
}

fn consume_fifo(lots: &mut VecDeque<Lot>, mut remaining: Quantity, currency: Currency) -> Result<Money, LedgerError> {
    let mut cost_basis = Money::zero(currency);
    while !remaining.is_zero() {
        let Some(head) = lots.front_mut() else {
            return Err(LedgerError::validation("sell exceeds lots available in FIFO book"));
        };
        if head.quantity.value() <= remaining.value() {
            cost_basis = cost_basis.add(&head.unit_cost.scale(head.quantity.value()))?;
            remaining = remaining.sub(head.quantity);
            lots.pop_front();
        } else {
            cost_basis = cost_basis.add(&head.unit_cost.scale(remaining.value()))?;
            head.quantity = head.quantity.sub(remaining);
            remaining = Quantity::ZERO;
        }
    }
    Ok(cost_basis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn eur() -> Currency {
        Currency::from_code("EUR").expect("valid")
    }

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd(y, m, day).expect("valid date")
    }

    #[test]
    fn average_realizes_weighted_basis() {
        let mut tracker = LotTracker::new(Method::Average, eur());
        tracker.buy(Quantity::new(dec!(10)), Money::new(dec!(800), eur()), d(2025, 1, 3)).unwrap();
        let realized = tracker.sell(Quantity::new(dec!(10)), Money::new(dec!(1000), eur())).unwrap();
        assert_eq!(realized.gain.amount, dec!(200));
    }

    #[test]
    fn fifo_consumes_oldest_lot_first() {
        let mut tracker = LotTracker::new(Method::Fifo, eur());
        tracker.buy(Quantity::new(dec!(10)), Money::new(dec!(500), eur()), d(2024, 1, 10)).unwrap(); // 50/share
        tracker.buy(Quantity::new(dec!(10)), Money::new(dec!(1000), eur()), d(2024, 6, 10)).unwrap(); // 100/share
        let realized = tracker.sell(Quantity::new(dec!(15)), Money::new(dec!(1200), eur())).unwrap();
        // 10 @ 50 + 5 @ 100 = 1000 cost basis
        assert_eq!(realized.cost_basis.amount, dec!(1000));
        assert_eq!(realized.gain.amount, dec!(200));
    }

    #[test]
    fn split_scales_quantity_and_divides_unit_cost() {
        let mut tracker = LotTracker::new(Method::Fifo, eur());
        tracker.buy(Quantity::new(dec!(10)), Money::new(dec!(500), eur()), d(2024, 1, 10)).unwrap();
        tracker.apply_split(2, 1);
        assert_eq!(tracker.position().value(), dec!(20));
        let LotTracker::Fifo { lots } = &tracker else { panic!("fifo") };
        assert_eq!(lots[0].unit_cost.amount, dec!(25));
    }

    #[test]
    fn split_before_sell_fifo_scenario() {
        let mut tracker = LotTracker::new(Method::Fifo, eur());
        tracker.buy(Quantity::new(dec!(10)), Money::new(dec!(500), eur()), d(2024, 1, 10)).unwrap();
        tracker.buy(Quantity::new(dec!(10)), Money::new(dec!(1000), eur()), d(2024, 6, 10)).unwrap();
        tracker.apply_split(2, 1);
        let realized = tracker.sell(Quantity::new(dec!(15)), Money::new(dec!(1200), eur())).unwrap();
        // post-split: lot1 = 20 @ 25, lot2 = 20 @ 50. Sell 15 from lot1: 15*25=375
        assert_eq!(realized.cost_basis.amount, dec!(375));
        assert_eq!(realized.gain.amount, dec!(825));
    }

    #[test]
    fn unrealized_uses_average_cost_times_position() {
        let mut tracker = LotTracker::new(Method::Average, eur());
        tracker.buy(Quantity::new(dec!(10)), Money::new(dec!(800), eur()), d(2025, 1, 3)).unwrap();
        let unrealized = tracker.unrealized(Money::new(dec!(100), eur())).unwrap();
        assert_eq!(unrealized.amount, dec!(200));
    }

    #[test]
    fn oversell_on_fifo_is_an_error() {
        let mut tracker = LotTracker::new(Method::Fifo, eur());
        tracker.buy(Quantity::new(dec!(5)), Money::new(dec!(500), eur()), d(2024, 1, 10)).unwrap();
        assert!(tracker.sell(Quantity::new(dec!(10)), Money::new(dec!(1200), eur())).is_err());
    }
}
