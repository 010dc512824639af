//! Deterministic replay: folding a validated event sequence up to a date
//! into an immutable `Snapshot`.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::cost_basis::{LotTracker, Method};
use crate::date::Date;
use crate::error::LedgerError;
use crate::ids::SecurityId;
use crate::transaction::{parse_price_key, DividendAmount, PriceKey, SellQuantity, Transaction};
use ledger_money::{Currency, Money, Quantity};

#[derive(Debug, Clone)]
pub struct Declaration {
    pub id: SecurityId,
    pub currency: Currency,
}

/// An immutable derived state at a date `d`, produced by folding every event
/// with `when() <= d`. Cheap to construct, never mutated after construction.
#[derive(Debug, Clone)]
pub struct Snapshot {
    as_of: Date,
    reporting_currency: Currency,
    positions: HashMap<String, Quantity>,
    cash: HashMap<String, Money>,
    counterparties: HashMap<String, Money>,
    prices: HashMap<String, (Money, Date)>,
    fx_rates: HashMap<(String, String), (Decimal, Date)>,
    declarations: HashMap<String, Declaration>,
}

impl Snapshot {
    /// Fold `events` (assumed validated, sorted by date) up to and including
    /// `as_of`. `reporting_currency_fallback` is used when no `init` event
    /// has appeared by `as_of`.
    pub fn build(events: &[Transaction], as_of: Date, reporting_currency_fallback: Currency) -> Snapshot {
        let mut snapshot = Snapshot {
            as_of,
            reporting_currency: reporting_currency_fallback,
            positions: HashMap::new(),
            cash: HashMap::new(),
            counterparties: HashMap::new(),
            prices: HashMap::new(),
            fx_rates: HashMap::new(),
            declarations: HashMap::new(),
        };

        for tx in events {
            if tx.when().after(as_of) {
                break;
            }
            snapshot.apply(tx);
        }
        snapshot
    }

    fn apply(&mut self, tx: &Transaction) {
        match tx {
            Transaction::Init { reporting_currency, .. } => {
                self.reporting_currency = *reporting_currency;
            }
            Transaction::Declare { ticker, id, currency, .. } => {
                self.declarations.insert(
                    ticker.clone(),
                    Declaration { id: id.clone(), currency: *currency },
                );
                self.positions.entry(ticker.clone()).or_insert(Quantity::ZERO);
            }
            Transaction::Deposit { amount, settles, .. } => {
                self.credit_cash(*amount);
                if let Some(name) = settles {
                    self.adjust_counterparty(name, amount.neg());
                }
            }
            Transaction::Withdraw { amount, settles, .. } => {
                self.credit_cash(amount.neg());
                if let Some(name) = settles {
                    self.adjust_counterparty(name, *amount);
                }
            }
            Transaction::Buy { ticker, quantity, amount, .. } => {
                let position = self.positions.entry(ticker.clone()).or_insert(Quantity::ZERO);
                *position = position.add(*quantity);
                self.credit_cash(amount.neg());
            }
            Transaction::Sell { ticker, quantity, amount, .. } => {
                let resolved = match quantity {
                    SellQuantity::Exact(q) => *q,
                    SellQuantity::All => *self.positions.get(ticker).unwrap_or(&Quantity::ZERO),
                };
                let position = self.positions.entry(ticker.clone()).or_insert(Quantity::ZERO);
                *position = position.sub(resolved);
                self.credit_cash(*amount);
            }
            Transaction::Dividend { amount, .. } => {
                let total = match amount {
                    DividendAmount::Total(amount) => *amount,
                    // Unresolved per-share dividends should never reach replay;
                    // a validated ledger always carries the resolved total.
                    DividendAmount::PerShare(amount_per_share) => *amount_per_share,
                };
                self.credit_cash(total);
            }
            Transaction::Convert { from_amount, to_amount, .. } => {
                self.credit_cash(from_amount.neg());
                self.credit_cash(*to_amount);
            }
            Transaction::Accrue { counterparty, amount, .. } => {
                self.adjust_counterparty(counterparty, *amount);
            }
            Transaction::Split { ticker, numerator, denominator, .. } => {
                if let Some(position) = self.positions.get_mut(ticker) {
                    *position = position.apply_split(*numerator, *denominator);
                }
            }
            Transaction::UpdatePrice { date, prices, .. } => {
                for (key, price) in prices {
                    match parse_price_key(key) {
                        PriceKey::Ticker(ticker) => {
                            self.prices.insert(ticker, (Money::new(*price, self.security_currency(key)), *date));
                        }
                        PriceKey::Pair { from, to } => {
                            self.fx_rates.insert((from, to), (*price, *date));
                        }
                    }
                }
            }
        }
    }

    fn security_currency(&self, ticker: &str) -> Currency {
        self.declarations.get(ticker).map(|d| d.currency).unwrap_or(Currency::UNBOUND)
    }

    fn credit_cash(&mut self, amount: Money) {
        let entry = self.cash.entry(amount.currency.code().to_string()).or_insert(Money::zero(amount.currency));
        if let Ok(sum) = entry.add(&amount) {
            *entry = sum;
        }
    }

    fn adjust_counterparty(&mut self, name: &str, delta: Money) {
        let entry = self
            .counterparties
            .entry(name.to_string())
            .or_insert(Money::zero(delta.currency));
        if let Ok(sum) = entry.add(&delta) {
            *entry = sum;
        }
    }

    pub fn as_of(&self) -> Date {
        self.as_of
    }

    pub fn reporting_currency(&self) -> Currency {
        self.reporting_currency
    }

    pub fn position(&self, ticker: &str) -> Quantity {
        *self.positions.get(ticker).unwrap_or(&Quantity::ZERO)
    }

    pub fn price(&self, ticker: &str) -> Option<Money> {
        self.prices.get(ticker).map(|(money, _)| *money)
    }

    pub fn price_as_of(&self, ticker: &str) -> Option<(Money, Date)> {
        self.prices.get(ticker).copied()
    }

    pub fn market_value(&self, ticker: &str) -> Option<Money> {
        self.price(ticker).map(|price| price.scale(self.position(ticker).value()))
    }

    pub fn cash(&self, currency: Currency) -> Money {
        self.cash.get(currency.code()).copied().unwrap_or(Money::zero(currency))
    }

    pub fn counterparty(&self, name: &str) -> Option<Money> {
        self.counterparties.get(name).copied()
    }

    pub fn declarations(&self) -> impl Iterator<Item = (&String, &Declaration)> {
        self.declarations.iter()
    }

    pub fn tickers(&self) -> impl Iterator<Item = &String> {
        self.positions.keys()
    }

    /// Resolve the rate that converts one unit of `from` into `to`, trying
    /// in order: the direct pair, the inverse pair, and triangulation
    /// through the reporting currency.
    pub fn rate(&self, from: Currency, to: Currency) -> Result<Decimal, LedgerError> {
        if from == to {
            return Ok(Decimal::ONE);
        }
        let (from_code, to_code) = (from.code().to_string(), to.code().to_string());

        if let Some((rate, _)) = self.fx_rates.get(&(from_code.clone(), to_code.clone())) {
            return Ok(*rate);
        }
        if let Some((rate, _)) = self.fx_rates.get(&(to_code.clone(), from_code.clone())) {
            if rate.is_zero() {
                return Err(LedgerError::RateMissing { from: from_code, to: to_code, date: self.as_of.to_string() });
            }
            return Ok(Decimal::ONE / *rate);
        }

        let reporting = self.reporting_currency;
        if from != reporting && to != reporting {
            let from_to_reporting = self.rate(from, reporting);
            let reporting_to_target = self.rate(reporting, to);
            if let (Ok(a), Ok(b)) = (from_to_reporting, reporting_to_target) {
                return Ok(a * b);
            }
        }

        Err(LedgerError::RateMissing { from: from_code, to: to_code, date: self.as_of.to_string() })
    }

    /// Convert `money` into the reporting currency at this snapshot's date.
    pub fn convert(&self, money: Money) -> Result<Money, LedgerError> {
        let rate = self.rate(money.currency, self.reporting_currency)?;
        Ok(money.convert(rate, self.reporting_currency))
    }

    pub fn total_cash(&self) -> Result<Money, LedgerError> {
        let mut total = Money::zero(self.reporting_currency);
        for money in self.cash.values() {
            total = total.add(&self.convert(*money)?)?;
        }
        Ok(total)
    }

    pub fn total_counterparty(&self) -> Result<Money, LedgerError> {
        let mut total = Money::zero(self.reporting_currency);
        for money in self.counterparties.values() {
            total = total.add(&self.convert(*money)?)?;
        }
        Ok(total)
    }

    pub fn total_market(&self) -> Result<Money, LedgerError> {
        let mut total = Money::zero(self.reporting_currency);
        for ticker in self.positions.keys() {
            if let Some(value) = self.market_value(ticker) {
                total = total.add(&self.convert(value)?)?;
            }
        }
        Ok(total)
    }

    pub fn total_portfolio(&self) -> Result<Money, LedgerError> {
        let market = self.total_market()?;
        let cash = self.total_cash()?;
        let counterparty = self.total_counterparty()?;
        market.add(&cash)?.add(&counterparty).map_err(LedgerError::from)
    }

    /// Rebuild a lot book for `ticker` from scratch by folding every
    /// Buy/Sell/Split for it up to this snapshot's date — the O(N) cost the
    /// design deliberately accepts in exchange for never needing cached,
    /// invalidatable running state.
    pub fn unrealized_gain(&self, events: &[Transaction], ticker: &str, method: Method) -> Result<Money, LedgerError> {
        let currency = self.security_currency(ticker);
        let mut tracker = LotTracker::new(method, currency);
        for tx in events {
            if tx.when().after(self.as_of) {
                break;
            }
            apply_to_tracker(&mut tracker, tx, ticker)?;
        }
        let price = self.price(ticker).ok_or_else(|| {
            LedgerError::RateMissing { from: ticker.to_string(), to: self.reporting_currency.to_string(), date: self.as_of.to_string() }
        })?;
        tracker.unrealized(price)
    }

    pub fn total_unrealized_gain(&self, events: &[Transaction], method: Method) -> Result<Money, LedgerError> {
        let mut total = Money::zero(self.reporting_currency);
        for ticker in self.positions.keys() {
            if self.position(ticker).is_zero() {
                continue;
            }
            let gain = self.unrealized_gain(events, ticker, method)?;
            total = total.add(&self.convert(gain)?)?;
        }
        Ok(total)
    }
}

/// Replay the Buy/Sell/Split history of a single ticker into a lot tracker.
/// Shared by `Snapshot::unrealized_gain` and `review`'s realized-gain pass.
pub fn apply_to_tracker(tracker: &mut LotTracker, tx: &Transaction, ticker: &str) -> Result<(), LedgerError> {
    match tx {
        Transaction::Buy { ticker: t, quantity, amount, date, .. } if t == ticker => {
            tracker.buy(*quantity, *amount, *date)?;
        }
        Transaction::Sell { ticker: t, quantity, amount, .. } if t == ticker => {
            let resolved = match quantity {
                SellQuantity::Exact(q) => *q,
                SellQuantity::All => tracker.position(),
            };
            tracker.sell(resolved, *amount)?;
        }
        Transaction::Split { ticker: t, numerator, denominator, .. } if t == ticker => {
            tracker.apply_split(*numerator, *denominator);
        }
        _ => {}
    }
    Ok(())
}
