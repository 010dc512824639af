//! `Ledger`: the ordered, validated container of events.
//!
//! Validation mutates events in place (resolving sell-all quantities,
//! binding currencies) rather than only accumulating errors/warnings
//! alongside an untouched input.

use std::io::{BufRead, Write};

use crate::codec;
use crate::date::Date;
use crate::error::LedgerError;
use crate::transaction::Transaction;
use crate::validation::validate_all;
use ledger_money::Currency;

/// An ordered, validated sequence of events plus the reporting currency
/// resolved from its (optional) `Init` event.
#[derive(Debug, Clone)]
pub struct Ledger {
    events: Vec<Transaction>,
    reporting_currency_fallback: Currency,
}

impl Ledger {
    /// An empty ledger. `reporting_currency_fallback` is used by snapshots
    /// and reviews if no `Init` event ever appears.
    pub fn new(reporting_currency_fallback: Currency) -> Self {
        Ledger { events: Vec::new(), reporting_currency_fallback }
    }

    /// Append events without validating. Callers that need a validated
    /// ledger should follow with `validate()`.
    pub fn append(&mut self, events: impl IntoIterator<Item = Transaction>) {
        self.events.extend(events);
    }

    /// Read a full event stream and validate it, replacing this ledger's
    /// events with the normalized result.
    #[tracing::instrument(skip(self, reader))]
    pub fn decode_validate(&mut self, reader: impl BufRead) -> Result<(), LedgerError> {
        let decoded = codec::decode(reader)?;
        self.events = validate_all(decoded)?;
        Ok(())
    }

    /// Re-run validation over the current events, replacing them with the
    /// normalized (quick-fixed) result.
    pub fn validate(&mut self) -> Result<(), LedgerError> {
        let events = std::mem::take(&mut self.events);
        self.events = validate_all(events)?;
        Ok(())
    }

    /// Canonical write of the current events.
    pub fn encode(&self, writer: &mut impl Write) -> Result<(), LedgerError> {
        codec::encode(writer, &self.events)
    }

    pub fn events(&self) -> &[Transaction] {
        &self.events
    }

    /// Direct mutable access for in-crate callers that need to merge or
    /// rewrite events in place (the market-data pipeline). Not exposed
    /// outside the crate: external callers go through `append`/`validate`.
    pub(crate) fn events_mut(&mut self) -> &mut Vec<Transaction> {
        &mut self.events
    }

    pub fn reporting_currency_fallback(&self) -> Currency {
        self.reporting_currency_fallback
    }

    /// The reporting currency as of `date`: the latest `Init` at or before
    /// that date, or the fallback.
    pub fn reporting_currency(&self, date: Date) -> Currency {
        self.events
            .iter()
            .filter(|tx| !tx.when().after(date))
            .find_map(|tx| match tx {
                Transaction::Init { reporting_currency, .. } => Some(*reporting_currency),
                _ => None,
            })
            .unwrap_or(self.reporting_currency_fallback)
    }

    /// Events matching `predicate`, in ledger order.
    pub fn transactions<'a>(&'a self, predicate: impl Fn(&Transaction) -> bool + 'a) -> impl Iterator<Item = &'a Transaction> {
        self.events.iter().filter(move |tx| predicate(tx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_money::{Currency, Money};
    use rust_decimal_macros::dec;

    fn eur() -> Currency {
        Currency::from_code("EUR").expect("valid")
    }

    #[test]
    fn decode_validate_sorts_and_normalizes() {
        let input = concat!(
            "{\"command\":\"deposit\",\"date\":\"2025-01-02\",\"amount\":\"1000\",\"currency\":\"EUR\"}\n",
            "{\"command\":\"init\",\"date\":\"2025-01-01\",\"currency\":\"EUR\"}\n",
        );
        let mut ledger = Ledger::new(eur());
        ledger.decode_validate(input.as_bytes()).expect("valid");
        assert_eq!(ledger.events().len(), 2);
        assert!(matches!(ledger.events()[0], Transaction::Init { .. }));
    }

    #[test]
    fn encode_after_append_and_validate_round_trips() {
        let mut ledger = Ledger::new(eur());
        ledger.append([Transaction::Deposit {
            date: Date::from_ymd(2025, 1, 1).expect("valid"),
            amount: Money::new(dec!(500), eur()),
            settles: None,
            memo: None,
        }]);
        ledger.validate().expect("valid");
        let mut buf = Vec::new();
        ledger.encode(&mut buf).expect("encodes");
        let mut round = Ledger::new(eur());
        round.decode_validate(buf.as_slice()).expect("valid");
        assert_eq!(round.events(), ledger.events());
    }

    #[test]
    fn reporting_currency_falls_back_before_init() {
        let ledger = Ledger::new(eur());
        assert_eq!(ledger.reporting_currency(Date::from_ymd(2025, 1, 1).expect("valid")), eur());
    }

    #[test]
    fn transactions_filters_by_predicate() {
        let mut ledger = Ledger::new(eur());
        ledger.append([
            Transaction::Deposit { date: Date::from_ymd(2025, 1, 1).expect("valid"), amount: Money::new(dec!(100), eur()), settles: None, memo: None },
            Transaction::Withdraw { date: Date::from_ymd(2025, 1, 2).expect("valid"), amount: Money::new(dec!(50), eur()), settles: None, memo: None },
        ]);
        let deposits: Vec<_> = ledger.transactions(|tx| tx.kind() == "deposit").collect();
        assert_eq!(deposits.len(), 1);
    }
}
