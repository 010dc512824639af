//! Market-data update pipeline: merge a batch of `UpdatePrice`/`Split`/
//! `Dividend` facts into a ledger idempotently and report what changed.
//!
//! Structurally the sibling of the validator's `ValidationResult`
//! errors/warnings split: two parallel accumulators (`added`/`updated`)
//! filled while walking the batch, keyed per event kind.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;

use crate::date::Date;
use crate::error::LedgerError;
use crate::ledger::Ledger;
use crate::transaction::{parse_price_key, PriceKey, Transaction};

/// Change counts from a market-data merge, one entry per event kind
/// touched (`"update-price"`, `"split"`, `"dividend"`).
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MarketDataSummary {
    pub added: HashMap<&'static str, usize>,
    pub updated: HashMap<&'static str, usize>,
}

impl MarketDataSummary {
    fn record_added(&mut self, kind: &'static str) {
        *self.added.entry(kind).or_insert(0) += 1;
    }

    fn record_updated(&mut self, kind: &'static str) {
        *self.updated.entry(kind).or_insert(0) += 1;
    }
}

/// Merge `incoming` facts into `ledger`'s event log. Only `UpdatePrice`,
/// `Split`, and `Dividend` events are accepted; anything else is a
/// `Validation` error. The caller should re-run `ledger.validate()`
/// afterward — this pass only merges and refuses undeclared tickers, it
/// does not repeat the validator's full invariant set.
#[tracing::instrument(skip(ledger, incoming))]
pub fn update_market_data(ledger: &mut Ledger, incoming: Vec<Transaction>) -> Result<MarketDataSummary, LedgerError> {
    let declared = declared_tickers(ledger.events());
    let mut summary = MarketDataSummary::default();

    for tx in incoming {
        match tx {
            Transaction::UpdatePrice { date, prices, memo } => {
                merge_update_price(ledger, date, prices, memo, &declared, &mut summary)?;
            }
            Transaction::Split { date, ticker, numerator, denominator, memo } => {
                require_declared(&declared, &ticker, date)?;
                merge_keyed(ledger, "split", date, &ticker, Transaction::Split { date, ticker, numerator, denominator, memo }, &mut summary);
            }
            Transaction::Dividend { date, ticker, amount, memo } => {
                require_declared(&declared, &ticker, date)?;
                merge_keyed(ledger, "dividend", date, &ticker, Transaction::Dividend { date, ticker, amount, memo }, &mut summary);
            }
            other => {
                return Err(LedgerError::validation(format!(
                    "market-data update only accepts update-price, split, or dividend events, got '{}'",
                    other.kind()
                )));
            }
        }
    }
    Ok(summary)
}

fn declared_tickers(events: &[Transaction]) -> HashMap<String, Date> {
    let mut map = HashMap::new();
    for tx in events {
        if let Transaction::Declare { ticker, date, .. } = tx {
            map.entry(ticker.clone()).or_insert(*date);
        }
    }
    map
}

fn require_declared(declared: &HashMap<String, Date>, ticker: &str, date: Date) -> Result<(), LedgerError> {
    match declared.get(ticker) {
        Some(declared_on) if !declared_on.after(date) => Ok(()),
        _ => Err(LedgerError::validation(format!(
            "market-data update for '{ticker}' precedes its declaration"
        ))),
    }
}

/// Coalesce an incoming `UpdatePrice` into the same-date event already in
/// the ledger, if one exists; otherwise append a new one. Ticker keys
/// (not currency-pair keys) must be declared by `date`.
fn merge_update_price(
    ledger: &mut Ledger,
    date: Date,
    incoming_prices: BTreeMap<String, Decimal>,
    memo: Option<String>,
    declared: &HashMap<String, Date>,
    summary: &mut MarketDataSummary,
) -> Result<(), LedgerError> {
    for key in incoming_prices.keys() {
        if let PriceKey::Ticker(ticker) = parse_price_key(key) {
            require_declared(declared, &ticker, date)?;
        }
    }

    let events = ledger.events_mut();
    let existing_index = events.iter().position(|tx| matches!(tx, Transaction::UpdatePrice { date: d, .. } if *d == date));

    match existing_index {
        Some(index) => {
            let Transaction::UpdatePrice { prices, memo: existing_memo, .. } = &mut events[index] else {
                unreachable!("index matched on UpdatePrice above")
            };
            for (key, price) in incoming_prices {
                if prices.contains_key(&key) {
                    summary.record_updated("update-price");
                } else {
                    summary.record_added("update-price");
                }
                prices.insert(key, price);
            }
            if existing_memo.is_none() {
                *existing_memo = memo;
            }
        }
        None => {
            for _ in incoming_prices.keys() {
                summary.record_added("update-price");
            }
            events.push(Transaction::UpdatePrice { date, prices: incoming_prices, memo });
            crate::ordering::sort_by_date(events, |tx| tx.when());
        }
    }
    Ok(())
}

/// Overwrite an existing `(date, kind, ticker)` event in place, or append
/// a new one, for single-keyed kinds (`split`, `dividend`).
fn merge_keyed(ledger: &mut Ledger, kind: &'static str, date: Date, ticker: &str, replacement: Transaction, summary: &mut MarketDataSummary) {
    let events = ledger.events_mut();
    let position = events.iter().position(|tx| {
        tx.kind() == kind
            && tx.when() == date
            && match tx {
                Transaction::Split { ticker: t, .. } => t == ticker,
                Transaction::Dividend { ticker: t, .. } => t == ticker,
                _ => false,
            }
    });
    match position {
        Some(index) => {
            events[index] = replacement;
            summary.record_updated(kind);
        }
        None => {
            events.push(replacement);
            crate::ordering::sort_by_date(events, |tx| tx.when());
            summary.record_added(kind);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::DividendAmount;
    use ledger_money::{Currency, Money};
    use rust_decimal_macros::dec;

    fn eur() -> Currency {
        Currency::from_code("EUR").expect("valid")
    }

    fn ledger_with_declared_aaa() -> Ledger {
        let mut ledger = Ledger::new(eur());
        ledger.append([Transaction::Declare {
            date: Date::from_ymd(2025, 1, 1).expect("valid"),
            ticker: "AAA".to_string(),
            id: "US0378331005".to_string().try_into().expect("valid isin"),
            currency: eur(),
            memo: None,
        }]);
        ledger
    }

    #[test]
    fn first_update_price_for_a_date_is_added() {
        let mut ledger = ledger_with_declared_aaa();
        let incoming = vec![Transaction::UpdatePrice {
            date: Date::from_ymd(2025, 2, 1).expect("valid"),
            prices: [("AAA".to_string(), dec!(100))].into_iter().collect(),
            memo: None,
        }];
        let summary = update_market_data(&mut ledger, incoming).expect("merges");
        assert_eq!(summary.added.get("update-price"), Some(&1));
        assert_eq!(ledger.events().len(), 2);
    }

    #[test]
    fn second_update_price_same_date_coalesces_and_counts_as_updated() {
        let mut ledger = ledger_with_declared_aaa();
        let first = vec![Transaction::UpdatePrice {
            date: Date::from_ymd(2025, 2, 1).expect("valid"),
            prices: [("AAA".to_string(), dec!(100))].into_iter().collect(),
            memo: None,
        }];
        update_market_data(&mut ledger, first).expect("merges");

        let second = vec![Transaction::UpdatePrice {
            date: Date::from_ymd(2025, 2, 1).expect("valid"),
            prices: [("AAA".to_string(), dec!(105))].into_iter().collect(),
            memo: None,
        }];
        let summary = update_market_data(&mut ledger, second).expect("merges");
        assert_eq!(summary.updated.get("update-price"), Some(&1));
        let update_events: Vec<_> = ledger.transactions(|tx| tx.kind() == "update-price").collect();
        assert_eq!(update_events.len(), 1);
    }

    #[test]
    fn undeclared_ticker_is_refused() {
        let mut ledger = Ledger::new(eur());
        let incoming = vec![Transaction::UpdatePrice {
            date: Date::from_ymd(2025, 2, 1).expect("valid"),
            prices: [("ZZZ".to_string(), dec!(100))].into_iter().collect(),
            memo: None,
        }];
        assert!(update_market_data(&mut ledger, incoming).is_err());
    }

    #[test]
    fn dividend_merge_overwrites_same_date_entry() {
        let mut ledger = ledger_with_declared_aaa();
        let first = vec![Transaction::Dividend {
            date: Date::from_ymd(2025, 4, 1).expect("valid"),
            ticker: "AAA".to_string(),
            amount: DividendAmount::Total(Money::new(dec!(40), eur())),
            memo: None,
        }];
        update_market_data(&mut ledger, first).expect("merges");

        let second = vec![Transaction::Dividend {
            date: Date::from_ymd(2025, 4, 1).expect("valid"),
            ticker: "AAA".to_string(),
            amount: DividendAmount::Total(Money::new(dec!(50), eur())),
            memo: None,
        }];
        let summary = update_market_data(&mut ledger, second).expect("merges");
        assert_eq!(summary.updated.get("dividend"), Some(&1));
        let dividends: Vec<_> = ledger.transactions(|tx| tx.kind() == "dividend").collect();
        assert_eq!(dividends.len(), 1);
    }

    #[test]
    fn rejects_non_market_data_event_kinds() {
        let mut ledger = ledger_with_declared_aaa();
        let incoming = vec![Transaction::Deposit {
            date: Date::from_ymd(2025, 1, 2).expect("valid"),
            amount: Money::new(dec!(100), eur()),
            settles: None,
            memo: None,
        }];
        assert!(update_market_data(&mut ledger, incoming).is_err());
    }
}
