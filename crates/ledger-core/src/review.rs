//! Period review: cash flow, market gain, forex gain, realized/unrealized
//! gains, dividends, and time-weighted return over a `Range`.
//!
//! A pure function of a ledger and a range, producing one result struct
//! with sub-totals and a per-asset breakdown.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::cost_basis::{LotTracker, Method};
use crate::date::{Date, Range};
use crate::error::LedgerError;
use crate::ledger::Ledger;
use crate::snapshot::Snapshot;
use crate::transaction::{DividendAmount, SellQuantity, Transaction};
use ledger_money::{Currency, Money};

/// Time-weighted return at the portfolio, per-asset, and per-currency
/// level. Sub-periods split at cash-flow-day boundaries (day granularity,
/// not a modified-Dietz intraday weighting) — see DESIGN.md.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Twr {
    pub portfolio: Decimal,
    pub per_asset: HashMap<String, Decimal>,
    pub per_currency: HashMap<String, Decimal>,
}

/// Per-security breakdown within a review.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetReview {
    pub ticker: String,
    pub start_value: Money,
    pub end_value: Money,
    pub trading_flow: Money,
    pub market_gain: Money,
    pub realized_gain: Money,
    pub unrealized_gain: Money,
    pub dividends: Money,
    pub twr: Decimal,
}

/// The result of reviewing `[range.from, range.to]`: start/end snapshots,
/// the gain decomposition, and per-asset detail, all in the ledger's
/// reporting currency.
#[derive(Debug, Clone)]
pub struct PeriodReview {
    pub range: Range,
    pub start: Snapshot,
    pub end: Snapshot,
    pub cash_flow: Money,
    pub market_gain: Money,
    pub forex_gain: Money,
    pub realized_gains: Money,
    pub dividends: Money,
    pub twr: Twr,
    pub assets: Vec<AssetReview>,
}

/// Build a period review for `range` using `method` for realized/unrealized
/// gains.
#[tracing::instrument(skip(ledger))]
pub fn review(ledger: &Ledger, range: Range, method: Method) -> Result<PeriodReview, LedgerError> {
    let events = ledger.events();
    let reporting_fallback = ledger.reporting_currency_fallback();
    let start_date = range.from.add_days(-1);

    let start = Snapshot::build(events, start_date, reporting_fallback);
    let end = Snapshot::build(events, range.to, reporting_fallback);

    let cash_flow = external_cash_flow(events, range, reporting_fallback)?;
    let dividends = dividends_in_range(events, range, reporting_fallback)?;

    let tickers: Vec<String> = all_declared_tickers(events);
    let mut assets = Vec::new();
    let mut total_realized = Money::zero(end.reporting_currency());
    let mut total_market_gain = Money::zero(end.reporting_currency());
    let mut per_asset_twr = HashMap::new();

    for ticker in &tickers {
        let currency = declared_currency(events, ticker).unwrap_or(end.reporting_currency());
        let asset = asset_review(events, ticker, currency, range, start_date, &start, &end, method, reporting_fallback)?;
        total_realized = total_realized.add(&asset.realized_gain)?;
        total_market_gain = total_market_gain.add(&asset.market_gain)?;
        per_asset_twr.insert(ticker.clone(), asset.twr);
        assets.push(asset);
    }

    let start_portfolio = start.total_portfolio()?;
    let end_portfolio = end.total_portfolio()?;
    let portfolio_change = end_portfolio.sub(&start_portfolio)?;

    let market_gain = total_market_gain;
    let forex_gain = portfolio_change.sub(&cash_flow)?.sub(&market_gain)?.sub(&dividends)?;

    let portfolio_twr = time_weighted_return(events, range, start_date, reporting_fallback, |snap| snap.total_portfolio())?;
    let per_currency_twr = currency_twr(events, range, &start, &end)?;

    Ok(PeriodReview {
        range,
        start,
        end,
        cash_flow,
        market_gain,
        forex_gain,
        realized_gains: total_realized,
        dividends,
        twr: Twr { portfolio: portfolio_twr, per_asset: per_asset_twr, per_currency: per_currency_twr },
        assets,
    })
}

fn all_declared_tickers(events: &[Transaction]) -> Vec<String> {
    let mut tickers = Vec::new();
    for tx in events {
        if let Transaction::Declare { ticker, .. } = tx {
            if !tickers.contains(ticker) {
                tickers.push(ticker.clone());
            }
        }
    }
    tickers
}

fn declared_currency(events: &[Transaction], ticker: &str) -> Option<Currency> {
    events.iter().find_map(|tx| match tx {
        Transaction::Declare { ticker: t, currency, .. } if t == ticker => Some(*currency),
        _ => None,
    })
}

/// External deposits minus withdrawals within the range, excluding
/// `settles` movements (those rebalance cash against a counterparty, not
/// the portfolio boundary), each converted at its own event date.
fn external_cash_flow(events: &[Transaction], range: Range, reporting_fallback: Currency) -> Result<Money, LedgerError> {
    let mut total = Money::zero(reporting_fallback);
    for tx in events {
        if !range.contains(tx.when()) {
            continue;
        }
        let flow = match tx {
            Transaction::Deposit { amount, settles: None, .. } => Some(*amount),
            Transaction::Withdraw { amount, settles: None, .. } => Some(amount.neg()),
            _ => None,
        };
        if let Some(flow) = flow {
            let snap = Snapshot::build(events, tx.when(), reporting_fallback);
            total = total.add(&snap.convert(flow)?)?;
        }
    }
    Ok(total)
}

fn dividends_in_range(events: &[Transaction], range: Range, reporting_fallback: Currency) -> Result<Money, LedgerError> {
    let mut total = Money::zero(reporting_fallback);
    for tx in events {
        if !range.contains(tx.when()) {
            continue;
        }
        if let Transaction::Dividend { amount: DividendAmount::Total(amount), .. } = tx {
            let snap = Snapshot::build(events, tx.when(), reporting_fallback);
            total = total.add(&snap.convert(*amount)?)?;
        }
    }
    Ok(total)
}

#[allow(clippy::too_many_arguments)]
fn asset_review(
    events: &[Transaction],
    ticker: &str,
    currency: Currency,
    range: Range,
    start_date: Date,
    start: &Snapshot,
    end: &Snapshot,
    method: Method,
    reporting_fallback: Currency,
) -> Result<AssetReview, LedgerError> {
    let start_value = start.market_value(ticker).unwrap_or(Money::zero(currency));
    let end_value = end.market_value(ticker).unwrap_or(Money::zero(currency));

    let mut tracker = LotTracker::new(method, currency);
    let mut realized_gain = Money::zero(end.reporting_currency());
    let mut trading_flow = Money::zero(end.reporting_currency());
    let mut dividends = Money::zero(end.reporting_currency());

    for tx in events {
        if tx.when().after(range.to) {
            break;
        }
        match tx {
            Transaction::Buy { ticker: t, quantity, amount, date, .. } if t == ticker => {
                tracker.buy(*quantity, *amount, *date)?;
                if range.contains(*date) {
                    let snap = Snapshot::build(events, *date, reporting_fallback);
                    trading_flow = trading_flow.add(&snap.convert(*amount)?)?;
                }
            }
            Transaction::Sell { ticker: t, quantity, amount, date, .. } if t == ticker => {
                let resolved = match quantity {
                    SellQuantity::Exact(q) => *q,
                    SellQuantity::All => tracker.position(),
                };
                let realization = tracker.sell(resolved, *amount)?;
                if range.contains(*date) {
                    let snap = Snapshot::build(events, *date, reporting_fallback);
                    realized_gain = realized_gain.add(&snap.convert(realization.gain)?)?;
                    trading_flow = trading_flow.sub(&snap.convert(*amount)?)?;
                }
            }
            Transaction::Split { ticker: t, numerator, denominator, .. } if t == ticker => {
                tracker.apply_split(*numerator, *denominator);
            }
            Transaction::Dividend { ticker: t, amount: DividendAmount::Total(amount), date, .. } if t == ticker => {
                if range.contains(*date) {
                    let snap = Snapshot::build(events, *date, reporting_fallback);
                    dividends = dividends.add(&snap.convert(*amount)?)?;
                }
            }
            _ => {}
        }
    }

    let unrealized_gain = match end.price(ticker) {
        Some(_) => end.unrealized_gain(events, ticker, method).unwrap_or(Money::zero(end.reporting_currency())),
        None => Money::zero(end.reporting_currency()),
    };

    let cost_flow = {
        // Cost-basis-only trading flow (buys at cost, sells at cost-basis),
        // the term the market-gain identity needs — distinct from
        // `trading_flow` above, which is reported at full cash value.
        let mut tracker = LotTracker::new(method, currency);
        let mut flow = Money::zero(end.reporting_currency());
        for tx in events {
            if tx.when().after(range.to) {
                break;
            }
            match tx {
                Transaction::Buy { ticker: t, quantity, amount, date, .. } if t == ticker => {
                    tracker.buy(*quantity, *amount, *date)?;
                    if range.contains(*date) {
                        let snap = Snapshot::build(events, *date, reporting_fallback);
                        flow = flow.add(&snap.convert(*amount)?)?;
                    }
                }
                Transaction::Sell { ticker: t, quantity, amount, date, .. } if t == ticker => {
                    let resolved = match quantity {
                        SellQuantity::Exact(q) => *q,
                        SellQuantity::All => tracker.position(),
                    };
                    let realization = tracker.sell(resolved, *amount)?;
                    if range.contains(*date) {
                        let snap = Snapshot::build(events, *date, reporting_fallback);
                        flow = flow.sub(&snap.convert(realization.cost_basis)?)?;
                    }
                }
                Transaction::Split { ticker: t, numerator, denominator, .. } if t == ticker => {
                    tracker.apply_split(*numerator, *denominator);
                }
                _ => {}
            }
        }
        flow
    };

    let start_value_reporting = start.convert(start_value)?;
    let end_value_reporting = end.convert(end_value)?;
    let market_gain = end_value_reporting.sub(&start_value_reporting)?.sub(&cost_flow)?.add(&realized_gain)?;

    let twr = time_weighted_return(events, range, start_date, reporting_fallback, |snap| {
        snap.market_value(ticker).map(|v| snap.convert(v)).unwrap_or(Ok(Money::zero(snap.reporting_currency())))
    })?;

    Ok(AssetReview {
        ticker: ticker.to_string(),
        start_value: start_value_reporting,
        end_value: end_value_reporting,
        trading_flow,
        market_gain,
        realized_gain,
        unrealized_gain,
        dividends,
        twr,
    })
}

/// Split `range` at every date an external cash flow occurs, compute
/// sub-period returns `r_i = V_end / (V_start + flow)`, and return
/// `Π(r_i) − 1`. `value_of` extracts the quantity being time-weighted
/// (total portfolio, or a single asset's market value) from a snapshot.
fn time_weighted_return(
    events: &[Transaction],
    range: Range,
    start_date: Date,
    reporting_fallback: Currency,
    value_of: impl Fn(&Snapshot) -> Result<Money, LedgerError>,
) -> Result<Decimal, LedgerError> {
    let mut flow_dates: Vec<Date> = events
        .iter()
        .filter(|tx| range.contains(tx.when()))
        .filter(|tx| matches!(tx, Transaction::Deposit { settles: None, .. } | Transaction::Withdraw { settles: None, .. }))
        .map(|tx| tx.when())
        .collect();
    flow_dates.sort_by(|a, b| crate::ordering::compare_date(*a, *b));
    flow_dates.dedup();

    let mut boundaries = vec![start_date];
    boundaries.extend(flow_dates.iter().copied());
    if boundaries.last().copied() != Some(range.to) {
        boundaries.push(range.to);
    }

    let mut product = Decimal::ONE;
    for window in boundaries.windows(2) {
        let (prev, curr) = (window[0], window[1]);
        let prev_snap = Snapshot::build(events, prev, reporting_fallback);
        let curr_snap = Snapshot::build(events, curr, reporting_fallback);
        let v_start = value_of(&prev_snap)?;
        let v_end = value_of(&curr_snap)?;
        let flow = external_cash_flow(events, Range::new(curr, curr), reporting_fallback)?;
        let denominator = v_start.add(&flow)?;
        if denominator.is_zero() {
            continue;
        }
        product *= v_end.amount / denominator.amount;
    }
    Ok(product - Decimal::ONE)
}

/// A currency's own return over the range: the FX rate's movement
/// relative to the reporting currency, with no sub-period splitting.
fn currency_twr(
    events: &[Transaction],
    range: Range,
    start: &Snapshot,
    end: &Snapshot,
) -> Result<HashMap<String, Decimal>, LedgerError> {
    let mut currencies: Vec<String> = Vec::new();
    for tx in events {
        if tx.when().after(range.to) {
            break;
        }
        let code = match tx {
            Transaction::Deposit { amount, .. } | Transaction::Withdraw { amount, .. } => Some(amount.currency.code().to_string()),
            _ => None,
        };
        if let Some(code) = code {
            if !currencies.contains(&code) {
                currencies.push(code);
            }
        }
    }

    let mut result = HashMap::new();
    for code in currencies {
        let Some(currency) = Currency::from_code(&code).ok() else { continue };
        if currency == end.reporting_currency() {
            continue;
        }
        let start_rate = start.rate(currency, start.reporting_currency());
        let end_rate = end.rate(currency, end.reporting_currency());
        if let (Ok(s), Ok(e)) = (start_rate, end_rate) {
            if !s.is_zero() {
                result.insert(code, e / s - Decimal::ONE);
            }
        }
    }
    Ok(result)
}
