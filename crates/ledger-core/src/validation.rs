//! Per-event semantic validation, whole-ledger cross-checks, and the
//! quick-fixes (sell-all resolution, currency binding, split simplification,
//! dividend-total computation) that the validator applies in place.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::date::Date;
use crate::error::LedgerError;
use crate::transaction::{attach_context, DividendAmount, SellQuantity, Transaction};
use ledger_money::{Currency, Money, Quantity};

#[derive(Debug, Clone)]
struct Declaration {
    currency: Currency,
    declared_on: Date,
}

/// Running state the validator needs to resolve quick-fixes and check
/// cross-event invariants. Distinct from `Snapshot` — this is a lighter,
/// forward-only pass made once at load time, not a replay query repeated at
/// arbitrary dates.
#[derive(Debug, Default)]
struct ValidatorState {
    declarations: HashMap<String, Declaration>,
    positions: HashMap<String, Quantity>,
    cash: HashMap<String, Decimal>,
    counterparties: HashMap<String, Money>,
    currencies_used: std::collections::HashSet<String>,
    init_seen: bool,
}

/// Add a signed delta to a counterparty's balance, erroring if a later
/// event uses a different currency than one already recorded for that name.
fn adjust_counterparty(state: &mut ValidatorState, name: &str, delta: Money) -> Result<(), LedgerError> {
    let current = state
        .counterparties
        .entry(name.to_string())
        .or_insert_with(|| Money::zero(delta.currency));
    *current = current.add(&delta)?;
    Ok(())
}

/// Validate and normalize a whole batch of events: sort by date (stable),
/// apply quick-fixes, and enforce cross-event invariants. Returns the
/// normalized sequence, ready to back a `Ledger`.
pub fn validate_all(mut events: Vec<Transaction>) -> Result<Vec<Transaction>, LedgerError> {
    crate::ordering::sort_by_date(&mut events, |tx| tx.when());

    let mut state = ValidatorState::default();
    let mut init_count = 0usize;
    let mut last_date: Option<Date> = None;

    for tx in events.iter() {
        if tx.kind() == "init" {
            init_count += 1;
        }
    }
    if init_count > 1 {
        return Err(LedgerError::validation("at most one init event is allowed"));
    }
    if init_count == 1 && !matches!(events.first(), Some(Transaction::Init { .. })) {
        return Err(LedgerError::validation("init, if present, must be the earliest event"));
    }

    let mut normalized = Vec::with_capacity(events.len());
    for tx in events.into_iter() {
        if let Some(prev) = last_date {
            if tx.when() != prev {
                check_cash_nonnegative(&state.cash, prev)?;
            }
        }
        last_date = Some(tx.when());

        let fixed = validate_one(tx, &mut state)?;
        normalized.push(fixed);
    }
    if let Some(prev) = last_date {
        check_cash_nonnegative(&state.cash, prev)?;
    }

    Ok(normalized)
}

fn check_cash_nonnegative(cash: &HashMap<String, Decimal>, date: Date) -> Result<(), LedgerError> {
    for (currency, balance) in cash {
        if *balance < Decimal::ZERO {
            return Err(LedgerError::validation_at(
                format!("cash balance in {currency} went negative ({balance})"),
                date.to_string(),
                "end-of-day",
            ));
        }
    }
    Ok(())
}

fn validate_one(tx: Transaction, state: &mut ValidatorState) -> Result<Transaction, LedgerError> {
    let result = validate_one_inner(tx.clone(), state);
    result.map_err(|e| attach_context(&tx, e))
}

fn validate_one_inner(tx: Transaction, state: &mut ValidatorState) -> Result<Transaction, LedgerError> {
    match tx {
        Transaction::Init { date, reporting_currency, memo } => {
            if reporting_currency.is_unbound() {
                return Err(LedgerError::validation("init requires a bound reporting currency"));
            }
            if state.init_seen {
                return Err(LedgerError::validation("at most one init event is allowed"));
            }
            state.init_seen = true;
            Ok(Transaction::Init { date, reporting_currency, memo })
        }
        Transaction::Declare { date, ticker, id, currency, memo } => {
            if state.declarations.contains_key(&ticker) {
                return Err(LedgerError::validation(format!("ticker '{ticker}' already declared")));
            }
            if currency.is_unbound() {
                return Err(LedgerError::validation(format!("declare '{ticker}' requires a bound currency")));
            }
            state.declarations.insert(ticker.clone(), Declaration { currency, declared_on: date });
            state.currencies_used.insert(currency.code().to_string());
            state.positions.insert(ticker.clone(), Quantity::ZERO);
            Ok(Transaction::Declare { date, ticker, id, currency, memo })
        }
        Transaction::Deposit { date, amount, settles, memo } => {
            require_bound(&amount)?;
            require_positive(&amount, "deposit")?;
            *state.cash.entry(amount.currency.code().to_string()).or_insert(Decimal::ZERO) += amount.amount;
            if let Some(name) = &settles {
                require_nonempty_counterparty(name)?;
                adjust_counterparty(state, name, amount.neg())?;
            }
            state.currencies_used.insert(amount.currency.code().to_string());
            Ok(Transaction::Deposit { date, amount, settles, memo })
        }
        Transaction::Withdraw { date, amount, settles, memo } => {
            require_bound(&amount)?;
            require_positive(&amount, "withdraw")?;
            *state.cash.entry(amount.currency.code().to_string()).or_insert(Decimal::ZERO) -= amount.amount;
            if let Some(name) = &settles {
                require_nonempty_counterparty(name)?;
                adjust_counterparty(state, name, amount)?;
            }
            state.currencies_used.insert(amount.currency.code().to_string());
            Ok(Transaction::Withdraw { date, amount, settles, memo })
        }
        Transaction::Buy { date, ticker, quantity, amount, memo } => {
            let decl = require_declared(state, &ticker, date)?;
            if quantity.is_negative() || quantity.is_zero() {
                return Err(LedgerError::validation(format!("buy of '{ticker}' requires a positive quantity")));
            }
            let amount = bind_currency(amount, decl.currency)?;
            require_positive(&amount, "buy")?;
            let position = state.positions.entry(ticker.clone()).or_insert(Quantity::ZERO);
            *position = position.add(quantity);
            *state.cash.entry(amount.currency.code().to_string()).or_insert(Decimal::ZERO) -= amount.amount;
            Ok(Transaction::Buy { date, ticker, quantity, amount, memo })
        }
        Transaction::Sell { date, ticker, quantity, amount, memo } => {
            let decl = require_declared(state, &ticker, date)?;
            let position = *state.positions.get(&ticker).unwrap_or(&Quantity::ZERO);
            let resolved = match quantity {
                SellQuantity::All => position,
                SellQuantity::Exact(q) => {
                    if q.is_negative() || q.is_zero() {
                        return Err(LedgerError::validation(format!("sell of '{ticker}' requires a positive quantity")));
                    }
                    if q.value() > position.value() {
                        return Err(LedgerError::validation(format!(
                            "sell of {q} shares of '{ticker}' exceeds position of {position}"
                        )));
                    }
                    q
                }
            };
            let amount = bind_currency(amount, decl.currency)?;
            require_positive(&amount, "sell")?;
            let entry = state.positions.entry(ticker.clone()).or_insert(Quantity::ZERO);
            *entry = entry.sub(resolved);
            *state.cash.entry(amount.currency.code().to_string()).or_insert(Decimal::ZERO) += amount.amount;
            Ok(Transaction::Sell { date, ticker, quantity: SellQuantity::Exact(resolved), amount, memo })
        }
        Transaction::Dividend { date, ticker, amount, memo } => {
            let decl = require_declared(state, &ticker, date)?;
            let position = *state.positions.get(&ticker).unwrap_or(&Quantity::ZERO);
            let total = match amount {
                DividendAmount::Total(amount) => bind_currency(amount, decl.currency)?,
                DividendAmount::PerShare(amount_per_share) => {
                    if position.is_zero() {
                        return Err(LedgerError::validation(format!(
                            "per-share dividend for '{ticker}' requires a positive position"
                        )));
                    }
                    let per_share = bind_currency(amount_per_share, decl.currency)?;
                    per_share.scale(position.value())
                }
            };
            require_positive(&total, "dividend")?;
            *state.cash.entry(total.currency.code().to_string()).or_insert(Decimal::ZERO) += total.amount;
            Ok(Transaction::Dividend { date, ticker, amount: DividendAmount::Total(total), memo })
        }
        Transaction::Convert { date, from_currency, from_amount, to_currency, to_amount, memo } => {
            if from_currency.is_unbound() || to_currency.is_unbound() {
                return Err(LedgerError::validation("convert requires bound currencies on both sides"));
            }
            require_positive(&from_amount, "convert")?;
            require_positive(&to_amount, "convert")?;
            *state.cash.entry(from_currency.code().to_string()).or_insert(Decimal::ZERO) -= from_amount.amount;
            *state.cash.entry(to_currency.code().to_string()).or_insert(Decimal::ZERO) += to_amount.amount;
            state.currencies_used.insert(from_currency.code().to_string());
            state.currencies_used.insert(to_currency.code().to_string());
            Ok(Transaction::Convert { date, from_currency, from_amount, to_currency, to_amount, memo })
        }
        Transaction::Accrue { date, counterparty, amount, memo } => {
            require_nonempty_counterparty(&counterparty)?;
            require_bound(&amount)?;
            adjust_counterparty(state, &counterparty, amount)?;
            Ok(Transaction::Accrue { date, counterparty, amount, memo })
        }
        Transaction::Split { date, ticker, numerator, denominator, memo } => {
            require_declared(state, &ticker, date)?;
            if numerator == 0 || denominator == 0 {
                return Err(LedgerError::validation(format!("split of '{ticker}' requires a positive ratio")));
            }
            let g = gcd(numerator, denominator);
            let (numerator, denominator) = (numerator / g, denominator / g);
            if let Some(position) = state.positions.get_mut(&ticker) {
                *position = position.apply_split(numerator, denominator);
            }
            Ok(Transaction::Split { date, ticker, numerator, denominator, memo })
        }
        Transaction::UpdatePrice { date, prices, memo } => {
            for (key, price) in &prices {
                if *price <= Decimal::ZERO {
                    return Err(LedgerError::validation(format!("update-price for '{key}' requires a positive price")));
                }
                if !is_valid_key(state, key, date) {
                    return Err(LedgerError::validation(format!(
                        "update-price key '{key}' is neither a declared ticker nor a currency pair over used currencies"
                    )));
                }
            }
            Ok(Transaction::UpdatePrice { date, prices, memo })
        }
    }
}

fn is_valid_key(state: &ValidatorState, key: &str, date: Date) -> bool {
    match crate::transaction::parse_price_key(key) {
        crate::transaction::PriceKey::Ticker(ticker) => state
            .declarations
            .get(&ticker)
            .is_some_and(|decl| !decl.declared_on.after(date)),
        crate::transaction::PriceKey::Pair { from, to } => {
            state.currencies_used.contains(&from) && state.currencies_used.contains(&to)
        }
    }
}

fn require_declared<'s>(state: &'s ValidatorState, ticker: &str, date: Date) -> Result<&'s Declaration, LedgerError> {
    match state.declarations.get(ticker) {
        Some(decl) if !decl.declared_on.after(date) => Ok(decl),
        Some(_) => Err(LedgerError::validation(format!("ticker '{ticker}' is declared after this event's date"))),
        None => Err(LedgerError::validation(format!("ticker '{ticker}' was never declared"))),
    }
}

fn bind_currency(amount: Money, fallback: Currency) -> Result<Money, LedgerError> {
    if amount.currency.is_unbound() {
        Ok(Money::new(amount.amount, fallback))
    } else if amount.currency != fallback {
        Err(LedgerError::CurrencyMismatch {
            left: amount.currency.to_string(),
            right: fallback.to_string(),
        })
    } else {
        Ok(amount)
    }
}

fn require_bound(amount: &Money) -> Result<(), LedgerError> {
    if amount.currency.is_unbound() {
        return Err(LedgerError::validation("amount requires a bound currency"));
    }
    Ok(())
}

fn require_positive(amount: &Money, action: &str) -> Result<(), LedgerError> {
    if !amount.is_positive() {
        return Err(LedgerError::validation(format!("{action} requires a positive amount, got {}", amount.amount)));
    }
    Ok(())
}

fn require_nonempty_counterparty(name: &str) -> Result<(), LedgerError> {
    if name.trim().is_empty() {
        return Err(LedgerError::validation("counterparty name must not be empty"));
    }
    Ok(())
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 { a } else { gcd(b, a % b) }
}
