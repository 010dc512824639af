//! The six end-to-end review scenarios, driven through raw line-delimited
//! text and the public `Ledger`/`review` API rather than constructed
//! `Transaction` values.

#![allow(clippy::expect_used)]

use ledger_core::{review, Currency, Date, Ledger, Method, Range};
use rust_decimal_macros::dec;

fn eur() -> Currency {
    Currency::from_code("EUR").expect("valid")
}

fn d(y: i32, m: u32, day: u32) -> Date {
    Date::from_ymd(y, m, day).expect("valid date")
}

fn ledger_from(text: &str) -> Ledger {
    let mut ledger = Ledger::new(eur());
    ledger.decode_validate(text.as_bytes()).expect("valid ledger");
    ledger
}

#[test]
fn scenario_1_buy_hold_sell_in_home_currency() {
    let ledger = ledger_from(concat!(
        "{\"command\":\"init\",\"date\":\"2025-01-01\",\"currency\":\"EUR\"}\n",
        "{\"command\":\"declare\",\"date\":\"2025-01-01\",\"ticker\":\"AAA\",\"id\":\"US0378331005\",\"currency\":\"EUR\"}\n",
        "{\"command\":\"deposit\",\"date\":\"2025-01-02\",\"amount\":\"1000\",\"currency\":\"EUR\"}\n",
        "{\"command\":\"buy\",\"date\":\"2025-01-03\",\"security\":\"AAA\",\"quantity\":\"10\",\"amount\":\"800\"}\n",
        "{\"command\":\"update-price\",\"date\":\"2025-02-01\",\"prices\":{\"AAA\":\"100\"}}\n",
        "{\"command\":\"sell\",\"date\":\"2025-02-01\",\"security\":\"AAA\",\"quantity\":\"10\",\"amount\":\"1000\"}\n",
    ));
    let result = review::review(&ledger, Range::new(d(2025, 1, 1), d(2025, 2, 28)), Method::Fifo).expect("reviews");
    assert_eq!(result.cash_flow.amount, dec!(1000));
    assert_eq!(result.market_gain.amount, dec!(200));
    assert_eq!(result.forex_gain.amount, dec!(0));
    assert_eq!(result.realized_gains.amount, dec!(200));
}

#[test]
fn scenario_2_fx_cash_and_forex_gain() {
    let ledger = ledger_from(concat!(
        "{\"command\":\"init\",\"date\":\"2025-01-01\",\"currency\":\"EUR\"}\n",
        "{\"command\":\"deposit\",\"date\":\"2025-01-01\",\"amount\":\"1000\",\"currency\":\"USD\"}\n",
        "{\"command\":\"update-price\",\"date\":\"2025-01-01\",\"prices\":{\"USDEUR\":\"0.90\"}}\n",
        "{\"command\":\"update-price\",\"date\":\"2025-02-01\",\"prices\":{\"USDEUR\":\"1.00\"}}\n",
    ));
    let result = review::review(&ledger, Range::new(d(2025, 1, 1), d(2025, 2, 1)), Method::Average).expect("reviews");
    assert_eq!(result.cash_flow.amount, dec!(900));
    assert_eq!(result.market_gain.amount, dec!(0));
    assert_eq!(result.forex_gain.amount, dec!(100));
}

#[test]
fn scenario_3_split_before_sell_fifo() {
    let ledger = ledger_from(concat!(
        "{\"command\":\"declare\",\"date\":\"2024-01-01\",\"ticker\":\"AAA\",\"id\":\"US0378331005\",\"currency\":\"EUR\"}\n",
        "{\"command\":\"buy\",\"date\":\"2024-01-10\",\"security\":\"AAA\",\"quantity\":\"10\",\"amount\":\"500\"}\n",
        "{\"command\":\"buy\",\"date\":\"2024-06-10\",\"security\":\"AAA\",\"quantity\":\"10\",\"amount\":\"1000\"}\n",
        "{\"command\":\"split\",\"date\":\"2024-12-01\",\"security\":\"AAA\",\"num\":\"2\",\"den\":\"1\"}\n",
        "{\"command\":\"update-price\",\"date\":\"2025-01-10\",\"prices\":{\"AAA\":\"80\"}}\n",
        "{\"command\":\"sell\",\"date\":\"2025-01-10\",\"security\":\"AAA\",\"quantity\":\"15\",\"amount\":\"1200\"}\n",
    ));
    let result = review::review(&ledger, Range::new(d(2025, 1, 1), d(2025, 1, 31)), Method::Fifo).expect("reviews");
    assert_eq!(result.realized_gains.amount, dec!(825));
}

#[test]
fn scenario_4_sell_all_resolves_and_zeroes_the_position() {
    let ledger = ledger_from(concat!(
        "{\"command\":\"declare\",\"date\":\"2025-01-01\",\"ticker\":\"AAA\",\"id\":\"US0378331005\",\"currency\":\"EUR\"}\n",
        "{\"command\":\"buy\",\"date\":\"2025-01-02\",\"security\":\"AAA\",\"quantity\":\"7.5\",\"amount\":\"750\"}\n",
        "{\"command\":\"sell\",\"date\":\"2025-03-01\",\"security\":\"AAA\",\"quantity\":\"0\",\"amount\":\"1500\"}\n",
    ));
    let snap = ledger_core::Snapshot::build(ledger.events(), d(2025, 3, 2), eur());
    assert!(snap.position("AAA").is_zero());
}

#[test]
fn scenario_5_settling_withdraw_excluded_from_external_flow() {
    let ledger = ledger_from(concat!(
        "{\"command\":\"init\",\"date\":\"2025-01-01\",\"currency\":\"EUR\"}\n",
        "{\"command\":\"deposit\",\"date\":\"2025-01-01\",\"amount\":\"2000\",\"currency\":\"EUR\"}\n",
        "{\"command\":\"accrue\",\"date\":\"2025-02-01\",\"counterparty\":\"Landlord\",\"amount\":\"-1200\",\"currency\":\"EUR\"}\n",
        "{\"command\":\"withdraw\",\"date\":\"2025-02-05\",\"amount\":\"1200\",\"currency\":\"EUR\",\"settles\":\"Landlord\"}\n",
    ));
    let snap = ledger_core::Snapshot::build(ledger.events(), d(2025, 2, 6), eur());
    assert!(snap.counterparty("Landlord").expect("tracked").is_zero());

    let result = review::review(&ledger, Range::new(d(2025, 2, 1), d(2025, 2, 28)), Method::Average).expect("reviews");
    assert_eq!(result.cash_flow.amount, dec!(0));
}

#[test]
fn scenario_6_dividend_from_per_share() {
    let ledger = ledger_from(concat!(
        "{\"command\":\"init\",\"date\":\"2025-01-01\",\"currency\":\"EUR\"}\n",
        "{\"command\":\"declare\",\"date\":\"2025-01-01\",\"ticker\":\"AAA\",\"id\":\"US0378331005\",\"currency\":\"EUR\"}\n",
        "{\"command\":\"buy\",\"date\":\"2025-01-02\",\"security\":\"AAA\",\"quantity\":\"100\",\"amount\":\"1000\"}\n",
        "{\"command\":\"dividend\",\"date\":\"2025-04-01\",\"security\":\"AAA\",\"amount_per_share\":\"0.50\"}\n",
    ));
    let result = review::review(&ledger, Range::new(d(2025, 4, 1), d(2025, 4, 30)), Method::Average).expect("reviews");
    assert_eq!(result.dividends.amount, dec!(50));
}

#[test]
fn review_decomposition_holds_for_scenario_1() {
    let ledger = ledger_from(concat!(
        "{\"command\":\"init\",\"date\":\"2025-01-01\",\"currency\":\"EUR\"}\n",
        "{\"command\":\"declare\",\"date\":\"2025-01-01\",\"ticker\":\"AAA\",\"id\":\"US0378331005\",\"currency\":\"EUR\"}\n",
        "{\"command\":\"deposit\",\"date\":\"2025-01-02\",\"amount\":\"1000\",\"currency\":\"EUR\"}\n",
        "{\"command\":\"buy\",\"date\":\"2025-01-03\",\"security\":\"AAA\",\"quantity\":\"10\",\"amount\":\"800\"}\n",
        "{\"command\":\"update-price\",\"date\":\"2025-02-01\",\"prices\":{\"AAA\":\"100\"}}\n",
        "{\"command\":\"sell\",\"date\":\"2025-02-01\",\"security\":\"AAA\",\"quantity\":\"10\",\"amount\":\"1000\"}\n",
    ));
    let range = Range::new(d(2025, 1, 1), d(2025, 2, 28));
    let result = review::review(&ledger, range, Method::Fifo).expect("reviews");

    let portfolio_change = result.end.total_portfolio().expect("end").sub(&result.start.total_portfolio().expect("start")).expect("sub");
    let reconstructed = result
        .cash_flow
        .add(&result.market_gain)
        .expect("add")
        .add(&result.forex_gain)
        .expect("add")
        .add(&result.dividends)
        .expect("add");
    assert_eq!(portfolio_change.amount, reconstructed.amount);
}
