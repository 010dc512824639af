//! End-to-end replay tests through the public API: decode a raw event
//! stream, validate, and check snapshot invariants at various dates.

#![allow(clippy::expect_used)]

use ledger_core::{Currency, Date, Ledger, Snapshot};

fn eur() -> Currency {
    Currency::from_code("EUR").expect("valid")
}

fn d(y: i32, m: u32, day: u32) -> Date {
    Date::from_ymd(y, m, day).expect("valid date")
}

fn scenario_1_ledger() -> Ledger {
    let input = concat!(
        "{\"command\":\"init\",\"date\":\"2025-01-01\",\"currency\":\"EUR\"}\n",
        "{\"command\":\"declare\",\"date\":\"2025-01-01\",\"ticker\":\"AAA\",\"id\":\"US0378331005\",\"currency\":\"EUR\"}\n",
        "{\"command\":\"deposit\",\"date\":\"2025-01-02\",\"amount\":\"1000\",\"currency\":\"EUR\"}\n",
        "{\"command\":\"buy\",\"date\":\"2025-01-03\",\"security\":\"AAA\",\"quantity\":\"10\",\"amount\":\"800\"}\n",
        "{\"command\":\"update-price\",\"date\":\"2025-02-01\",\"prices\":{\"AAA\":\"100\"}}\n",
        "{\"command\":\"sell\",\"date\":\"2025-02-01\",\"security\":\"AAA\",\"quantity\":\"10\",\"amount\":\"1000\"}\n",
    );
    let mut ledger = Ledger::new(eur());
    ledger.decode_validate(input.as_bytes()).expect("valid");
    ledger
}

#[test]
fn position_and_cash_match_scenario_1_expectations() {
    let ledger = scenario_1_ledger();
    let snap = Snapshot::build(ledger.events(), d(2025, 1, 4), eur());
    assert_eq!(snap.position("AAA").value(), rust_decimal::Decimal::from(10));
    assert_eq!(snap.cash(eur()).amount, rust_decimal::Decimal::from(200));

    let end = Snapshot::build(ledger.events(), d(2025, 2, 1), eur());
    assert_eq!(end.total_portfolio().expect("converts").amount, rust_decimal::Decimal::from(1200));
}

#[test]
fn balance_identity_holds_at_every_queried_date() {
    let ledger = scenario_1_ledger();
    for (y, m, day) in [(2025, 1, 1), (2025, 1, 4), (2025, 2, 1), (2025, 3, 1)] {
        let snap = Snapshot::build(ledger.events(), d(y, m, day), eur());
        let identity = snap
            .total_cash()
            .expect("cash")
            .add(&snap.total_market().expect("market"))
            .expect("sum")
            .add(&snap.total_counterparty().expect("counterparty"))
            .expect("sum");
        assert_eq!(identity.amount, snap.total_portfolio().expect("portfolio").amount);
    }
}

#[test]
fn position_replay_is_independent_of_query_order() {
    let ledger = scenario_1_ledger();
    // Querying an earlier date after a later one must not leave any
    // residual state behind — each Snapshot::build is a fresh fold.
    let later = Snapshot::build(ledger.events(), d(2025, 2, 1), eur());
    let earlier = Snapshot::build(ledger.events(), d(2025, 1, 4), eur());
    assert_eq!(later.position("AAA").value(), rust_decimal::Decimal::from(0));
    assert_eq!(earlier.position("AAA").value(), rust_decimal::Decimal::from(10));
}

#[test]
fn split_invariance_position_and_value_continuity() {
    let input = concat!(
        "{\"command\":\"declare\",\"date\":\"2024-01-01\",\"ticker\":\"AAA\",\"id\":\"US0378331005\",\"currency\":\"EUR\"}\n",
        "{\"command\":\"buy\",\"date\":\"2024-01-10\",\"security\":\"AAA\",\"quantity\":\"10\",\"amount\":\"500\"}\n",
        "{\"command\":\"update-price\",\"date\":\"2024-11-01\",\"prices\":{\"AAA\":\"120\"}}\n",
        "{\"command\":\"split\",\"date\":\"2024-12-01\",\"security\":\"AAA\",\"num\":\"2\",\"den\":\"1\"}\n",
        "{\"command\":\"update-price\",\"date\":\"2024-12-02\",\"prices\":{\"AAA\":\"60\"}}\n",
    );
    let mut ledger = Ledger::new(eur());
    ledger.decode_validate(input.as_bytes()).expect("valid");

    let pre = Snapshot::build(ledger.events(), d(2024, 11, 1), eur());
    let post = Snapshot::build(ledger.events(), d(2024, 12, 2), eur());

    assert_eq!(post.position("AAA").value(), pre.position("AAA").value() * rust_decimal::Decimal::from(2));
    assert_eq!(
        pre.market_value("AAA").expect("value").amount,
        post.market_value("AAA").expect("value").amount
    );
}

#[test]
fn rate_missing_propagates_rather_than_silently_defaulting() {
    let input = concat!(
        "{\"command\":\"init\",\"date\":\"2025-01-01\",\"currency\":\"EUR\"}\n",
        "{\"command\":\"deposit\",\"date\":\"2025-01-01\",\"amount\":\"100\",\"currency\":\"USD\"}\n",
    );
    let mut ledger = Ledger::new(eur());
    ledger.decode_validate(input.as_bytes()).expect("valid");
    let snap = Snapshot::build(ledger.events(), d(2025, 1, 1), eur());
    assert!(snap.total_portfolio().is_err());
}
