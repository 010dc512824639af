//! `Transaction`: the closed, tagged event union at the heart of the ledger.
//!
//! Each variant carries its own `date`/`memo` rather than deferring to a
//! shared base struct, so a single variant is self-describing in isolation
//! (matches the canonical one-event-per-line file format in full). Money
//! fields are written flat on the wire — a bare decimal when the currency is
//! implied by a declared security (buy/sell/dividend), a decimal plus a
//! sibling `currency` field otherwise (deposit/withdraw/accrue/convert) —
//! rather than as a nested `{amount, currency}` object, so both `Serialize`
//! and `Deserialize` are hand-rolled instead of derived.

use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::date::Date;
use crate::error::LedgerError;
use crate::ids::SecurityId;
use ledger_money::{Currency, Money, Quantity};

/// A `sell` quantity as written on disk: either an exact amount, or the
/// convenience sentinel meaning "the whole current position", resolved by
/// the validator and persisted resolved.
#[derive(Debug, Clone, Copy, PartialEq, JsonSchema)]
pub enum SellQuantity {
    All,
    Exact(Quantity),
}

impl SellQuantity {
    pub fn is_all(&self) -> bool {
        matches!(self, SellQuantity::All)
    }
}

impl Serialize for SellQuantity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            SellQuantity::All => Decimal::ZERO.serialize(serializer),
            SellQuantity::Exact(q) => q.value().serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for SellQuantity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(Decimal),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Text(s) if s.eq_ignore_ascii_case("all") => Ok(SellQuantity::All),
            Raw::Text(s) => s
                .parse::<Decimal>()
                .map(resolve_quantity)
                .map_err(|_| serde::de::Error::custom(format!("invalid sell quantity '{s}'"))),
            Raw::Number(d) => Ok(resolve_quantity(d)),
        }
    }
}

fn resolve_quantity(d: Decimal) -> SellQuantity {
    if d.is_zero() {
        SellQuantity::All
    } else {
        SellQuantity::Exact(Quantity::new(d))
    }
}

/// A dividend amount: either a per-share rate (expanded to a total during
/// validation using the position at the event date) or an already-total
/// amount. After validation, it is always `Total`. Currency is implied by
/// the dividend's security, exactly like `Buy`/`Sell`'s `amount`.
#[derive(Debug, Clone, Copy, PartialEq, JsonSchema)]
pub enum DividendAmount {
    PerShare(Money),
    Total(Money),
}

/// The `settles` field on a Deposit/Withdraw: names a counterparty account
/// whose balance moves opposite the cash movement.
pub type Counterparty = String;

/// What an `update-price` map key refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceKey {
    Ticker(String),
    Pair { from: String, to: String },
}

/// Parse an `update-price` key: a declared ticker, or a concatenated
/// six-letter currency pair (`USDEUR`), base first.
pub fn parse_price_key(key: &str) -> PriceKey {
    if key.len() == 6 && key.chars().all(|c| c.is_ascii_uppercase()) {
        let (from, to) = key.split_at(3);
        PriceKey::Pair { from: from.to_string(), to: to.to_string() }
    } else {
        PriceKey::Ticker(key.to_string())
    }
}

/// The ordered sum type of everything that can happen to the ledger.
#[derive(Debug, Clone, PartialEq, JsonSchema)]
pub enum Transaction {
    Init {
        date: Date,
        reporting_currency: Currency,
        memo: Option<String>,
    },
    Declare {
        date: Date,
        ticker: String,
        id: SecurityId,
        currency: Currency,
        memo: Option<String>,
    },
    Deposit {
        date: Date,
        amount: Money,
        settles: Option<Counterparty>,
        memo: Option<String>,
    },
    Withdraw {
        date: Date,
        amount: Money,
        settles: Option<Counterparty>,
        memo: Option<String>,
    },
    Buy {
        date: Date,
        ticker: String,
        quantity: Quantity,
        amount: Money,
        memo: Option<String>,
    },
    Sell {
        date: Date,
        ticker: String,
        quantity: SellQuantity,
        amount: Money,
        memo: Option<String>,
    },
    Dividend {
        date: Date,
        ticker: String,
        amount: DividendAmount,
        memo: Option<String>,
    },
    Convert {
        date: Date,
        from_currency: Currency,
        from_amount: Money,
        to_currency: Currency,
        to_amount: Money,
        memo: Option<String>,
    },
    Accrue {
        date: Date,
        counterparty: Counterparty,
        amount: Money,
        memo: Option<String>,
    },
    Split {
        date: Date,
        ticker: String,
        numerator: u64,
        denominator: u64,
        memo: Option<String>,
    },
    UpdatePrice {
        date: Date,
        prices: BTreeMap<String, Decimal>,
        memo: Option<String>,
    },
}

impl Transaction {
    pub fn when(&self) -> Date {
        match self {
            Transaction::Init { date, .. }
            | Transaction::Declare { date, .. }
            | Transaction::Deposit { date, .. }
            | Transaction::Withdraw { date, .. }
            | Transaction::Buy { date, .. }
            | Transaction::Sell { date, .. }
            | Transaction::Dividend { date, .. }
            | Transaction::Convert { date, .. }
            | Transaction::Accrue { date, .. }
            | Transaction::Split { date, .. }
            | Transaction::UpdatePrice { date, .. } => *date,
        }
    }

    /// The canonical `command` tag string.
    pub fn kind(&self) -> &'static str {
        match self {
            Transaction::Init { .. } => "init",
            Transaction::Declare { .. } => "declare",
            Transaction::Deposit { .. } => "deposit",
            Transaction::Withdraw { .. } => "withdraw",
            Transaction::Buy { .. } => "buy",
            Transaction::Sell { .. } => "sell",
            Transaction::Dividend { .. } => "dividend",
            Transaction::Convert { .. } => "convert",
            Transaction::Accrue { .. } => "accrue",
            Transaction::Split { .. } => "split",
            Transaction::UpdatePrice { .. } => "update-price",
        }
    }

    pub fn memo(&self) -> Option<&str> {
        match self {
            Transaction::Init { memo, .. }
            | Transaction::Declare { memo, .. }
            | Transaction::Deposit { memo, .. }
            | Transaction::Withdraw { memo, .. }
            | Transaction::Buy { memo, .. }
            | Transaction::Sell { memo, .. }
            | Transaction::Dividend { memo, .. }
            | Transaction::Convert { memo, .. }
            | Transaction::Accrue { memo, .. }
            | Transaction::Split { memo, .. }
            | Transaction::UpdatePrice { memo, .. } => memo.as_deref(),
        }
    }
}

/// Writes keys in the canonical order: `command`, `date`, kind-specific
/// fields in the documented order, then `memo` — so two logically equal
/// ledgers produce byte-identical output.
impl Serialize for Transaction {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("command", self.kind())?;
        map.serialize_entry("date", &self.when())?;
        match self {
            Transaction::Init { reporting_currency, .. } => {
                map.serialize_entry("currency", reporting_currency)?;
            }
            Transaction::Declare { ticker, id, currency, .. } => {
                map.serialize_entry("ticker", ticker)?;
                map.serialize_entry("id", id)?;
                map.serialize_entry("currency", currency)?;
            }
            Transaction::Deposit { amount, settles, .. } | Transaction::Withdraw { amount, settles, .. } => {
                map.serialize_entry("amount", &amount.amount)?;
                map.serialize_entry("currency", &amount.currency)?;
                if let Some(s) = settles {
                    map.serialize_entry("settles", s)?;
                }
            }
            Transaction::Buy { ticker, quantity, amount, .. } => {
                map.serialize_entry("security", ticker)?;
                map.serialize_entry("quantity", &quantity.value())?;
                map.serialize_entry("amount", &amount.amount)?;
            }
            Transaction::Sell { ticker, quantity, amount, .. } => {
                map.serialize_entry("security", ticker)?;
                map.serialize_entry("quantity", quantity)?;
                map.serialize_entry("amount", &amount.amount)?;
            }
            Transaction::Dividend { ticker, amount, .. } => {
                map.serialize_entry("security", ticker)?;
                match amount {
                    DividendAmount::Total(m) => map.serialize_entry("amount", &m.amount)?,
                    DividendAmount::PerShare(m) => map.serialize_entry("amount_per_share", &m.amount)?,
                }
            }
            Transaction::Convert { from_currency, from_amount, to_currency, to_amount, .. } => {
                map.serialize_entry("from-currency", from_currency)?;
                map.serialize_entry("from-amount", &from_amount.amount)?;
                map.serialize_entry("to-currency", to_currency)?;
                map.serialize_entry("to-amount", &to_amount.amount)?;
            }
            Transaction::Accrue { counterparty, amount, .. } => {
                map.serialize_entry("counterparty", counterparty)?;
                map.serialize_entry("amount", &amount.amount)?;
                map.serialize_entry("currency", &amount.currency)?;
            }
            Transaction::Split { ticker, numerator, denominator, .. } => {
                map.serialize_entry("security", ticker)?;
                map.serialize_entry("num", numerator)?;
                map.serialize_entry("den", denominator)?;
            }
            Transaction::UpdatePrice { prices, .. } => {
                map.serialize_entry("prices", prices)?;
            }
        }
        if let Some(memo) = self.memo() {
            map.serialize_entry("memo", memo)?;
        }
        map.end()
    }
}

/// Hand-rolled: each variant needs its own required-field checks and its
/// own money-flattening rules, which a derived enum deserializer can't
/// express.
impl<'de> Deserialize<'de> for Transaction {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            command: String,
            #[serde(flatten)]
            rest: serde_json::Value,
        }

        let raw = Raw::deserialize(deserializer)?;
        let command = raw.command.to_ascii_lowercase();
        parse_by_command(&command, raw.rest).map_err(serde::de::Error::custom)
    }
}

fn parse_by_command(command: &str, rest: serde_json::Value) -> Result<Transaction, String> {
    macro_rules! field {
        ($name:literal) => {
            rest.get($name)
                .cloned()
                .ok_or_else(|| format!("{command} requires field '{}'", $name))
        };
    }
    macro_rules! parse_field {
        ($name:literal) => {
            serde_json::from_value(field!($name)?)
                .map_err(|e| format!("{command}.{}: {e}", $name))?
        };
    }
    macro_rules! opt_field {
        ($name:literal) => {
            rest.get($name)
                .cloned()
                .map(serde_json::from_value)
                .transpose()
                .map_err(|e| format!("{command}.{}: {e}", $name))?
        };
    }

    // An `amount` implied by a declared security: no currency on the wire,
    // bound later by the validator.
    macro_rules! implied_money {
        ($name:literal) => {
            Money::new(parse_field!($name), Currency::UNBOUND)
        };
    }
    // An `amount` paired with its own sibling `currency` field.
    macro_rules! explicit_money {
        ($amount_name:literal, $currency_name:literal) => {
            Money::new(parse_field!($amount_name), parse_field!($currency_name))
        };
    }

    let date: Date = parse_field!("date");
    let memo: Option<String> = opt_field!("memo");

    match command {
        "init" => Ok(Transaction::Init {
            date,
            reporting_currency: parse_field!("currency"),
            memo,
        }),
        "declare" => Ok(Transaction::Declare {
            date,
            ticker: parse_field!("ticker"),
            id: parse_field!("id"),
            currency: parse_field!("currency"),
            memo,
        }),
        "deposit" => Ok(Transaction::Deposit {
            date,
            amount: explicit_money!("amount", "currency"),
            settles: opt_field!("settles"),
            memo,
        }),
        "withdraw" => Ok(Transaction::Withdraw {
            date,
            amount: explicit_money!("amount", "currency"),
            settles: opt_field!("settles"),
            memo,
        }),
        "buy" => Ok(Transaction::Buy {
            date,
            ticker: parse_field!("security"),
            quantity: parse_field!("quantity"),
            amount: implied_money!("amount"),
            memo,
        }),
        "sell" => Ok(Transaction::Sell {
            date,
            ticker: parse_field!("security"),
            quantity: parse_field!("quantity"),
            amount: implied_money!("amount"),
            memo,
        }),
        "dividend" => {
            let amount = if rest.get("amount_per_share").is_some() {
                DividendAmount::PerShare(implied_money!("amount_per_share"))
            } else {
                DividendAmount::Total(implied_money!("amount"))
            };
            Ok(Transaction::Dividend {
                date,
                ticker: parse_field!("security"),
                amount,
                memo,
            })
        }
        "convert" => Ok(Transaction::Convert {
            date,
            from_currency: parse_field!("from-currency"),
            from_amount: explicit_money!("from-amount", "from-currency"),
            to_currency: parse_field!("to-currency"),
            to_amount: explicit_money!("to-amount", "to-currency"),
            memo,
        }),
        "accrue" => Ok(Transaction::Accrue {
            date,
            counterparty: parse_field!("counterparty"),
            amount: explicit_money!("amount", "currency"),
            memo,
        }),
        "split" => Ok(Transaction::Split {
            date,
            ticker: parse_field!("security"),
            numerator: parse_field!("num"),
            denominator: parse_field!("den"),
            memo,
        }),
        "update-price" => Ok(Transaction::UpdatePrice {
            date,
            prices: parse_field!("prices"),
            memo,
        }),
        other => Err(format!(
            "unknown command '{other}': expected one of init, declare, deposit, withdraw, buy, sell, dividend, convert, accrue, split, update-price"
        )),
    }
}

/// Turns a `LedgerError::Validation` without event context into one carrying
/// this transaction's date and kind, for validators that only know the
/// message at the point the error occurs.
pub fn attach_context(tx: &Transaction, err: LedgerError) -> LedgerError {
    match err {
        LedgerError::Validation { message, date: None, kind: None } => {
            LedgerError::validation_at(message, tx.when().to_string(), tx.kind())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_money::Currency;
    use rust_decimal_macros::dec;

    fn eur() -> Currency {
        Currency::from_code("EUR").expect("valid")
    }

    #[test]
    fn sell_quantity_zero_means_all() {
        let json = serde_json::json!("0");
        let q: SellQuantity = serde_json::from_value(json).expect("parses");
        assert!(q.is_all());
    }

    #[test]
    fn sell_quantity_literal_all() {
        let json = serde_json::json!("all");
        let q: SellQuantity = serde_json::from_value(json).expect("parses");
        assert!(q.is_all());
    }

    #[test]
    fn sell_quantity_exact_nonzero() {
        let json = serde_json::json!("7.5");
        let q: SellQuantity = serde_json::from_value(json).expect("parses");
        assert_eq!(q, SellQuantity::Exact(Quantity::new(dec!(7.5))));
    }

    #[test]
    fn buy_round_trips_through_json_with_no_nested_currency_object() {
        let tx = Transaction::Buy {
            date: Date::from_ymd(2025, 1, 3).expect("valid"),
            ticker: "AAA".to_string(),
            quantity: Quantity::new(dec!(10)),
            amount: Money::new(dec!(800), eur()),
            memo: None,
        };
        let value = serde_json::to_value(&tx).expect("serializes");
        assert_eq!(value["command"], "buy");
        assert_eq!(value["security"], "AAA");
        assert_eq!(value["amount"], "800");
        assert!(value.get("currency").is_none());
        let back: Transaction = serde_json::from_value(value).expect("deserializes");
        let Transaction::Buy { amount, .. } = &back else { panic!("buy") };
        assert_eq!(amount.amount, dec!(800));
        assert!(amount.currency.is_unbound());
    }

    #[test]
    fn deposit_round_trips_with_sibling_currency_field() {
        let tx = Transaction::Deposit {
            date: Date::from_ymd(2025, 1, 2).expect("valid"),
            amount: Money::new(dec!(1000), eur()),
            settles: None,
            memo: None,
        };
        let value = serde_json::to_value(&tx).expect("serializes");
        assert_eq!(value["currency"], "EUR");
        let back: Transaction = serde_json::from_value(value).expect("deserializes");
        assert_eq!(back, tx);
    }

    #[test]
    fn missing_required_field_reports_command_and_name() {
        let json = serde_json::json!({ "command": "buy", "date": "2025-01-03", "security": "AAA" });
        let err = serde_json::from_value::<Transaction>(json).unwrap_err();
        assert!(err.to_string().contains("buy requires field"));
    }

    #[test]
    fn unknown_command_is_rejected() {
        let json = serde_json::json!({ "command": "teleport", "date": "2025-01-03" });
        let err = serde_json::from_value::<Transaction>(json).unwrap_err();
        assert!(err.to_string().contains("unknown command"));
    }

    #[test]
    fn dividend_accepts_per_share_or_total() {
        let per_share = serde_json::json!({
            "command": "dividend", "date": "2025-04-01", "security": "AAA",
            "amount_per_share": "0.50"
        });
        let tx: Transaction = serde_json::from_value(per_share).expect("parses");
        assert!(matches!(tx, Transaction::Dividend { amount: DividendAmount::PerShare(_), .. }));

        let total = serde_json::json!({
            "command": "dividend", "date": "2025-04-01", "security": "AAA",
            "amount": "50"
        });
        let tx: Transaction = serde_json::from_value(total).expect("parses");
        assert!(matches!(tx, Transaction::Dividend { amount: DividendAmount::Total(_), .. }));
    }

    #[test]
    fn convert_round_trips_with_two_currency_pairs() {
        let tx = Transaction::Convert {
            date: Date::from_ymd(2025, 1, 1).expect("valid"),
            from_currency: Currency::from_code("USD").expect("valid"),
            from_amount: Money::new(dec!(100), Currency::from_code("USD").expect("valid")),
            to_currency: eur(),
            to_amount: Money::new(dec!(90), eur()),
            memo: None,
        };
        let value = serde_json::to_value(&tx).expect("serializes");
        assert_eq!(value["from-currency"], "USD");
        assert_eq!(value["to-currency"], "EUR");
        let back: Transaction = serde_json::from_value(value).expect("deserializes");
        assert_eq!(back, tx);
    }
}
