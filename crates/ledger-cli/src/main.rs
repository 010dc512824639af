use std::fs;
use std::process::ExitCode;

use clap::Parser;
use ledger_core::{review, Currency, Date, Ledger, LedgerError, Method, Range, Snapshot};
use schemars::schema_for;
use serde::Serialize;

mod commands;
use commands::Commands;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Exit kinds mirroring the core's error taxonomy, documented at the CLI
/// boundary: `Usage` for malformed invocation, everything else mapped
/// straight from the `LedgerError` the core returned.
#[repr(u8)]
enum ExitKind {
    Usage = 64,
    Validation = 65,
    RateMissing = 68,
    Io = 74,
}

fn exit_kind(err: &LedgerError) -> ExitKind {
    match err {
        LedgerError::Validation { .. } | LedgerError::CurrencyMismatch { .. } | LedgerError::InvalidDate { .. } => {
            ExitKind::Validation
        }
        LedgerError::RateMissing { .. } => ExitKind::RateMissing,
        LedgerError::Io(_) | LedgerError::Parse { .. } => ExitKind::Io,
    }
}

enum Failure {
    Usage(String),
    Ledger(LedgerError),
}

impl From<LedgerError> for Failure {
    fn from(err: LedgerError) -> Self {
        Failure::Ledger(err)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(Failure::Usage(message)) => {
            eprintln!("usage error: {message}");
            ExitCode::from(ExitKind::Usage as u8)
        }
        Err(Failure::Ledger(err)) => {
            eprintln!("error: {err}");
            ExitCode::from(exit_kind(&err) as u8)
        }
    }
}

fn run(command: Commands) -> Result<(), Failure> {
    match command {
        Commands::Validate { file, schema } => {
            if schema {
                let schema = schema_for!(ledger_core::Transaction);
                println!("{}", to_json(&schema)?);
                return Ok(());
            }
            let content = read_file(&file)?;
            let mut ledger = Ledger::new(fallback_currency()?);
            ledger.decode_validate(content.as_bytes())?;
            println!("{}", to_json(&ValidateReport { event_count: ledger.events().len() })?);
            Ok(())
        }
        Commands::Snapshot { file, date } => {
            let content = read_file(&file)?;
            let mut ledger = Ledger::new(fallback_currency()?);
            ledger.decode_validate(content.as_bytes())?;
            let as_of = Date::parse_lenient(&date, today())?;
            let reporting = ledger.reporting_currency(as_of);
            let snapshot = Snapshot::build(ledger.events(), as_of, reporting);
            println!("{}", to_json(&SnapshotDto::from_snapshot(&snapshot))?);
            Ok(())
        }
        Commands::Review { file, from, to, method } => {
            let content = read_file(&file)?;
            let mut ledger = Ledger::new(fallback_currency()?);
            ledger.decode_validate(content.as_bytes())?;
            let today = today();
            let from = Date::parse_lenient(&from, today)?;
            let to = Date::parse_lenient(&to, today)?;
            let method = parse_method(&method)?;
            let result = review::review(&ledger, Range::new(from, to), method)?;
            println!("{}", to_json(&ReviewDto::from_review(&result))?);
            Ok(())
        }
    }
}

fn today() -> Date {
    Date::from_naive(chrono::Local::now().date_naive())
}

fn read_file(path: &std::path::Path) -> Result<String, Failure> {
    fs::read_to_string(path).map_err(|e| Failure::Ledger(LedgerError::Io(e.to_string())))
}

fn to_json(value: &impl Serialize) -> Result<String, Failure> {
    serde_json::to_string_pretty(value).map_err(|e| Failure::Usage(e.to_string()))
}

fn parse_method(s: &str) -> Result<Method, Failure> {
    match s {
        "average" => Ok(Method::Average),
        "fifo" => Ok(Method::Fifo),
        other => Err(Failure::Usage(format!("unknown cost-basis method '{other}', expected 'average' or 'fifo'"))),
    }
}

fn fallback_currency() -> Result<Currency, Failure> {
    let config = ledger_core::Config::embedded();
    Currency::from_code(&config.reporting_currency_fallback).map_err(|e| Failure::Usage(e.to_string()))
}

#[derive(Serialize)]
struct ValidateReport {
    event_count: usize,
}

#[derive(Serialize)]
struct MoneyDto {
    amount: rust_decimal::Decimal,
    currency: String,
}

impl From<ledger_money::Money> for MoneyDto {
    fn from(m: ledger_money::Money) -> Self {
        MoneyDto { amount: m.amount, currency: m.currency.code().to_string() }
    }
}

#[derive(Serialize)]
struct PositionDto {
    ticker: String,
    quantity: rust_decimal::Decimal,
    price: Option<MoneyDto>,
    market_value: Option<MoneyDto>,
}

#[derive(Serialize)]
struct SnapshotDto {
    as_of: String,
    reporting_currency: String,
    positions: Vec<PositionDto>,
    cash: MoneyDto,
    total_portfolio: Option<MoneyDto>,
}

impl SnapshotDto {
    fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut positions = Vec::new();
        for (ticker, _declaration) in snapshot.declarations() {
            let quantity = snapshot.position(ticker);
            if quantity.is_zero() && snapshot.price(ticker).is_none() {
                continue;
            }
            positions.push(PositionDto {
                ticker: ticker.clone(),
                quantity: quantity.value(),
                price: snapshot.price(ticker).map(MoneyDto::from),
                market_value: snapshot.market_value(ticker).map(MoneyDto::from),
            });
        }
        let reporting = snapshot.reporting_currency();
        SnapshotDto {
            as_of: format!("{}-{:02}-{:02}", snapshot.as_of().year(), snapshot.as_of().month(), snapshot.as_of().day()),
            reporting_currency: reporting.code().to_string(),
            positions,
            cash: snapshot.cash(reporting).into(),
            total_portfolio: snapshot.total_portfolio().ok().map(MoneyDto::from),
        }
    }
}

#[derive(Serialize)]
struct AssetReviewDto {
    ticker: String,
    start_value: MoneyDto,
    end_value: MoneyDto,
    trading_flow: MoneyDto,
    market_gain: MoneyDto,
    realized_gain: MoneyDto,
    unrealized_gain: MoneyDto,
    dividends: MoneyDto,
    twr: rust_decimal::Decimal,
    twr_display: String,
}

#[derive(Serialize)]
struct TwrDto {
    portfolio: rust_decimal::Decimal,
    portfolio_display: String,
    per_asset: std::collections::HashMap<String, rust_decimal::Decimal>,
    per_currency: std::collections::HashMap<String, rust_decimal::Decimal>,
}

#[derive(Serialize)]
struct ReviewDto {
    cash_flow: MoneyDto,
    market_gain: MoneyDto,
    forex_gain: MoneyDto,
    realized_gains: MoneyDto,
    dividends: MoneyDto,
    twr: TwrDto,
    assets: Vec<AssetReviewDto>,
}

impl ReviewDto {
    fn from_review(review: &ledger_core::PeriodReview) -> Self {
        ReviewDto {
            cash_flow: review.cash_flow.into(),
            market_gain: review.market_gain.into(),
            forex_gain: review.forex_gain.into(),
            realized_gains: review.realized_gains.into(),
            dividends: review.dividends.into(),
            twr: TwrDto {
                portfolio: review.twr.portfolio,
                portfolio_display: ledger_money::Percent::from_ratio(review.twr.portfolio).to_string(),
                per_asset: review.twr.per_asset.clone(),
                per_currency: review.twr.per_currency.clone(),
            },
            assets: review
                .assets
                .iter()
                .map(|a| AssetReviewDto {
                    ticker: a.ticker.clone(),
                    start_value: a.start_value.into(),
                    end_value: a.end_value.into(),
                    trading_flow: a.trading_flow.into(),
                    market_gain: a.market_gain.into(),
                    realized_gain: a.realized_gain.into(),
                    unrealized_gain: a.unrealized_gain.into(),
                    dividends: a.dividends.into(),
                    twr: a.twr,
                    twr_display: ledger_money::Percent::from_ratio(a.twr).to_string(),
                })
                .collect(),
        }
    }
}
