//! Calendar dates, periods, and ranges.
//!
//! `Date` wraps [`chrono::NaiveDate`] with a distinguishable zero value that
//! sorts before any real date, plus the relative/anchored parsing forms the
//! CLI boundary needs (`±Nd/w/m/q/y`, `0d`, bare `DD`/`MM-DD`).

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::LedgerError;

/// A calendar day in UTC. `Date::ZERO` is a sentinel that sorts before any
/// real date and is never produced by parsing a real event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Date(NaiveDate);

impl Date {
    /// Sentinel that sorts before any real date. Never produced by `parse`.
    pub fn zero() -> Self {
        #[allow(clippy::expect_used)]
        Date(NaiveDate::from_ymd_opt(1, 1, 1).expect("year 1 is a valid NaiveDate"))
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Result<Self, LedgerError> {
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Date)
            .ok_or(LedgerError::InvalidDate {
                input: format!("{year}-{month:02}-{day:02}"),
            })
    }

    pub fn from_naive(date: NaiveDate) -> Self {
        Date(date)
    }

    pub fn naive(&self) -> NaiveDate {
        self.0
    }

    pub fn add_days(&self, days: i64) -> Self {
        Date(self.0 + Duration::days(days))
    }

    pub fn before(&self, other: Date) -> bool {
        self.0 < other.0
    }

    pub fn after(&self, other: Date) -> bool {
        self.0 > other.0
    }

    pub fn weekday(&self) -> Weekday {
        self.0.weekday()
    }

    pub fn iso_week(&self) -> u32 {
        self.0.iso_week().week()
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn day(&self) -> u32 {
        self.0.day()
    }

    pub fn start_of(&self, period: Period) -> Self {
        period.range(*self).from
    }

    pub fn end_of(&self, period: Period) -> Self {
        period.range(*self).to
    }

    /// Strict `YYYY-MM-DD` parse, used for the canonical file format.
    pub fn parse_strict(s: &str) -> Result<Self, LedgerError> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Date)
            .map_err(|_| LedgerError::InvalidDate { input: s.to_string() })
    }

    /// Lenient parse for CLI input: ISO (possibly unpadded), `±Nd/w/m/q/y`
    /// relative to `today`, the literal `0d` (today), `DD` or `MM-DD`
    /// anchored to `today`.
    pub fn parse_lenient(s: &str, today: Date) -> Result<Self, LedgerError> {
        let s = s.trim();
        if s == "0d" {
            return Ok(today);
        }
        if let Some(rel) = parse_relative(s, today) {
            return rel;
        }
        if let Ok(d) = Date::parse_strict(s) {
            return Ok(d);
        }
        if let Some(d) = parse_lenient_iso(s) {
            return Ok(d);
        }
        if let Some(d) = parse_short_form(s, today) {
            return Ok(d);
        }
        Err(LedgerError::InvalidDate { input: s.to_string() })
    }
}

fn parse_relative(s: &str, today: Date) -> Option<Result<Date, LedgerError>> {
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1i64, &s[1..]),
        b'-' => (-1i64, &s[1..]),
        _ => return None,
    };
    let (digits, unit) = rest.split_at(rest.len().checked_sub(1)?);
    let n: i64 = digits.parse().ok()?;
    let n = n * sign;
    Some(Ok(match unit {
        "d" => today.add_days(n),
        "w" => today.add_days(n * 7),
        "m" => add_months(today, n),
        "q" => add_months(today, n * 3),
        "y" => add_months(today, n * 12),
        _ => return None,
    }))
}

/// Month arithmetic that normalizes overflow (`Jan 32` -> `Feb 1`) by adding
/// whole months to a day count rather than clamping.
fn add_months(date: Date, months: i64) -> Date {
    let total_months = date.year() as i64 * 12 + (date.month() as i64 - 1) + months;
    let year = total_months.div_euclid(12) as i32;
    let month = total_months.rem_euclid(12) as u32 + 1;
    normalize_ymd(year, month, date.day())
}

/// Normalize an overflowing (year, month, day) triple: month 0 means "last
/// month of the previous year"; day 0 means "last day of the previous month".
fn normalize_ymd(mut year: i32, mut month: u32, mut day: u32) -> Date {
    if month == 0 {
        year -= 1;
        month = 12;
    }
    while month > 12 {
        month -= 12;
        year += 1;
    }
    if day == 0 {
        let (py, pm) = if month == 1 { (year - 1, 12) } else { (year, month - 1) };
        day = days_in_month(py, pm);
        month = pm;
        year = py;
    }
    let max_day = days_in_month(year, month);
    if day > max_day {
        return normalize_ymd(year, month + 1, day - max_day);
    }
    #[allow(clippy::expect_used)]
    Date(NaiveDate::from_ymd_opt(year, month, day).expect("normalized components are valid"))
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (ny, nm) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    #[allow(clippy::expect_used)]
    let first_of_next = NaiveDate::from_ymd_opt(ny, nm, 1).expect("valid");
    #[allow(clippy::expect_used)]
    let first_of_this = NaiveDate::from_ymd_opt(year, month, 1).expect("valid");
    (first_of_next - first_of_this).num_days() as u32
}

fn parse_lenient_iso(s: &str) -> Option<Date> {
    let parts: Vec<&str> = s.split('-').collect();
    if parts.len() != 3 {
        return None;
    }
    let year: i32 = parts[0].parse().ok()?;
    let month: u32 = parts[1].parse().ok()?;
    let day: u32 = parts[2].parse().ok()?;
    Some(normalize_ymd(year, month, day))
}

fn parse_short_form(s: &str, today: Date) -> Option<Date> {
    if let Ok(day) = s.parse::<u32>() {
        if s.len() <= 2 {
            return Some(normalize_ymd(today.year(), today.month(), day));
        }
    }
    if let [month_str, day_str] = s.split('-').collect::<Vec<_>>().as_slice() {
        let month: u32 = month_str.parse().ok()?;
        let day: u32 = day_str.parse().ok()?;
        return Some(normalize_ymd(today.year(), month, day));
    }
    None
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// A named recurrence granularity for grouping a [`Range`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Period {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Period {
    /// The `[start, end]` range of this period containing `date`.
    pub fn range(&self, date: Date) -> Range {
        let (from, to) = match self {
            Period::Daily => (date, date),
            Period::Weekly => {
                let weekday = date.weekday().num_days_from_monday() as i64;
                let from = date.add_days(-weekday);
                (from, from.add_days(6))
            }
            Period::Monthly => {
                let from = normalize_ymd(date.year(), date.month(), 1);
                let to = normalize_ymd(date.year(), date.month(), days_in_month(date.year(), date.month()));
                (from, to)
            }
            Period::Quarterly => {
                let quarter_start_month = ((date.month() - 1) / 3) * 3 + 1;
                let from = normalize_ymd(date.year(), quarter_start_month, 1);
                let end_month = quarter_start_month + 2;
                let to = normalize_ymd(date.year(), end_month, days_in_month(date.year(), end_month));
                (from, to)
            }
            Period::Yearly => (
                normalize_ymd(date.year(), 1, 1),
                normalize_ymd(date.year(), 12, 31),
            ),
        };
        Range {
            from,
            to,
            period: Some(*self),
        }
    }
}

/// A closed `[from, to]` interval of dates, optionally tagged with the
/// [`Period`] it exactly matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Range {
    pub from: Date,
    pub to: Date,
    #[serde(skip)]
    period: Option<Period>,
}

impl Range {
    pub fn new(from: Date, to: Date) -> Self {
        Self { from, to, period: None }
    }

    pub fn contains(&self, date: Date) -> bool {
        !date.before(self.from) && !date.after(self.to)
    }

    /// Returns the tagged period if this range exactly equals
    /// `Period::range(some_date)` for some candidate period, else `None`.
    pub fn period(&self) -> Option<Period> {
        if self.period.is_some() {
            return self.period;
        }
        for candidate in [
            Period::Daily,
            Period::Weekly,
            Period::Monthly,
            Period::Quarterly,
            Period::Yearly,
        ] {
            if candidate.range(self.from) == *self {
                return Some(candidate);
            }
        }
        None
    }

    /// Canonical short label: `2025-03`, `2025-Q2`, `2025-W14`, `2025`, or
    /// `2025-03-14` for an arbitrary custom range.
    pub fn identifier(&self) -> String {
        match self.period() {
            Some(Period::Daily) => self.from.to_string(),
            Some(Period::Weekly) => format!("{}-W{:02}", self.from.year(), self.from.iso_week()),
            Some(Period::Monthly) => format!("{}-{:02}", self.from.year(), self.from.month()),
            Some(Period::Quarterly) => {
                format!("{}-Q{}", self.from.year(), (self.from.month() - 1) / 3 + 1)
            }
            Some(Period::Yearly) => format!("{}", self.from.year()),
            None => {
                if self.from == self.to {
                    self.from.to_string()
                } else {
                    format!("{}..{}", self.from, self.to)
                }
            }
        }
    }
}
