//! `SecurityId`: the tagged variant over the ways a security is identified.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::LedgerError;

/// A security identifier. Always has a canonical string form, used both for
/// display and for round-tripping through the `id` field of a `declare`
/// event.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(try_from = "String", into = "String")]
pub enum SecurityId {
    /// ISIN + Market Identifier Code, e.g. `FR0000120271.XPAR`.
    Mssi { isin: String, mic: String },
    /// A bare ISIN with no venue, e.g. `US0378331005`.
    IsinOnly(String),
    /// A currency pair, e.g. `USD/EUR`.
    CurrencyPair { from: String, to: String },
    /// A user-chosen label for an asset with no public identifier.
    Private(String),
}

impl SecurityId {
    pub fn canonical(&self) -> String {
        match self {
            SecurityId::Mssi { isin, mic } => format!("{isin}.{mic}"),
            SecurityId::IsinOnly(isin) => isin.clone(),
            SecurityId::CurrencyPair { from, to } => format!("{from}/{to}"),
            SecurityId::Private(label) => format!("private:{label}"),
        }
    }

    fn parse(s: &str) -> Result<Self, LedgerError> {
        if let Some(label) = s.strip_prefix("private:") {
            if label.is_empty() {
                return Err(LedgerError::validation("private id requires a non-empty label"));
            }
            return Ok(SecurityId::Private(label.to_string()));
        }
        if let Some((from, to)) = s.split_once('/') {
            if from.len() != 3 || to.len() != 3 || !from.chars().all(|c| c.is_ascii_uppercase())
                || !to.chars().all(|c| c.is_ascii_uppercase())
            {
                return Err(LedgerError::validation(format!(
                    "invalid currency pair id '{s}'"
                )));
            }
            return Ok(SecurityId::CurrencyPair {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        if let Some((isin, mic)) = s.split_once('.') {
            validate_isin(isin)?;
            if mic.is_empty() {
                return Err(LedgerError::validation(format!("invalid MSSI id '{s}'")));
            }
            return Ok(SecurityId::Mssi {
                isin: isin.to_string(),
                mic: mic.to_string(),
            });
        }
        validate_isin(s)?;
        Ok(SecurityId::IsinOnly(s.to_string()))
    }
}

fn validate_isin(isin: &str) -> Result<(), LedgerError> {
    let valid = isin.len() == 12
        && isin.chars().take(2).all(|c| c.is_ascii_uppercase())
        && isin.chars().skip(2).all(|c| c.is_ascii_alphanumeric());
    if valid {
        Ok(())
    } else {
        Err(LedgerError::validation(format!("invalid ISIN '{isin}'")))
    }
}

impl TryFrom<String> for SecurityId {
    type Error = LedgerError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        SecurityId::parse(&s)
    }
}

impl From<SecurityId> for String {
    fn from(id: SecurityId) -> Self {
        id.canonical()
    }
}

impl fmt::Display for SecurityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}
