use thiserror::Error;

/// The error taxonomy the core surfaces. `Parse` and `Validation` are the two
/// callers most often need to distinguish (a malformed line vs. a semantic
/// violation of an otherwise well-formed one); the rest are narrower.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("invalid date '{input}'")]
    InvalidDate { input: String },

    #[error("validation error{}: {message}", event_suffix(.date, .kind))]
    Validation {
        message: String,
        date: Option<String>,
        kind: Option<String>,
    },

    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: String, right: String },

    #[error("no exchange rate available from {from} to {to} on {date}")]
    RateMissing {
        from: String,
        to: String,
        date: String,
    },

    #[error("io error: {0}")]
    Io(String),
}

fn event_suffix(date: &Option<String>, kind: &Option<String>) -> String {
    match (date, kind) {
        (Some(d), Some(k)) => format!(" ({k} on {d})"),
        (Some(d), None) => format!(" (on {d})"),
        (None, Some(k)) => format!(" ({k})"),
        (None, None) => String::new(),
    }
}

impl LedgerError {
    pub fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation {
            message: message.into(),
            date: None,
            kind: None,
        }
    }

    pub fn validation_at(message: impl Into<String>, date: impl Into<String>, kind: impl Into<String>) -> Self {
        LedgerError::Validation {
            message: message.into(),
            date: Some(date.into()),
            kind: Some(kind.into()),
        }
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Io(err.to_string())
    }
}

impl From<ledger_money::MoneyError> for LedgerError {
    fn from(err: ledger_money::MoneyError) -> Self {
        match err {
            ledger_money::MoneyError::CurrencyMismatch { left, right } => {
                LedgerError::CurrencyMismatch { left, right }
            }
            ledger_money::MoneyError::InvalidCurrencyCode { code } => {
                LedgerError::Validation {
                    message: format!("invalid currency code '{code}'"),
                    date: None,
                    kind: None,
                }
            }
            ledger_money::MoneyError::UnboundCurrency => {
                LedgerError::validation("unbound currency")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_includes_context_when_present() {
        let err = LedgerError::validation_at("oversell", "2025-03-01", "sell");
        assert_eq!(
            err.to_string(),
            "validation error (sell on 2025-03-01): oversell"
        );
    }

    #[test]
    fn validation_error_without_context_omits_parens() {
        let err = LedgerError::validation("bad input");
        assert_eq!(err.to_string(), "validation error: bad input");
    }
}
