use thiserror::Error;

/// Errors raised by the money primitives themselves (not the wider ledger).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: String, right: String },

    #[error("invalid currency code '{code}': not a recognized ISO 4217 currency")]
    InvalidCurrencyCode { code: String },

    #[error("operation requires a bound currency, got the unbound sentinel")]
    UnboundCurrency,
}
