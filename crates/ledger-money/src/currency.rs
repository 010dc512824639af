//! Currency codes, including the "not yet bound" sentinel.

use crate::error::MoneyError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A three-letter currency code, or the empty-currency sentinel meaning
/// "not yet bound" (used at construction time before the validator binds
/// it from a security's declaration).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Currency(Option<iso_currency::Currency>);

impl Currency {
    /// The unbound sentinel: no currency has been assigned yet.
    pub const UNBOUND: Currency = Currency(None);

    /// Parse a three-letter ISO 4217 code. An empty string parses to `UNBOUND`.
    pub fn from_code(code: &str) -> Result<Self, MoneyError> {
        if code.is_empty() {
            return Ok(Self::UNBOUND);
        }
        let upper = code.to_uppercase();
        if upper.len() != 3 || !upper.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(MoneyError::InvalidCurrencyCode { code: upper });
        }
        iso_currency::Currency::from_code(&upper)
            .map(|c| Currency(Some(c)))
            .ok_or(MoneyError::InvalidCurrencyCode { code: upper })
    }

    pub fn is_unbound(&self) -> bool {
        self.0.is_none()
    }

    /// The three-letter code, or the empty string for the unbound sentinel.
    pub fn code(&self) -> &'static str {
        match self.0 {
            Some(c) => c.code(),
            None => "",
        }
    }

    /// Decimal places conventionally used to render this currency (defaults to 2).
    pub fn minor_units(&self) -> u32 {
        self.0.and_then(|c| c.exponent()).unwrap_or(2) as u32
    }

    pub(crate) fn inner(&self) -> Option<iso_currency::Currency> {
        self.0
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self::UNBOUND
    }
}

impl Serialize for Currency {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for Currency {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Currency::from_code(&s).map_err(serde::de::Error::custom)
    }
}

impl JsonSchema for Currency {
    fn schema_name() -> String {
        "Currency".to_owned()
    }

    fn json_schema(generator: &mut schemars::r#gen::SchemaGenerator) -> schemars::schema::Schema {
        let mut schema = generator.subschema_for::<String>().into_object();
        schema.string().pattern = Some(r"^([A-Z]{3})?$".to_owned());
        schema.into()
    }
}
