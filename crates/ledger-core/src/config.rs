//! Configuration: embedded defaults with optional override files.

use serde::Deserialize;
use std::path::PathBuf;

use crate::cost_basis::Method;

static EMBEDDED_CONFIG: &str = include_str!("../data/config.toml");

#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    #[serde(default)]
    reporting_currency_fallback: Option<String>,
    #[serde(default)]
    money_display_precision: Option<u32>,
    #[serde(default)]
    price_display_precision: Option<u32>,
    #[serde(default)]
    default_cost_basis_method: Option<String>,
}

/// Engine-wide settings that are not part of any single ledger: the
/// reporting-currency fallback used when a ledger has no `init` event, the
/// decimal precision used when rendering money and prices, and the
/// cost-basis method a caller defaults to absent an explicit choice.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub reporting_currency_fallback: String,
    pub money_display_precision: u32,
    pub price_display_precision: u32,
    pub default_cost_basis_method: Method,
}

impl Default for Config {
    fn default() -> Self {
        Self::embedded()
    }
}

impl Config {
    /// Load the configuration compiled into the binary.
    pub fn embedded() -> Self {
        Self::from_toml(EMBEDDED_CONFIG).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to parse embedded config, using hardcoded fallback");
            Self::hardcoded_fallback()
        })
    }

    fn hardcoded_fallback() -> Self {
        Self {
            reporting_currency_fallback: "EUR".to_string(),
            money_display_precision: 2,
            price_display_precision: 4,
            default_cost_basis_method: Method::Average,
        }
    }

    fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        let raw: RawConfig = toml::from_str(content)?;
        let fallback = Self::hardcoded_fallback();
        Ok(Self {
            reporting_currency_fallback: raw
                .reporting_currency_fallback
                .unwrap_or(fallback.reporting_currency_fallback),
            money_display_precision: raw
                .money_display_precision
                .unwrap_or(fallback.money_display_precision),
            price_display_precision: raw
                .price_display_precision
                .unwrap_or(fallback.price_display_precision),
            default_cost_basis_method: raw
                .default_cost_basis_method
                .as_deref()
                .and_then(Method::parse)
                .unwrap_or(fallback.default_cost_basis_method),
        })
    }

    /// Merge embedded defaults with override files, in order:
    /// 1. `./config.toml` (current directory)
    /// 2. `~/.config/ledger/config.toml` (user config directory)
    ///
    /// Later files' present fields take precedence over earlier ones.
    pub fn load_with_overrides() -> Self {
        let mut config = Self::embedded();
        for path in Self::override_paths() {
            if path.exists()
                && let Ok(content) = std::fs::read_to_string(&path)
                && let Ok(over) = Self::from_toml(&content)
            {
                config = over;
            }
        }
        config
    }

    fn override_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];
        if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
            paths.push(home.join(".config").join("ledger").join("config.toml"));
        }
        paths
    }
}
