pub mod codec;
pub mod config;
pub mod cost_basis;
pub mod date;
pub mod error;
pub mod ids;
pub mod ledger;
pub mod market_data;
pub mod ordering;
pub mod review;
pub mod snapshot;
pub mod transaction;
pub mod validation;

pub use config::Config;
pub use cost_basis::{LotTracker, Method, Realization};
pub use date::{Date, Period, Range};
pub use error::LedgerError;
pub use ids::SecurityId;
pub use ledger::Ledger;
pub use market_data::{update_market_data, MarketDataSummary};
pub use review::{PeriodReview, Twr};
pub use snapshot::{Declaration, Snapshot};
pub use transaction::{Counterparty, DividendAmount, PriceKey, SellQuantity, Transaction};

pub use ledger_money::{Currency, Money, Quantity};
