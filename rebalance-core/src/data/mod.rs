//! Market data sources and the candidate universe

pub mod circuit_breaker;
pub mod csv_provider;
pub mod provider;
pub mod synthetic;
pub mod universe;
pub mod yahoo;

pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use csv_provider::CsvHistoryProvider;
pub use provider::{fetch_snapshot, DataError, HistoryProvider};
pub use synthetic::SyntheticHistoryProvider;
pub use universe::Universe;
pub use yahoo::{YahooHistoryProvider, YahooSettings};
