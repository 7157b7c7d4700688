//! Instrument snapshot: the immutable per-pass view of one tradable symbol.

use super::bar::Bar;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sector tag used when the source does not supply one.
pub const UNCLASSIFIED_SECTOR: &str = "unclassified";

/// Current price, sector and recent history for one instrument.
///
/// Fetched once per screening pass and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentSnapshot {
    pub symbol: String,
    pub price: f64,
    pub sector: String,
    pub history: Vec<Bar>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SnapshotError {
    #[error("instrument symbol must not be empty")]
    EmptySymbol,

    #[error("{symbol}: price must be finite and > 0 (got {price})")]
    InvalidPrice { symbol: String, price: f64 },

    #[error("{symbol}: history is not in ascending date order")]
    UnorderedHistory { symbol: String },
}

impl InstrumentSnapshot {
    pub fn new(
        symbol: impl Into<String>,
        price: f64,
        sector: impl Into<String>,
        history: Vec<Bar>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            sector: sector.into(),
            history,
        }
    }

    /// Build a snapshot from a history alone; the last close is the price.
    pub fn from_history(symbol: impl Into<String>, sector: impl Into<String>, history: Vec<Bar>) -> Self {
        let price = history.last().map(|b| b.close).unwrap_or(f64::NAN);
        Self::new(symbol, price, sector, history)
    }

    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.symbol.trim().is_empty() {
            return Err(SnapshotError::EmptySymbol);
        }
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(SnapshotError::InvalidPrice {
                symbol: self.symbol.clone(),
                price: self.price,
            });
        }
        if self.history.windows(2).any(|w| w[0].date >= w[1].date) {
            return Err(SnapshotError::UnorderedHistory {
                symbol: self.symbol.clone(),
            });
        }
        Ok(())
    }
}
