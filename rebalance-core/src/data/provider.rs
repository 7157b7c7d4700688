//! History provider trait and structured error types.
//!
//! A `HistoryProvider` returns the recent daily bars for one symbol. The engine
//! uses it to fetch instruments that are not in the caller-supplied universe:
//! holdings without a snapshot and reserve symbols during relaxation passes.

use thiserror::Error;

use crate::domain::{Bar, InstrumentSnapshot};

#[derive(Debug, Error)]
pub enum DataError {
    #[error("no usable data for '{symbol}': {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(String),
}

/// Source of recent daily history.
pub trait HistoryProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Recent daily bars for `symbol`, oldest first.
    fn history(&self, symbol: &str) -> Result<Vec<Bar>, DataError>;
}

/// Fetch history and build a snapshot priced at the last sane close.
///
/// Void and insane bars are dropped first; nothing left is `DataUnavailable`.
pub fn fetch_snapshot(
    provider: &dyn HistoryProvider,
    symbol: &str,
    sector: &str,
) -> Result<InstrumentSnapshot, DataError> {
    let mut bars = provider.history(symbol)?;
    bars.retain(Bar::is_sane);
    bars.sort_by_key(|b| b.date);
    bars.dedup_by_key(|b| b.date);
    if bars.is_empty() {
        return Err(DataError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: format!("{} returned no usable bars", provider.name()),
        });
    }
    Ok(InstrumentSnapshot::from_history(symbol, sector, bars))
}
