//! Deterministic synthetic history for offline runs.
//!
//! Each symbol gets its own random walk seeded from the BLAKE3 hash of its
//! name, so the same symbol always produces the same bars. Synthetic data is a
//! developer mode; the CLI tags results produced from it.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::provider::{DataError, HistoryProvider};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct SyntheticHistoryProvider {
    /// Number of weekday bars to produce.
    pub bars: usize,
    /// Last date of the series (inclusive, rolled back to a weekday).
    pub end: NaiveDate,
    /// Added to every daily return.
    pub drift: f64,
}

impl SyntheticHistoryProvider {
    pub fn new(bars: usize, end: NaiveDate) -> Self {
        Self {
            bars,
            end,
            drift: 0.0,
        }
    }

    pub fn with_drift(mut self, drift: f64) -> Self {
        self.drift = drift;
        self
    }

    fn trading_days(&self) -> Vec<NaiveDate> {
        let mut days = Vec::with_capacity(self.bars);
        let mut current = self.end;
        while days.len() < self.bars {
            if !matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
                days.push(current);
            }
            current -= Duration::days(1);
        }
        days.reverse();
        days
    }
}

/// Random walk for one symbol over the given dates.
pub fn synthetic_bars(symbol: &str, dates: &[NaiveDate], drift: f64) -> Vec<Bar> {
    let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut price = 100.0_f64;
    dates
        .iter()
        .map(|&date| {
            let daily_return: f64 = rng.gen_range(-0.03..0.03) + drift;
            let open = price;
            let close = (price * (1.0 + daily_return)).max(0.01);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
            let volume = rng.gen_range(500_000..5_000_000u64);
            price = close;
            Bar {
                date,
                open,
                high,
                low,
                close,
                volume,
            }
        })
        .collect()
}

impl HistoryProvider for SyntheticHistoryProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn history(&self, symbol: &str) -> Result<Vec<Bar>, DataError> {
        if symbol.trim().is_empty() {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        Ok(synthetic_bars(symbol, &self.trading_days(), self.drift))
    }
}
