//! Average True Range (ATR).
//!
//! TR[t] = max(high-low, |high-prev_close|, |low-prev_close|); the first bar has
//! no previous close and is excluded. ATR is the Wilder-smoothed TR.
//! Lookback: period.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }
}

/// True Range series. TR[0] is NaN (no previous close).
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let mut tr = vec![f64::NAN; bars.len()];
    for (i, w) in bars.windows(2).enumerate() {
        let (prev, bar) = (&w[0], &w[1]);
        tr[i + 1] = (bar.high - bar.low)
            .max((bar.high - prev.close).abs())
            .max((bar.low - prev.close).abs());
        // f64::max ignores a NaN operand; keep NaN inputs visible.
        if bar.high.is_nan() || bar.low.is_nan() || prev.close.is_nan() {
            tr[i + 1] = f64::NAN;
        }
    }
    tr
}

/// Wilder smoothing (alpha = 1/period).
///
/// Seeded with the mean of the first run of `period` consecutive non-NaN
/// values; a NaN after the seed taints the rest of the series.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let mut result = vec![f64::NAN; values.len()];
    if period == 0 {
        return result;
    }

    let mut run = 0;
    let seed_end = values.iter().position(|v| {
        run = if v.is_nan() { 0 } else { run + 1 };
        run == period
    });
    let Some(seed_end) = seed_end else {
        return result;
    };

    let p = period as f64;
    let mut prev = values[seed_end + 1 - period..=seed_end].iter().sum::<f64>() / p;
    result[seed_end] = prev;
    for (i, &v) in values.iter().enumerate().skip(seed_end + 1) {
        if v.is_nan() {
            break;
        }
        prev = (prev * (p - 1.0) + v) / p;
        result[i] = prev;
    }
    result
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        wilder_smooth(&true_range(bars), self.period)
    }
}
