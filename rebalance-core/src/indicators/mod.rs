//! Technical indicators and the per-instrument feature calculator.
//!
//! Every indicator implements [`Indicator`]: bar history in, a numeric series of
//! the same length out, with `NaN` during warmup. The [`IndicatorCalculator`]
//! runs a fixed set of them over one instrument's history and scores the latest
//! values into an [`IndicatorSet`].

pub mod atr;
pub mod bollinger;
pub mod calculator;
pub mod ema;
pub mod roc;
pub mod rsi;
pub mod volatility;
pub mod volume;

pub use atr::Atr;
pub use bollinger::{BandPoint, Bollinger};
pub use calculator::{IndicatorCalculator, IndicatorError, IndicatorSet, FEATURE_NAMES, MIN_HISTORY_BARS};
pub use ema::Ema;
pub use roc::Roc;
pub use rsi::Rsi;
pub use volatility::RealizedVolatility;
pub use volume::VolumeRatio;

use crate::domain::Bar;

/// Trait for indicators.
///
/// Indicators take a full bar series and produce a numeric output series of
/// the same length. The first `lookback()` values are `f64::NAN` (warmup), and
/// a NaN input taints every output whose window contains it.
///
/// No value at bar t may depend on bars after t.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "ema_12", "atr_14").
    fn name(&self) -> &str;

    /// Number of bars needed before the indicator produces valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;

    /// Latest value of the series, `NaN` when the history is too short.
    fn latest(&self, bars: &[Bar]) -> f64 {
        self.compute(bars).last().copied().unwrap_or(f64::NAN)
    }
}

/// Close prices of a bar series.
pub fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Trailing mean over `period` values. Any NaN in the window yields NaN.
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    for end in (period - 1)..values.len() {
        let window = &values[end + 1 - period..=end];
        out[end] = window.iter().sum::<f64>() / period as f64;
    }
    out
}

/// Population standard deviation of a slice (NaN-propagating).
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    var.sqrt()
}

/// Create synthetic bars from close prices for testing.
///
/// open = prev_close (or close for the first bar), high/low = max/min(open, close)
/// widened by 0.5%, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                date: base_date + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) * 1.005,
                low: open.min(close) * 0.995,
                close,
                volume: 1000,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
