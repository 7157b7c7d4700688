//! Indicator calculator: one instrument's history in, a scored feature set out.
//!
//! Windows are fixed constants. Every score lands in [-1, 1] and a perfectly
//! neutral input (flat EMAs, RSI 50, mid-band close, unchanged price) scores 0.
//! The call either returns the full set or fails; there are no partial results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::volatility::daily_returns;
use super::{Atr, Bollinger, Ema, Indicator, RealizedVolatility, Roc, Rsi, VolumeRatio};
use crate::domain::Bar;

pub const EMA_FAST: usize = 12;
pub const EMA_SLOW: usize = 26;
pub const ROC_PERIOD: usize = 20;
pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_MULTIPLIER: f64 = 2.0;
pub const RSI_PERIOD: usize = 14;
pub const VOLUME_SHORT: usize = 5;
pub const VOLUME_LONG: usize = 20;
pub const VOLATILITY_WINDOW: usize = 20;
pub const ATR_PERIOD: usize = 14;
/// Bars over which the price direction for volume confirmation is measured.
pub const DIRECTION_BARS: usize = 5;
/// Daily returns kept for cross-asset correlation.
pub const RETURN_TAIL: usize = 20;

/// Shortest history the calculator accepts. Covers the slowest window (EMA 26)
/// with room for the smoothing to settle.
pub const MIN_HISTORY_BARS: usize = 35;

/// EMA spread of 5% maps to tanh(1).
const TREND_GAIN: f64 = 20.0;
/// ROC of 10% maps to tanh(1).
const ROC_SCALE: f64 = 10.0;

/// Feature names in `IndicatorSet::feature_vector` order.
pub const FEATURE_NAMES: [&str; 6] = [
    "momentum",
    "volatility_band",
    "oscillator",
    "volume_trend",
    "realized_volatility",
    "atr_pct",
];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndicatorError {
    #[error("insufficient history: need {required} bars, have {available}")]
    InsufficientHistory { required: usize, available: usize },

    #[error("indicator '{indicator}' produced a non-finite value")]
    Computation { indicator: String },
}

/// Scored technical features for one instrument at its latest bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    /// Trend strength from the EMA spread and rate of change.
    pub momentum: f64,
    /// Close position inside the Bollinger band, mapped from %B.
    pub volatility_band: f64,
    /// RSI recentred to [-1, 1].
    pub oscillator: f64,
    /// Volume expansion signed by the recent price direction.
    pub volume_trend: f64,
    /// Daily σ of close-to-close returns (raw, not scored).
    pub realized_volatility: f64,
    /// ATR as a fraction of the last close (raw, not scored).
    pub atr_pct: f64,
    /// Trailing daily returns, oldest first.
    #[serde(default)]
    pub recent_returns: Vec<f64>,
}

impl IndicatorSet {
    /// Build a set directly from feature values, without a return tail.
    pub fn from_features(features: [f64; 6]) -> Self {
        let [momentum, volatility_band, oscillator, volume_trend, realized_volatility, atr_pct] =
            features;
        Self {
            momentum,
            volatility_band,
            oscillator,
            volume_trend,
            realized_volatility,
            atr_pct,
            recent_returns: Vec::new(),
        }
    }

    /// Mean of the four scored features, in [-1, 1].
    pub fn technical_score(&self) -> f64 {
        (self.momentum + self.volatility_band + self.oscillator + self.volume_trend) / 4.0
    }

    pub fn feature_vector(&self) -> [f64; 6] {
        [
            self.momentum,
            self.volatility_band,
            self.oscillator,
            self.volume_trend,
            self.realized_volatility,
            self.atr_pct,
        ]
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.feature_vector()[i])
    }

    /// Named features for audit output.
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        FEATURE_NAMES
            .iter()
            .zip(self.feature_vector())
            .map(|(n, v)| (n.to_string(), v))
            .collect()
    }
}

/// Runs the fixed indicator set over a history.
#[derive(Debug, Clone)]
pub struct IndicatorCalculator {
    ema_fast: Ema,
    ema_slow: Ema,
    roc: Roc,
    bollinger: Bollinger,
    rsi: Rsi,
    volume: VolumeRatio,
    volatility: RealizedVolatility,
    atr: Atr,
}

impl Default for IndicatorCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl IndicatorCalculator {
    pub fn new() -> Self {
        Self {
            ema_fast: Ema::new(EMA_FAST),
            ema_slow: Ema::new(EMA_SLOW),
            roc: Roc::new(ROC_PERIOD),
            bollinger: Bollinger::new(BOLLINGER_PERIOD, BOLLINGER_MULTIPLIER),
            rsi: Rsi::new(RSI_PERIOD),
            volume: VolumeRatio::new(VOLUME_SHORT, VOLUME_LONG),
            volatility: RealizedVolatility::new(VOLATILITY_WINDOW),
            atr: Atr::new(ATR_PERIOD),
        }
    }

    pub fn compute(&self, history: &[Bar]) -> Result<IndicatorSet, IndicatorError> {
        if history.len() < MIN_HISTORY_BARS {
            return Err(IndicatorError::InsufficientHistory {
                required: MIN_HISTORY_BARS,
                available: history.len(),
            });
        }

        let fast = latest_finite(&self.ema_fast, history)?;
        let slow = latest_finite(&self.ema_slow, history)?;
        let roc = latest_finite(&self.roc, history)?;
        let percent_b = latest_finite(&self.bollinger, history)?;
        let rsi = latest_finite(&self.rsi, history)?;
        let volume_ratio = latest_finite(&self.volume, history)?;
        let realized_volatility = latest_finite(&self.volatility, history)?;
        let atr = latest_finite(&self.atr, history)?;

        let last = history[history.len() - 1].close;
        let base = history[history.len() - 1 - DIRECTION_BARS].close;
        let direction = check_finite("price_direction", last - base)?;
        if slow <= 0.0 || last <= 0.0 {
            return Err(computation("price_level"));
        }

        let trend = if fast == slow {
            0.0
        } else {
            (TREND_GAIN * (fast - slow) / slow).tanh()
        };
        let momentum = 0.5 * trend + 0.5 * (roc / ROC_SCALE).tanh();
        let volatility_band = (2.0 * percent_b - 1.0).clamp(-1.0, 1.0);
        let oscillator = ((rsi - 50.0) / 50.0).clamp(-1.0, 1.0);
        let volume_trend = if direction == 0.0 {
            0.0
        } else {
            (volume_ratio - 1.0).tanh() * direction.signum()
        };

        let returns = daily_returns(history);
        let recent_returns = returns[returns.len().saturating_sub(RETURN_TAIL)..].to_vec();
        if recent_returns.iter().any(|r| !r.is_finite()) {
            return Err(computation("daily_returns"));
        }

        Ok(IndicatorSet {
            momentum: check_finite("momentum", momentum)?,
            volatility_band,
            oscillator,
            volume_trend: check_finite("volume_trend", volume_trend)?,
            realized_volatility,
            atr_pct: check_finite("atr_pct", atr / last)?,
            recent_returns,
        })
    }
}

fn latest_finite(indicator: &dyn Indicator, bars: &[Bar]) -> Result<f64, IndicatorError> {
    check_finite(indicator.name(), indicator.latest(bars))
}

fn check_finite(name: &str, value: f64) -> Result<f64, IndicatorError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(computation(name))
    }
}

fn computation(name: &str) -> IndicatorError {
    IndicatorError::Computation {
        indicator: name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    fn trend(n: usize, daily: f64) -> Vec<f64> {
        (0..n).map(|i| 100.0 * (1.0 + daily).powi(i as i32)).collect()
    }

    #[test]
    fn short_history_is_rejected() {
        let bars = make_bars(&[100.0; 10]);
        let err = IndicatorCalculator::new().compute(&bars).unwrap_err();
        assert_eq!(
            err,
            IndicatorError::InsufficientHistory {
                required: MIN_HISTORY_BARS,
                available: 10
            }
        );
    }

    #[test]
    fn flat_history_scores_neutral() {
        let set = IndicatorCalculator::new().compute(&make_bars(&[100.0; 40])).unwrap();
        assert_approx(set.momentum, 0.0, DEFAULT_EPSILON);
        assert_approx(set.volatility_band, 0.0, DEFAULT_EPSILON);
        assert_approx(set.oscillator, 0.0, DEFAULT_EPSILON);
        assert_approx(set.volume_trend, 0.0, DEFAULT_EPSILON);
        assert_approx(set.technical_score(), 0.0, DEFAULT_EPSILON);
        assert_eq!(set.realized_volatility, 0.0);
        assert_eq!(set.recent_returns.len(), RETURN_TAIL);
    }

    #[test]
    fn uptrend_scores_positive() {
        let set = IndicatorCalculator::new().compute(&make_bars(&trend(60, 0.01))).unwrap();
        assert!(set.momentum > 0.0);
        assert!(set.oscillator > 0.9);
        assert!(set.volatility_band > 0.0);
        assert!(set.technical_score() > 0.0);
    }

    #[test]
    fn downtrend_scores_negative() {
        let set = IndicatorCalculator::new().compute(&make_bars(&trend(60, -0.01))).unwrap();
        assert!(set.momentum < 0.0);
        assert!(set.oscillator < -0.9);
        assert!(set.technical_score() < 0.0);
    }

    #[test]
    fn scores_are_bounded() {
        let closes: Vec<f64> = (0..80)
            .map(|i| 100.0 + 30.0 * ((i as f64) * 0.7).sin())
            .collect();
        let set = IndicatorCalculator::new().compute(&make_bars(&closes)).unwrap();
        for v in [set.momentum, set.volatility_band, set.oscillator, set.volume_trend] {
            assert!((-1.0..=1.0).contains(&v), "score out of range: {v}");
        }
        assert!(set.realized_volatility > 0.0);
        assert!(set.atr_pct > 0.0);
    }

    #[test]
    fn nan_close_fails_with_named_indicator() {
        let mut bars = make_bars(&[100.0; 40]);
        bars[39].close = f64::NAN;
        let err = IndicatorCalculator::new().compute(&bars).unwrap_err();
        assert!(matches!(err, IndicatorError::Computation { .. }));
    }

    #[test]
    fn deterministic() {
        let bars = make_bars(&trend(50, 0.004));
        let calc = IndicatorCalculator::new();
        assert_eq!(calc.compute(&bars).unwrap(), calc.compute(&bars).unwrap());
    }

    #[test]
    fn get_by_name_matches_fields() {
        let set = IndicatorSet::from_features([0.1, 0.2, 0.3, 0.4, 0.01, 0.02]);
        assert_eq!(set.get("oscillator"), Some(0.3));
        assert_eq!(set.get("atr_pct"), Some(0.02));
        assert_eq!(set.get("nope"), None);
        assert_eq!(set.to_map().len(), FEATURE_NAMES.len());
    }
}
