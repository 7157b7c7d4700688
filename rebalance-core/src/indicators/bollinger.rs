//! Bollinger Bands and the %B position of the close inside them.
//!
//! middle = SMA(close, period), upper/lower = middle ± mult · σ (population σ).
//! The `Indicator` output is %B = (close - lower) / (upper - lower); a
//! zero-width band places the close in the middle (%B = 0.5).
//! Lookback: period - 1.

use super::{closes, population_std, Indicator};
use crate::domain::Bar;

/// One point of the three bands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandPoint {
    pub lower: f64,
    pub middle: f64,
    pub upper: f64,
}

impl BandPoint {
    const NAN: BandPoint = BandPoint {
        lower: f64::NAN,
        middle: f64::NAN,
        upper: f64::NAN,
    };

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// Position of `price` inside the band; 0.5 when the band has no width.
    pub fn percent_b(&self, price: f64) -> f64 {
        let width = self.width();
        if width.is_nan() || price.is_nan() {
            return f64::NAN;
        }
        if width <= f64::EPSILON * self.middle.abs().max(1.0) {
            return 0.5;
        }
        (price - self.lower) / width
    }
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
    name: String,
}

impl Bollinger {
    pub fn new(period: usize, multiplier: f64) -> Self {
        assert!(period >= 1, "Bollinger period must be >= 1");
        Self {
            period,
            multiplier,
            name: format!("percent_b_{period}_{multiplier}"),
        }
    }

    /// Band values for every bar (NaN during warmup or over NaN windows).
    pub fn bands(&self, bars: &[Bar]) -> Vec<BandPoint> {
        let closes = closes(bars);
        let mut out = vec![BandPoint::NAN; closes.len()];
        if closes.len() < self.period {
            return out;
        }
        for end in (self.period - 1)..closes.len() {
            let window = &closes[end + 1 - self.period..=end];
            let middle = window.iter().sum::<f64>() / self.period as f64;
            let half = self.multiplier * population_std(window);
            out[end] = BandPoint {
                lower: middle - half,
                middle,
                upper: middle + half,
            };
        }
        out
    }
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        self.bands(bars)
            .iter()
            .zip(bars)
            .map(|(band, bar)| band.percent_b(bar.close))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn middle_is_sma_and_bands_symmetric() {
        let bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let bands = Bollinger::new(3, 2.0).bands(&bars);
        assert!(bands[1].middle.is_nan());
        assert_approx(bands[2].middle, 11.0, DEFAULT_EPSILON);
        assert_approx(bands[3].middle, 12.0, DEFAULT_EPSILON);
        for b in &bands[2..] {
            assert_approx(b.upper - b.middle, b.middle - b.lower, DEFAULT_EPSILON);
        }
    }

    #[test]
    fn constant_price_is_mid_band() {
        let bars = make_bars(&[100.0; 5]);
        let pb = Bollinger::new(3, 2.0).compute(&bars);
        assert_approx(pb[4], 0.5, DEFAULT_EPSILON);
    }

    #[test]
    fn rising_close_sits_in_upper_half() {
        let bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let pb = Bollinger::new(3, 2.0).compute(&bars);
        assert!(pb[4] > 0.5 && pb[4] <= 1.0);
    }

    #[test]
    fn nan_window_propagates() {
        let mut bars = make_bars(&[10.0, 11.0, 12.0, 13.0]);
        bars[2].close = f64::NAN;
        let pb = Bollinger::new(3, 2.0).compute(&bars);
        assert!(pb[2].is_nan());
        assert!(pb[3].is_nan());
    }

    #[test]
    fn lookback() {
        assert_eq!(Bollinger::new(20, 2.0).lookback(), 19);
    }
}
