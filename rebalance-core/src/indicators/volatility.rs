//! Realized volatility: population σ of close-to-close returns.
//!
//! Daily units (0.02 = 2% per day). Lookback: period (period returns need
//! period + 1 closes).

use super::{population_std, Indicator};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct RealizedVolatility {
    period: usize,
    name: String,
}

impl RealizedVolatility {
    pub fn new(period: usize) -> Self {
        assert!(period >= 2, "RealizedVolatility period must be >= 2");
        Self {
            period,
            name: format!("realized_vol_{period}"),
        }
    }
}

/// Close-to-close returns. `returns[i]` is the return into bar `i + 1`.
pub fn daily_returns(bars: &[Bar]) -> Vec<f64> {
    bars.windows(2).map(|w| w[1].return_from(&w[0])).collect()
}

impl Indicator for RealizedVolatility {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let mut result = vec![f64::NAN; bars.len()];
        let returns = daily_returns(bars);
        if returns.len() < self.period {
            return result;
        }
        for end in (self.period - 1)..returns.len() {
            result[end + 1] = population_std(&returns[end + 1 - self.period..=end]);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn constant_growth_has_zero_volatility() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 * 1.01f64.powi(i)).collect();
        let vol = RealizedVolatility::new(5).latest(&make_bars(&closes));
        assert!(vol.abs() < 1e-12);
    }

    #[test]
    fn alternating_returns() {
        let bars = make_bars(&[100.0, 110.0, 100.0, 110.0, 100.0]);
        let r = daily_returns(&bars);
        assert_eq!(r.len(), 4);
        let expected = population_std(&r[1..4]);
        assert_approx(RealizedVolatility::new(3).latest(&bars), expected, DEFAULT_EPSILON);
    }

    #[test]
    fn warmup_is_nan() {
        let result = RealizedVolatility::new(3).compute(&make_bars(&[1.0, 2.0, 3.0, 4.0]));
        assert!(result[2].is_nan());
        assert!(!result[3].is_nan());
    }
}
