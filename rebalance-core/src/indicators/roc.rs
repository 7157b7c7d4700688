//! Rate of Change (ROC), in percent.
//!
//! ROC[t] = (close[t] - close[t-period]) / close[t-period] * 100. Lookback: period.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Roc {
    period: usize,
    name: String,
}

impl Roc {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ROC period must be >= 1");
        Self {
            period,
            name: format!("roc_{period}"),
        }
    }
}

impl Indicator for Roc {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let mut result = vec![f64::NAN; bars.len()];
        for (i, bar) in bars.iter().enumerate().skip(self.period) {
            let base = bars[i - self.period].close;
            if base != 0.0 {
                // NaN on either side propagates through the arithmetic.
                result[i] = (bar.close - base) / base * 100.0;
            }
        }
        result
    }
}
