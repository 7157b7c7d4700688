//! Volume ratio: short-window mean volume over long-window mean volume.
//!
//! A ratio above 1 means recent volume is running hot. When the long window
//! traded nothing the ratio is 1 (no change). Lookback: long - 1.

use super::{rolling_mean, Indicator};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct VolumeRatio {
    short: usize,
    long: usize,
    name: String,
}

impl VolumeRatio {
    pub fn new(short: usize, long: usize) -> Self {
        assert!(short >= 1 && long > short, "VolumeRatio requires 1 <= short < long");
        Self {
            short,
            long,
            name: format!("volume_ratio_{short}_{long}"),
        }
    }
}

impl Indicator for VolumeRatio {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.long - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume as f64).collect();
        let short = rolling_mean(&volumes, self.short);
        let long = rolling_mean(&volumes, self.long);
        short
            .iter()
            .zip(&long)
            .map(|(&s, &l)| match l {
                l if l.is_nan() => f64::NAN,
                l if l == 0.0 => 1.0,
                l => s / l,
            })
            .collect()
    }
}
