//! Risk scoring in [0, 1].
//!
//! Combines own volatility (the larger of realized σ and ATR%, full scale at
//! 5% per day) with co-movement against the rest of the pass: the correlation
//! of the instrument's recent returns with the equal-weighted mean return of
//! every instrument evaluated alongside it.

use crate::indicators::IndicatorSet;

/// Daily volatility treated as maximal risk.
pub const FULL_SCALE_VOLATILITY: f64 = 0.05;
pub const VOLATILITY_WEIGHT: f64 = 0.8;
pub const CORRELATION_WEIGHT: f64 = 0.2;

/// Risk score from own volatility and market correlation.
///
/// Only positive correlation adds risk; non-finite inputs count as maximal.
pub fn risk_score(indicators: &IndicatorSet, market_correlation: f64) -> f64 {
    let vol = indicators.realized_volatility.max(indicators.atr_pct);
    let vol_component = if vol.is_finite() {
        (vol / FULL_SCALE_VOLATILITY).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let corr_component = if market_correlation.is_finite() {
        market_correlation.clamp(0.0, 1.0)
    } else {
        1.0
    };
    (VOLATILITY_WEIGHT * vol_component + CORRELATION_WEIGHT * corr_component).clamp(0.0, 1.0)
}

/// Equal-weighted mean of return series, aligned on their most recent end.
///
/// The output has the length of the shortest series.
pub fn market_returns(series: &[&[f64]]) -> Vec<f64> {
    let Some(len) = series.iter().map(|s| s.len()).min() else {
        return Vec::new();
    };
    (0..len)
        .map(|i| {
            let sum: f64 = series.iter().map(|s| s[s.len() - len + i]).sum();
            sum / series.len() as f64
        })
        .collect()
}

/// Pearson correlation over the overlapping tail. Zero when either side has
/// no variance or fewer than two points overlap.
pub fn correlation(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let a = &a[a.len() - n..];
    let b = &b[b.len() - n..];
    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;
    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b) {
        let (dx, dy) = (x - mean_a, y - mean_b);
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    let denom = (var_a * var_b).sqrt();
    if denom <= 1e-18 || !denom.is_finite() {
        return 0.0;
    }
    (cov / denom).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(vol: f64, atr_pct: f64) -> IndicatorSet {
        IndicatorSet::from_features([0.0, 0.0, 0.0, 0.0, vol, atr_pct])
    }

    #[test]
    fn calm_uncorrelated_is_low_risk() {
        assert_eq!(risk_score(&set(0.0, 0.0), 0.0), 0.0);
        assert!((risk_score(&set(0.00625, 0.0), 0.0) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn volatility_saturates() {
        assert!((risk_score(&set(0.2, 0.01), 0.0) - 0.8).abs() < 1e-12);
        assert!((risk_score(&set(0.2, 0.01), 1.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn negative_correlation_adds_nothing() {
        assert_eq!(risk_score(&set(0.0, 0.0), -0.9), 0.0);
    }

    #[test]
    fn non_finite_is_max_risk() {
        assert_eq!(risk_score(&set(f64::NAN, f64::NAN), f64::NAN), 1.0);
    }

    #[test]
    fn correlation_perfect_and_inverse() {
        let a = [0.01, -0.02, 0.03, 0.0];
        let b: Vec<f64> = a.iter().map(|x| x * 2.0).collect();
        let c: Vec<f64> = a.iter().map(|x| -x).collect();
        assert!((correlation(&a, &b) - 1.0).abs() < 1e-12);
        assert!((correlation(&a, &c) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn correlation_degenerate_is_zero() {
        assert_eq!(correlation(&[0.01, 0.01, 0.01], &[0.0, 0.1, 0.2]), 0.0);
        assert_eq!(correlation(&[0.01], &[0.02]), 0.0);
    }

    #[test]
    fn market_returns_align_on_tail() {
        let a = [1.0, 2.0, 3.0];
        let b = [10.0, 20.0];
        assert_eq!(market_returns(&[&a, &b]), vec![6.0, 11.5]);
        assert!(market_returns(&[]).is_empty());
    }
}
