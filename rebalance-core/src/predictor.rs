//! Return predictor: indicator features + horizon → predicted percent return.
//!
//! The shipped implementation is a per-horizon linear model stored as a
//! versioned JSON artifact. It is loaded once and shared behind an `Arc`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::indicators::{IndicatorSet, FEATURE_NAMES};

/// Predicted return for one instrument over one horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub horizon_days: u32,
    /// Signed percent: 20.0 means +20%.
    pub predicted_return_pct: f64,
    /// Signal-to-noise confidence in [0, 1].
    pub confidence: f64,
    pub model_version: String,
}

#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("no model available for a {horizon_days}-day horizon")]
    ModelUnavailable { horizon_days: u32 },

    #[error("indicator features contain a non-finite value")]
    NonFiniteInput,

    #[error("invalid model artifact: {0}")]
    InvalidArtifact(String),

    #[error("model artifact I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// Maps an indicator set to a return prediction.
///
/// Implementations must be pure: the same inputs always give the same output.
/// They must also return in bounded time. The evaluator checks its deadline
/// only after `predict` returns, so a call that never returns holds a worker.
pub trait ReturnPredictor: Send + Sync {
    fn predict(&self, indicators: &IndicatorSet, horizon_days: u32) -> Result<Prediction, PredictorError>;

    /// Model version string recorded on every prediction.
    fn version(&self) -> &str;
}

// ─── Linear model artifact ───────────────────────────────────────────

/// One fitted regression for a single horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonModel {
    pub horizon_days: u32,
    pub intercept: f64,
    /// Weight per feature name; missing names weigh zero.
    pub weights: BTreeMap<String, f64>,
    /// Residual σ of the fit, in percent.
    pub residual_std: f64,
    pub min_return_pct: f64,
    pub max_return_pct: f64,
}

impl HorizonModel {
    fn raw(&self, features: &[f64; 6]) -> f64 {
        FEATURE_NAMES
            .iter()
            .zip(features)
            .map(|(name, x)| self.weights.get(*name).copied().unwrap_or(0.0) * x)
            .sum::<f64>()
            + self.intercept
    }

    fn validate(&self) -> Result<(), PredictorError> {
        let h = self.horizon_days;
        if h == 0 {
            return Err(invalid("horizon_days must be > 0"));
        }
        if let Some(name) = self.weights.keys().find(|k| !FEATURE_NAMES.contains(&k.as_str())) {
            return Err(invalid(format!("horizon {h}: unknown feature '{name}'")));
        }
        let all_finite = self.weights.values().all(|w| w.is_finite())
            && self.intercept.is_finite()
            && self.residual_std.is_finite();
        if !all_finite {
            return Err(invalid(format!("horizon {h}: non-finite coefficient")));
        }
        if self.residual_std < 0.0 {
            return Err(invalid(format!("horizon {h}: residual_std must be >= 0")));
        }
        if !(self.min_return_pct < self.max_return_pct) {
            return Err(invalid(format!("horizon {h}: min_return_pct must be < max_return_pct")));
        }
        Ok(())
    }
}

/// Versioned set of per-horizon linear models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearReturnModel {
    pub version: String,
    pub horizons: Vec<HorizonModel>,
}

/// Horizon at which the baseline weights apply unscaled.
const BASELINE_REFERENCE_DAYS: f64 = 30.0;
const BASELINE_MAX_TIME_FACTOR: f64 = 1.5;

impl LinearReturnModel {
    pub fn new(version: impl Into<String>, horizons: Vec<HorizonModel>) -> Result<Self, PredictorError> {
        let model = Self {
            version: version.into(),
            horizons,
        };
        model.validate()?;
        Ok(model)
    }

    /// Reference momentum model.
    ///
    /// A one-unit momentum score is worth 8% over 30 days, the band position
    /// 1% and the oscillator 3%. Longer horizons scale linearly up to 1.5×.
    /// Output is clamped to [-20%, +25%].
    pub fn baseline(horizons: &[u32]) -> Self {
        let horizons = horizons
            .iter()
            .map(|&h| {
                let tf = (h as f64 / BASELINE_REFERENCE_DAYS).min(BASELINE_MAX_TIME_FACTOR);
                let weights = [("momentum", 8.0), ("volatility_band", 1.0), ("oscillator", 3.0)]
                    .into_iter()
                    .map(|(n, w)| (n.to_string(), w * tf))
                    .collect();
                HorizonModel {
                    horizon_days: h,
                    intercept: 0.0,
                    weights,
                    residual_std: 4.0 * tf,
                    min_return_pct: -20.0,
                    max_return_pct: 25.0,
                }
            })
            .collect();
        Self {
            version: "baseline-momentum-1".into(),
            horizons,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, PredictorError> {
        let model: Self = serde_json::from_str(json).map_err(|e| invalid(e.to_string()))?;
        model.validate()?;
        Ok(model)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, PredictorError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn to_json(&self) -> Result<String, PredictorError> {
        serde_json::to_string_pretty(self).map_err(|e| invalid(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), PredictorError> {
        if self.version.trim().is_empty() {
            return Err(invalid("version must not be empty"));
        }
        let mut seen = std::collections::BTreeSet::new();
        for h in &self.horizons {
            h.validate()?;
            if !seen.insert(h.horizon_days) {
                return Err(invalid(format!("duplicate horizon {}", h.horizon_days)));
            }
        }
        Ok(())
    }

    pub fn horizon(&self, horizon_days: u32) -> Option<&HorizonModel> {
        self.horizons.iter().find(|h| h.horizon_days == horizon_days)
    }

    /// Insert or replace the model for one horizon.
    pub fn with_horizon(mut self, model: HorizonModel) -> Self {
        self.horizons.retain(|h| h.horizon_days != model.horizon_days);
        self.horizons.push(model);
        self.horizons.sort_by_key(|h| h.horizon_days);
        self
    }

    /// Fit one horizon by ridge regression on (features, realized return %) pairs.
    ///
    /// The intercept is not penalized. Clamp bounds are the observed target range.
    pub fn fit(samples: &[(IndicatorSet, f64)], horizon_days: u32, ridge: f64) -> Result<HorizonModel, PredictorError> {
        if samples.len() < 2 {
            return Err(invalid("fit needs at least 2 samples"));
        }
        if !(ridge >= 0.0) {
            return Err(invalid("ridge penalty must be >= 0"));
        }
        const K: usize = FEATURE_NAMES.len() + 1;
        let mut xtx = [[0.0f64; K]; K];
        let mut xty = [0.0f64; K];
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;

        for (set, y) in samples {
            let f = set.feature_vector();
            if f.iter().any(|v| !v.is_finite()) || !y.is_finite() {
                return Err(PredictorError::NonFiniteInput);
            }
            let mut row = [1.0f64; K];
            row[1..].copy_from_slice(&f);
            for i in 0..K {
                xty[i] += row[i] * y;
                for j in 0..K {
                    xtx[i][j] += row[i] * row[j];
                }
            }
            lo = lo.min(*y);
            hi = hi.max(*y);
        }
        for (i, row) in xtx.iter_mut().enumerate().skip(1) {
            row[i] += ridge;
        }

        let beta = solve(xtx, xty).ok_or_else(|| invalid("singular design matrix; add ridge penalty"))?;

        let mut model = HorizonModel {
            horizon_days,
            intercept: beta[0],
            weights: FEATURE_NAMES
                .iter()
                .zip(&beta[1..])
                .map(|(n, w)| (n.to_string(), *w))
                .collect(),
            residual_std: 0.0,
            min_return_pct: lo,
            max_return_pct: if hi > lo { hi } else { lo + 1.0 },
        };
        let sse: f64 = samples
            .iter()
            .map(|(set, y)| (model.raw(&set.feature_vector()) - y).powi(2))
            .sum();
        model.residual_std = (sse / samples.len() as f64).sqrt();
        model.validate()?;
        Ok(model)
    }
}

impl ReturnPredictor for LinearReturnModel {
    fn predict(&self, indicators: &IndicatorSet, horizon_days: u32) -> Result<Prediction, PredictorError> {
        let model = self
            .horizon(horizon_days)
            .ok_or(PredictorError::ModelUnavailable { horizon_days })?;
        let features = indicators.feature_vector();
        if features.iter().any(|v| !v.is_finite()) {
            return Err(PredictorError::NonFiniteInput);
        }
        let r = model
            .raw(&features)
            .clamp(model.min_return_pct, model.max_return_pct);
        Ok(Prediction {
            horizon_days,
            predicted_return_pct: r,
            confidence: confidence(r, model.residual_std),
            model_version: self.version.clone(),
        })
    }

    fn version(&self) -> &str {
        &self.version
    }
}

/// |r| / (|r| + σ), 1.0 when both are zero.
pub fn confidence(predicted: f64, residual_std: f64) -> f64 {
    let signal = predicted.abs();
    let denom = signal + residual_std.max(0.0);
    if denom == 0.0 {
        1.0
    } else {
        (signal / denom).clamp(0.0, 1.0)
    }
}

fn invalid(msg: impl Into<String>) -> PredictorError {
    PredictorError::InvalidArtifact(msg.into())
}

/// Gaussian elimination with partial pivoting.
fn solve<const K: usize>(mut a: [[f64; K]; K], mut b: [f64; K]) -> Option<[f64; K]> {
    for col in 0..K {
        let pivot = (col..K).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in (col + 1)..K {
            let factor = a[row][col] / a[col][col];
            for k in col..K {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = [0.0; K];
    for row in (0..K).rev() {
        let tail: f64 = ((row + 1)..K).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}
