//! Signal aggregation: indicators, prediction, sentiment and risk → one score.
//!
//! score = r · (1 + w_agree · agreement) + w_sent · sentiment − w_risk · risk · (2 − confidence)
//!
//! where r is the predicted return in percent and agreement = technical · sign(r).
//! With `agreement_weight` in [0, 1) the multiplier stays positive, so the score
//! is non-decreasing in r with everything else fixed.

use serde::{Deserialize, Serialize};

use crate::indicators::IndicatorSet;
use crate::predictor::Prediction;

/// Fixed weighting policy. Part of configuration, never learned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    /// How strongly technical agreement amplifies the prediction, in [0, 1).
    pub agreement_weight: f64,
    /// Score points per unit of sentiment.
    pub sentiment_weight: f64,
    /// Score points per unit of risk at full confidence.
    pub risk_weight: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            agreement_weight: 0.5,
            sentiment_weight: 2.0,
            risk_weight: 5.0,
        }
    }
}

impl ScoreWeights {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..1.0).contains(&self.agreement_weight) {
            return Err(format!(
                "agreement_weight must be in [0, 1), got {}",
                self.agreement_weight
            ));
        }
        if !(self.sentiment_weight.is_finite() && self.sentiment_weight >= 0.0) {
            return Err(format!("sentiment_weight must be >= 0, got {}", self.sentiment_weight));
        }
        if !(self.risk_weight.is_finite() && self.risk_weight >= 0.0) {
            return Err(format!("risk_weight must be >= 0, got {}", self.risk_weight));
        }
        Ok(())
    }
}

/// The ranking key for one instrument and everything that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    pub symbol: String,
    pub score: f64,
    pub predicted_return_pct: f64,
    pub confidence: f64,
    pub technical_score: f64,
    pub agreement: f64,
    pub agreement_multiplier: f64,
    pub sentiment: f64,
    pub risk_score: f64,
    pub sentiment_adjustment: f64,
    pub risk_penalty: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SignalAggregator {
    weights: ScoreWeights,
}

impl SignalAggregator {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    /// Pure and total. Non-finite sentiment counts as neutral, non-finite risk
    /// as maximal.
    pub fn score(
        &self,
        symbol: &str,
        indicators: &IndicatorSet,
        prediction: &Prediction,
        sentiment: f64,
        risk_score: f64,
    ) -> CompositeScore {
        let r = prediction.predicted_return_pct;
        let confidence = if prediction.confidence.is_finite() {
            prediction.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let sentiment = if sentiment.is_finite() { sentiment.clamp(-1.0, 1.0) } else { 0.0 };
        let risk = if risk_score.is_finite() { risk_score.clamp(0.0, 1.0) } else { 1.0 };

        let technical = indicators.technical_score();
        let technical = if technical.is_finite() { technical.clamp(-1.0, 1.0) } else { 0.0 };
        let direction = if r > 0.0 {
            1.0
        } else if r < 0.0 {
            -1.0
        } else {
            0.0
        };
        let agreement = technical * direction;
        let multiplier = 1.0 + self.weights.agreement_weight * agreement;

        let sentiment_adjustment = self.weights.sentiment_weight * sentiment;
        let risk_penalty = self.weights.risk_weight * risk * (2.0 - confidence);

        CompositeScore {
            symbol: symbol.to_string(),
            score: r * multiplier + sentiment_adjustment - risk_penalty,
            predicted_return_pct: r,
            confidence,
            technical_score: technical,
            agreement,
            agreement_multiplier: multiplier,
            sentiment,
            risk_score: risk,
            sentiment_adjustment,
            risk_penalty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(r: f64, confidence: f64) -> Prediction {
        Prediction {
            horizon_days: 30,
            predicted_return_pct: r,
            confidence,
            model_version: "t".into(),
        }
    }

    fn indicators(technical: f64) -> IndicatorSet {
        IndicatorSet::from_features([technical, technical, technical, technical, 0.01, 0.01])
    }

    #[test]
    fn agreement_amplifies_and_disagreement_dampens() {
        let agg = SignalAggregator::default();
        let agree = agg.score("A", &indicators(1.0), &prediction(10.0, 1.0), 0.0, 0.0);
        let disagree = agg.score("A", &indicators(-1.0), &prediction(10.0, 1.0), 0.0, 0.0);
        assert!((agree.score - 15.0).abs() < 1e-12);
        assert!((disagree.score - 5.0).abs() < 1e-12);
    }

    #[test]
    fn zero_prediction_has_no_agreement() {
        let agg = SignalAggregator::default();
        let s = agg.score("A", &indicators(0.8), &prediction(0.0, 1.0), 0.0, 0.0);
        assert_eq!(s.agreement, 0.0);
        assert_eq!(s.score, 0.0);
    }

    #[test]
    fn low_confidence_increases_risk_penalty() {
        let agg = SignalAggregator::default();
        let sure = agg.score("A", &indicators(0.0), &prediction(10.0, 1.0), 0.0, 0.5);
        let unsure = agg.score("A", &indicators(0.0), &prediction(10.0, 0.0), 0.0, 0.5);
        assert!((sure.risk_penalty - 2.5).abs() < 1e-12);
        assert!((unsure.risk_penalty - 5.0).abs() < 1e-12);
        assert!(sure.score > unsure.score);
    }

    #[test]
    fn sentiment_and_risk_are_sanitized() {
        let agg = SignalAggregator::default();
        let s = agg.score("A", &indicators(0.0), &prediction(10.0, 1.0), f64::NAN, f64::INFINITY);
        assert_eq!(s.sentiment, 0.0);
        assert_eq!(s.risk_score, 1.0);
        let s = agg.score("A", &indicators(0.0), &prediction(10.0, 1.0), 7.0, -3.0);
        assert_eq!(s.sentiment, 1.0);
        assert_eq!(s.risk_score, 0.0);
    }

    #[test]
    fn weights_validation() {
        assert!(ScoreWeights::default().validate().is_ok());
        let bad = ScoreWeights {
            agreement_weight: 1.0,
            ..ScoreWeights::default()
        };
        assert!(bad.validate().is_err());
    }
}
