//! Property tests for the scoring invariants.
//!
//! Uses proptest to verify:
//! 1. Composite scores are a pure function of their inputs
//! 2. Scores never decrease as the predicted return rises, everything else fixed
//! 3. The indicator calculator is deterministic and every scored feature stays in [-1, 1]
//! 4. Risk scores and model confidence stay in [0, 1]

use proptest::prelude::*;
use rebalance_core::aggregator::{ScoreWeights, SignalAggregator};
use rebalance_core::data::synthetic::synthetic_bars;
use rebalance_core::indicators::{IndicatorCalculator, IndicatorSet};
use rebalance_core::predictor::{confidence, Prediction};
use rebalance_core::risk::risk_score;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_score_feature() -> impl Strategy<Value = f64> {
    -1.0..=1.0_f64
}

fn arb_indicators() -> impl Strategy<Value = IndicatorSet> {
    (
        arb_score_feature(),
        arb_score_feature(),
        arb_score_feature(),
        arb_score_feature(),
        0.0..0.2_f64,
        0.0..0.2_f64,
    )
        .prop_map(|(m, b, o, v, vol, atr)| IndicatorSet::from_features([m, b, o, v, vol, atr]))
}

fn arb_weights() -> impl Strategy<Value = ScoreWeights> {
    (0.0..0.99_f64, 0.0..10.0_f64, 0.0..20.0_f64).prop_map(|(a, s, r)| ScoreWeights {
        agreement_weight: a,
        sentiment_weight: s,
        risk_weight: r,
    })
}

fn prediction(r: f64, confidence: f64) -> Prediction {
    Prediction {
        horizon_days: 30,
        predicted_return_pct: r,
        confidence,
        model_version: "prop".into(),
    }
}

fn dates(n: usize) -> Vec<chrono::NaiveDate> {
    let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    (0..n).map(|i| start + chrono::Duration::days(i as i64)).collect()
}

// ── 1. Purity ────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn composite_score_is_pure(
        set in arb_indicators(),
        weights in arb_weights(),
        r in -50.0..50.0_f64,
        conf in 0.0..=1.0_f64,
        sentiment in -1.0..=1.0_f64,
        risk in 0.0..=1.0_f64,
    ) {
        let agg = SignalAggregator::new(weights);
        let p = prediction(r, conf);
        let a = agg.score("SYM", &set, &p, sentiment, risk);
        let b = agg.score("SYM", &set, &p, sentiment, risk);
        prop_assert_eq!(a, b);
    }
}

// ── 2. Monotonicity in predicted return ──────────────────────────────

proptest! {
    #[test]
    fn score_non_decreasing_in_predicted_return(
        set in arb_indicators(),
        weights in arb_weights(),
        r1 in -50.0..50.0_f64,
        delta in 0.0..50.0_f64,
        conf in 0.0..=1.0_f64,
        sentiment in -1.0..=1.0_f64,
        risk in 0.0..=1.0_f64,
    ) {
        let agg = SignalAggregator::new(weights);
        let r2 = r1 + delta;
        let low = agg.score("SYM", &set, &prediction(r1, conf), sentiment, risk);
        let high = agg.score("SYM", &set, &prediction(r2, conf), sentiment, risk);
        prop_assert!(high.score >= low.score - 1e-9,
            "score fell from {} to {} as r rose {} -> {}", low.score, high.score, r1, r2);
    }

    #[test]
    fn multiplier_stays_positive(set in arb_indicators(), weights in arb_weights(), r in -50.0..50.0_f64) {
        let s = SignalAggregator::new(weights).score("SYM", &set, &prediction(r, 0.5), 0.0, 0.0);
        prop_assert!(s.agreement_multiplier > 0.0);
    }
}

// ── 3. Indicator determinism and ranges ──────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn calculator_deterministic_and_bounded(seed in "[A-Z]{3,8}", len in 35usize..120, drift in -0.01..0.01_f64) {
        let bars = synthetic_bars(&seed, &dates(len), drift);
        let calc = IndicatorCalculator::new();
        let a = calc.compute(&bars).unwrap();
        let b = calc.compute(&bars).unwrap();
        prop_assert_eq!(&a, &b);
        for v in [a.momentum, a.volatility_band, a.oscillator, a.volume_trend] {
            prop_assert!((-1.0..=1.0).contains(&v));
        }
        prop_assert!(a.realized_volatility >= 0.0);
        prop_assert!(a.atr_pct >= 0.0);
        prop_assert!(a.recent_returns.len() <= 20);
    }
}

// ── 4. Bounded risk and confidence ───────────────────────────────────

proptest! {
    #[test]
    fn risk_score_bounded(set in arb_indicators(), corr in -1.0..=1.0_f64) {
        let r = risk_score(&set, corr);
        prop_assert!((0.0..=1.0).contains(&r));
    }

    #[test]
    fn confidence_bounded(r in -100.0..100.0_f64, sigma in 0.0..50.0_f64) {
        let c = confidence(r, sigma);
        prop_assert!((0.0..=1.0).contains(&c));
    }
}
