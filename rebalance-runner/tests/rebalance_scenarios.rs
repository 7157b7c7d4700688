//! End-to-end rebalance scenarios against the paper venue.
//!
//! Histories are deterministic trends and the predictor is a stub keyed on
//! momentum sign (+20% up, -6% down), so every symbol's fate is known up front.

use std::sync::Arc;

use chrono::NaiveDate;
use rebalance_core::domain::{Bar, Holding, InstrumentSnapshot, OrderSide, OrderStatus};
use rebalance_core::indicators::IndicatorSet;
use rebalance_core::predictor::{Prediction, PredictorError, ReturnPredictor};
use rebalance_runner::venue::{PaperScript, PaperVenue, RejectKind, VenueError};
use rebalance_runner::{EngineConfig, RebalanceEngine, RebalanceRequest, ScreeningOutcome, Warning};

struct MomentumStub;

impl ReturnPredictor for MomentumStub {
    fn predict(&self, indicators: &IndicatorSet, horizon_days: u32) -> Result<Prediction, PredictorError> {
        let r = if indicators.momentum > 0.0 { 20.0 } else { -6.0 };
        Ok(Prediction {
            horizon_days,
            predicted_return_pct: r,
            confidence: 0.8,
            model_version: "stub".into(),
        })
    }

    fn version(&self) -> &str {
        "stub"
    }
}

fn trend(symbol: &str, sector: &str, daily: f64, bars: i32) -> InstrumentSnapshot {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let history: Vec<Bar> = (0..bars)
        .map(|i| {
            let close = 100.0 * (1.0 + daily).powi(i);
            let open = if i == 0 { close } else { 100.0 * (1.0 + daily).powi(i - 1) };
            Bar {
                date: start + chrono::Duration::days(i64::from(i)),
                open,
                high: open.max(close) * 1.002,
                low: open.min(close) * 0.998,
                close,
                volume: 10_000,
            }
        })
        .collect();
    InstrumentSnapshot::from_history(symbol, sector, history)
}

fn up(symbol: &str, sector: &str) -> InstrumentSnapshot {
    trend(symbol, sector, 0.005, 60)
}

fn down(symbol: &str, sector: &str) -> InstrumentSnapshot {
    trend(symbol, sector, -0.005, 60)
}

fn config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.screening.worker_threads = 2;
    config.execution.base_delay_ms = 1;
    config
}

fn venue_for(universe: &[InstrumentSnapshot]) -> PaperVenue {
    PaperVenue::new().with_quotes(universe.iter().map(|s| (s.symbol.clone(), s.price)))
}

fn request(engine: &RebalanceEngine, universe: Vec<InstrumentSnapshot>, holdings: Vec<Holding>, budget: f64) -> RebalanceRequest {
    RebalanceRequest::new(&engine.config().screening, budget)
        .with_universe(universe)
        .with_holdings(holdings)
        .with_target_return(15.0)
        .with_risk_ceiling(0.6)
}

#[test]
fn loser_is_sold_and_winner_bought() {
    let universe = vec![down("SYM_A", "banking"), up("SYM_B", "technology")];
    let venue = Arc::new(venue_for(&universe));
    let engine = RebalanceEngine::new(config(), Arc::new(MomentumStub), venue.clone()).unwrap();
    let holdings = vec![Holding::new("SYM_A", 10, 90.0, universe[0].price)];

    let result = engine.screen(&request(&engine, universe.clone(), holdings, 100_000.0)).unwrap();

    let sells: Vec<_> = result.outcomes_for(OrderSide::Sell).collect();
    assert_eq!(sells.len(), 1);
    assert_eq!(sells[0].plan.symbol, "SYM_A");
    assert_eq!(sells[0].filled_quantity, 10);
    assert_eq!(sells[0].status, OrderStatus::Filled);

    let buys: Vec<_> = result.outcomes_for(OrderSide::Buy).collect();
    assert_eq!(buys.len(), 1);
    assert_eq!(buys[0].plan.symbol, "SYM_B");
    assert_eq!(buys[0].status, OrderStatus::Filled);
    // Capped at 20% of the budget.
    assert!(buys[0].filled_value() <= 20_000.0 + 1e-9);
    assert!(buys[0].filled_value() > 20_000.0 - universe[1].price);

    assert!(!result.has_warning(|w| *w == Warning::NoBuyCandidates));
    assert!(result.holdings_after.iter().all(|h| h.symbol != "SYM_A"));
    let b = result.holdings_after.iter().find(|h| h.symbol == "SYM_B").unwrap();
    assert_eq!(b.sector.as_deref(), Some("technology"));
    assert!(result.expected_loss_avoided > 0.0);
    assert!(result.expected_gain > 0.0);
}

#[test]
fn no_candidates_still_sells() {
    let universe = vec![down("SYM_A", "banking"), down("SYM_C", "energy")];
    let venue = Arc::new(venue_for(&universe));
    let engine = RebalanceEngine::new(config(), Arc::new(MomentumStub), venue.clone()).unwrap();
    let holdings = vec![Holding::new("SYM_A", 10, 90.0, universe[0].price)];

    let result = engine.screen(&request(&engine, universe.clone(), holdings, 100_000.0)).unwrap();

    assert_eq!(result.outcomes_for(OrderSide::Buy).count(), 0);
    assert!(result.has_warning(|w| *w == Warning::NoBuyCandidates));
    assert!(result
        .warnings
        .iter()
        .any(|w| w.to_string() == "no buy candidates met threshold"));
    assert_eq!(result.outcomes_for(OrderSide::Sell).count(), 1);
    assert_eq!(venue.submission_count("SYM_A"), 1);
    assert_eq!(result.screening.outcome, ScreeningOutcome::NoCandidates);
}

#[test]
fn relaxation_stops_at_max_passes() {
    let universe = vec![down("SYM_C", "energy")];
    let mut cfg = config();
    cfg.screening.max_passes = 4;
    let engine = RebalanceEngine::new(cfg, Arc::new(MomentumStub), Arc::new(venue_for(&universe))).unwrap();

    let result = engine.screen(&request(&engine, universe, Vec::new(), 10_000.0)).unwrap();

    assert_eq!(result.screening.passes, 4);
    assert!(result.screening.final_risk_ceiling > result.screening.initial_risk_ceiling);
    assert!(result.screening.final_risk_ceiling <= 1.0);
}

#[test]
fn rejected_sell_only_confirmed_cash_counts() {
    let universe = vec![
        down("SYM_A", "banking"),
        down("SYM_D", "energy"),
        up("SYM_B", "technology"),
    ];
    let venue = Arc::new(venue_for(&universe));
    venue.fail_always(
        "SYM_A",
        VenueError::Rejected {
            kind: RejectKind::MarketClosed,
            reason: "closed".into(),
        },
    );
    let engine = RebalanceEngine::new(config(), Arc::new(MomentumStub), venue.clone()).unwrap();
    let holdings = vec![
        Holding::new("SYM_A", 10, 90.0, universe[0].price),
        Holding::new("SYM_D", 20, 90.0, universe[1].price),
    ];

    let result = engine.screen(&request(&engine, universe.clone(), holdings, 100_000.0)).unwrap();

    let a = result.outcomes.iter().find(|o| o.plan.symbol == "SYM_A").unwrap();
    assert_eq!(a.status, OrderStatus::Rejected);
    assert_eq!(a.attempts, 1);
    let d = result.outcomes.iter().find(|o| o.plan.symbol == "SYM_D").unwrap();
    assert_eq!(d.status, OrderStatus::Filled);

    assert_eq!(result.realized_sell_value, d.filled_value());
    let bought: f64 = result.outcomes_for(OrderSide::Buy).map(|o| o.filled_value()).sum();
    assert_eq!(result.remaining_cash, 100_000.0 + d.filled_value() - bought);
    assert!(result.holdings_after.iter().any(|h| h.symbol == "SYM_A" && h.quantity == 10));
    assert!(result.has_warning(|w| matches!(w, Warning::OrderNotFilled { symbol, .. } if symbol == "SYM_A")));
}

#[test]
fn buys_needing_failed_sell_cash_never_reach_venue() {
    let universe = vec![down("SYM_A", "banking"), up("SYM_B", "technology")];
    let venue = Arc::new(venue_for(&universe));
    venue.fail_always(
        "SYM_A",
        VenueError::Rejected {
            kind: RejectKind::MarketClosed,
            reason: "closed".into(),
        },
    );
    let engine = RebalanceEngine::new(config(), Arc::new(MomentumStub), venue.clone()).unwrap();
    let holdings = vec![Holding::new("SYM_A", 100, 90.0, universe[0].price)];
    let req = request(&engine, universe, holdings, 100.0).with_max_per_position(10_000.0);

    let result = engine.screen(&req).unwrap();

    let b = result.outcomes.iter().find(|o| o.plan.symbol == "SYM_B").unwrap();
    assert_eq!(b.status, OrderStatus::RejectedInsufficientFunds);
    assert_eq!(b.attempts, 0);
    assert_eq!(venue.submission_count("SYM_B"), 0);
    assert_eq!(result.remaining_cash, 100.0);
    assert!(result.has_warning(|w| *w == Warning::NoBuyCandidates));
}

#[test]
fn transient_failure_retried_with_same_client_id() {
    let universe = vec![up("SYM_B", "technology")];
    let venue = Arc::new(venue_for(&universe));
    venue.script("SYM_B", [PaperScript::Fail(VenueError::Network("reset".into()))]);
    let engine = RebalanceEngine::new(config(), Arc::new(MomentumStub), venue.clone()).unwrap();

    let result = engine.screen(&request(&engine, universe, Vec::new(), 10_000.0)).unwrap();

    let b = &result.outcomes[0];
    assert_eq!(b.status, OrderStatus::Filled);
    assert_eq!(b.attempts, 2);
    let submissions = venue.submissions();
    assert_eq!(submissions.len(), 2);
    assert_eq!(submissions[0].client_order_id, submissions[1].client_order_id);
}

#[test]
fn one_bad_instrument_does_not_abort_the_pass() {
    let universe = vec![trend("SHORT", "energy", 0.005, 10), up("SYM_B", "technology")];
    let engine = RebalanceEngine::new(config(), Arc::new(MomentumStub), Arc::new(venue_for(&universe))).unwrap();

    let result = engine.screen(&request(&engine, universe, Vec::new(), 10_000.0)).unwrap();

    assert_eq!(result.screening.evaluated, 1);
    assert_eq!(result.screening.excluded.len(), 1);
    assert_eq!(result.screening.excluded[0].symbol, "SHORT");
    assert!(result.has_warning(|w| matches!(w, Warning::InstrumentExcluded { symbol, .. } if symbol == "SHORT")));
    assert_eq!(result.outcomes_for(OrderSide::Buy).count(), 1);
}

#[test]
fn sub_target_positive_holding_is_sold() {
    struct Modest;
    impl ReturnPredictor for Modest {
        fn predict(&self, _: &IndicatorSet, horizon_days: u32) -> Result<Prediction, PredictorError> {
            Ok(Prediction {
                horizon_days,
                predicted_return_pct: 5.0,
                confidence: 0.8,
                model_version: "modest".into(),
            })
        }
        fn version(&self) -> &str {
            "modest"
        }
    }

    let universe = vec![up("SYM_A", "banking")];
    let engine = RebalanceEngine::new(config(), Arc::new(Modest), Arc::new(venue_for(&universe))).unwrap();
    let holdings = vec![Holding::new("SYM_A", 5, 90.0, universe[0].price)];

    let preview = engine.preview(&request(&engine, universe, holdings, 10_000.0)).unwrap();

    assert_eq!(preview.sell_candidates.len(), 1);
    assert!(preview.sell_candidates[0].reason.contains("below target"));
    assert_eq!(preview.plan.sells.len(), 1);
}

#[test]
fn zero_priced_snapshot_is_excluded_not_fatal() {
    let mut bad = up("BAD", "energy");
    bad.price = 0.0;
    let universe = vec![bad, up("SYM_B", "technology")];
    let engine = RebalanceEngine::new(config(), Arc::new(MomentumStub), Arc::new(venue_for(&universe))).unwrap();

    let result = engine.screen(&request(&engine, universe, Vec::new(), 10_000.0)).unwrap();

    assert_eq!(result.screening.excluded.len(), 1);
    assert_eq!(result.screening.excluded[0].symbol, "BAD");
    assert!(result.has_warning(|w| matches!(w, Warning::InstrumentExcluded { symbol, .. } if symbol == "BAD")));
    let buys: Vec<_> = result.outcomes_for(OrderSide::Buy).collect();
    assert_eq!(buys.len(), 1);
    assert_eq!(buys[0].plan.symbol, "SYM_B");
    assert_eq!(buys[0].status, OrderStatus::Filled);
}
