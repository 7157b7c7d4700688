//! Result synthesis: the auditable record of one rebalance.

use std::fmt;

use rebalance_core::domain::{Holding, OrderOutcome, OrderSide, OrderStatus, RequestId};
use serde::{Deserialize, Serialize};

use crate::allocation::{AllocationPlan, SkippedCandidate};
use crate::config::SynthesisConfig;
use crate::execution::ExecutionReport;
use crate::screening::{ExcludedInstrument, ScoredInstrument, ScreeningOutcome, ScreeningReport, SellCandidate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    NoBuyCandidates,
    IdleCash {
        remaining_cash: f64,
        budget: f64,
        fraction: f64,
    },
    OrderNotFilled {
        symbol: String,
        side: OrderSide,
        status: OrderStatus,
        detail: String,
    },
    InstrumentExcluded {
        symbol: String,
        reason: String,
    },
    HoldingNotEvaluated {
        symbol: String,
        reason: String,
    },
    CandidateSkipped {
        symbol: String,
        reason: String,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::NoBuyCandidates => write!(f, "no buy candidates met threshold"),
            Warning::IdleCash {
                remaining_cash,
                budget,
                fraction,
            } => write!(
                f,
                "{remaining_cash:.2} of the {budget:.2} budget is uninvested (over {:.0}%)",
                fraction * 100.0
            ),
            Warning::OrderNotFilled {
                symbol,
                side,
                status,
                detail,
            } => write!(f, "{side} {symbol} {status}: {detail}"),
            Warning::InstrumentExcluded { symbol, reason } => {
                write!(f, "{symbol} excluded: {reason}")
            }
            Warning::HoldingNotEvaluated { symbol, reason } => {
                write!(f, "holding {symbol} kept without evaluation: {reason}")
            }
            Warning::CandidateSkipped { symbol, reason } => write!(f, "{symbol} skipped: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningSummary {
    pub passes: u32,
    pub evaluated: usize,
    pub buy_candidates: usize,
    pub sell_candidates: usize,
    pub truncated_buy_candidates: usize,
    pub initial_risk_ceiling: f64,
    pub final_risk_ceiling: f64,
    pub excluded: Vec<ExcludedInstrument>,
    pub unevaluated_holdings: Vec<ExcludedInstrument>,
    pub outcome: ScreeningOutcome,
}

impl From<&ScreeningReport> for ScreeningSummary {
    fn from(r: &ScreeningReport) -> Self {
        Self {
            passes: r.passes,
            evaluated: r.evaluated,
            buy_candidates: r.buy_candidates.len(),
            sell_candidates: r.sell_candidates.len(),
            truncated_buy_candidates: r.truncated_buy_candidates,
            initial_risk_ceiling: r.initial_risk_ceiling,
            final_risk_ceiling: r.final_risk_ceiling,
            excluded: r.excluded.clone(),
            unevaluated_holdings: r.unevaluated_holdings.clone(),
            outcome: r.outcome,
        }
    }
}

/// Terminal artifact of `RebalanceEngine::screen`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalanceResult {
    pub request_id: String,
    pub outcomes: Vec<OrderOutcome>,
    pub realized_sell_value: f64,
    pub realized_buy_value: f64,
    pub cash_before: f64,
    pub remaining_cash: f64,
    pub turnover: f64,
    pub expected_loss_avoided: f64,
    pub expected_gain: f64,
    pub holdings_after: Vec<Holding>,
    pub screening: ScreeningSummary,
    pub warnings: Vec<Warning>,
}

impl RebalanceResult {
    pub fn outcomes_for(&self, side: OrderSide) -> impl Iterator<Item = &OrderOutcome> {
        self.outcomes.iter().filter(move |o| o.plan.side == side)
    }

    pub fn has_warning(&self, pred: impl Fn(&Warning) -> bool) -> bool {
        self.warnings.iter().any(pred)
    }
}

/// Screening and allocation without execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalancePreview {
    pub request_id: String,
    pub screening: ScreeningSummary,
    pub sell_candidates: Vec<SellCandidate>,
    pub buy_candidates: Vec<ScoredInstrument>,
    pub plan: AllocationPlan,
    pub warnings: Vec<Warning>,
}

fn confirmed(report: &ExecutionReport, side: OrderSide) -> impl Iterator<Item = &OrderOutcome> {
    report
        .outcomes
        .iter()
        .filter(move |o| o.plan.side == side && o.status.has_fill())
}

fn realized(outcomes: &[OrderOutcome], side: OrderSide) -> f64 {
    outcomes
        .iter()
        .filter(|o| o.plan.side == side)
        .map(OrderOutcome::filled_value)
        .sum()
}

/// Warnings known before execution: empty buy list, exclusions, planner skips.
pub fn planning_warnings(plan: &AllocationPlan, screening: &ScreeningReport) -> Vec<Warning> {
    let mut warnings = Vec::new();
    if plan.buys.is_empty() {
        warnings.push(Warning::NoBuyCandidates);
    }
    warnings.extend(screening.excluded.iter().map(|e| Warning::InstrumentExcluded {
        symbol: e.symbol.clone(),
        reason: e.reason.clone(),
    }));
    warnings.extend(
        screening
            .unevaluated_holdings
            .iter()
            .map(|e| Warning::HoldingNotEvaluated {
                symbol: e.symbol.clone(),
                reason: e.reason.clone(),
            }),
    );
    warnings.extend(plan.skipped.iter().map(|SkippedCandidate { symbol, reason }| {
        Warning::CandidateSkipped {
            symbol: symbol.clone(),
            reason: reason.clone(),
        }
    }));
    warnings
}

pub fn synthesize(
    report: &ExecutionReport,
    plan: &AllocationPlan,
    screening: &ScreeningReport,
    request_id: &RequestId,
    budget: f64,
    config: &SynthesisConfig,
) -> RebalanceResult {
    let realized_sell_value = realized(&report.outcomes, OrderSide::Sell);
    let realized_buy_value = realized(&report.outcomes, OrderSide::Buy);
    let remaining_cash = report.cash_before + realized_sell_value - realized_buy_value;

    let expected_loss_avoided: f64 = confirmed(report, OrderSide::Sell)
        .filter(|o| o.plan.predicted_return_pct < 0.0)
        .map(|o| o.filled_value() * o.plan.predicted_return_pct.abs() / 100.0)
        .sum();
    let expected_gain: f64 = confirmed(report, OrderSide::Buy)
        .map(|o| o.filled_value() * o.plan.predicted_return_pct / 100.0)
        .sum();

    let mut warnings = planning_warnings(plan, screening);
    // Planned buys that all failed leave the result with zero buys too.
    if !plan.buys.is_empty() && confirmed(report, OrderSide::Buy).next().is_none() {
        warnings.insert(0, Warning::NoBuyCandidates);
    }
    if remaining_cash > config.idle_cash_fraction * budget {
        warnings.push(Warning::IdleCash {
            remaining_cash,
            budget,
            fraction: config.idle_cash_fraction,
        });
    }
    warnings.extend(
        report
            .outcomes
            .iter()
            .filter(|o| o.status != OrderStatus::Filled)
            .map(|o| Warning::OrderNotFilled {
                symbol: o.plan.symbol.clone(),
                side: o.plan.side,
                status: o.status,
                detail: o.error.clone().unwrap_or_default(),
            }),
    );

    RebalanceResult {
        request_id: request_id.to_string(),
        outcomes: report.outcomes.clone(),
        realized_sell_value,
        realized_buy_value,
        cash_before: report.cash_before,
        remaining_cash,
        turnover: realized_sell_value + realized_buy_value,
        expected_loss_avoided,
        expected_gain,
        holdings_after: report.holdings_after.clone(),
        screening: ScreeningSummary::from(screening),
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rebalance_core::domain::OrderPlan;

    fn screening() -> ScreeningReport {
        ScreeningReport {
            passes: 1,
            evaluated: 0,
            initial_risk_ceiling: 0.7,
            final_risk_ceiling: 0.7,
            buy_candidates: Vec::new(),
            truncated_buy_candidates: 0,
            sell_candidates: Vec::new(),
            kept_holdings: Vec::new(),
            unevaluated_holdings: Vec::new(),
            excluded: vec![ExcludedInstrument {
                symbol: "Z".into(),
                reason: "insufficient history".into(),
                pass: 1,
            }],
            outcome: ScreeningOutcome::NoCandidates,
        }
    }

    fn empty_plan() -> AllocationPlan {
        AllocationPlan {
            sells: Vec::new(),
            buys: Vec::new(),
            skipped: Vec::new(),
            available_cash: 1_000.0,
            planning_cash: 1_000.0,
            unallocated_cash: 1_000.0,
            max_per_position: 200.0,
        }
    }

    fn filled(plan: OrderPlan, price: f64) -> OrderOutcome {
        OrderOutcome {
            filled_quantity: plan.quantity,
            fill_price: Some(price),
            status: OrderStatus::Filled,
            client_order_id: "c".into(),
            venue_order_id: Some("v".into()),
            attempts: 1,
            error: None,
            plan,
        }
    }

    #[test]
    fn accounting_and_expectations() {
        let sell = filled(OrderPlan::new("A", OrderSide::Sell, 10, 100.0, "x", -6.0), 100.0);
        let buy = filled(OrderPlan::new("B", OrderSide::Buy, 5, 100.0, "y", 20.0), 100.0);
        let rejected = OrderOutcome::rejected(
            OrderPlan::new("C", OrderSide::Sell, 1, 50.0, "x", -1.0),
            OrderStatus::Rejected,
            "c2",
            1,
            "closed",
        );
        let report = ExecutionReport {
            outcomes: vec![sell, rejected, buy],
            holdings_after: Vec::new(),
            cash_before: 1_000.0,
            cash_after: 1_500.0,
        };
        let result = synthesize(
            &report,
            &empty_plan(),
            &screening(),
            &RequestId::from_bytes(b"r"),
            1_000.0,
            &SynthesisConfig::default(),
        );
        assert_eq!(result.realized_sell_value, 1_000.0);
        assert_eq!(result.realized_buy_value, 500.0);
        assert_eq!(result.remaining_cash, 1_500.0);
        assert_eq!(result.turnover, 1_500.0);
        assert!((result.expected_loss_avoided - 60.0).abs() < 1e-9);
        assert!((result.expected_gain - 100.0).abs() < 1e-9);
        assert!(result.has_warning(|w| matches!(w, Warning::IdleCash { .. })));
        assert!(result.has_warning(|w| matches!(w, Warning::OrderNotFilled { symbol, .. } if symbol == "C")));
        assert!(result.has_warning(|w| matches!(w, Warning::InstrumentExcluded { symbol, .. } if symbol == "Z")));
    }

    #[test]
    fn all_buys_failing_warns_once() {
        let buy = OrderPlan::new("B", OrderSide::Buy, 5, 100.0, "y", 20.0);
        let plan = AllocationPlan {
            buys: vec![buy.clone()],
            ..empty_plan()
        };
        let report = ExecutionReport {
            outcomes: vec![OrderOutcome::rejected(buy, OrderStatus::Rejected, "c", 1, "closed")],
            holdings_after: Vec::new(),
            cash_before: 1_000.0,
            cash_after: 1_000.0,
        };
        let result = synthesize(
            &report,
            &plan,
            &screening(),
            &RequestId::from_bytes(b"r"),
            1_000.0,
            &SynthesisConfig::default(),
        );
        let count = result.warnings.iter().filter(|w| **w == Warning::NoBuyCandidates).count();
        assert_eq!(count, 1);
        assert!(result.has_warning(|w| matches!(w, Warning::OrderNotFilled { symbol, .. } if symbol == "B")));
    }

    #[test]
    fn filled_buy_suppresses_no_buy_warning() {
        let buy = OrderPlan::new("B", OrderSide::Buy, 5, 100.0, "y", 20.0);
        let plan = AllocationPlan {
            buys: vec![buy.clone()],
            ..empty_plan()
        };
        let report = ExecutionReport {
            outcomes: vec![filled(buy, 100.0)],
            holdings_after: Vec::new(),
            cash_before: 1_000.0,
            cash_after: 500.0,
        };
        let result = synthesize(
            &report,
            &plan,
            &screening(),
            &RequestId::from_bytes(b"r"),
            1_000.0,
            &SynthesisConfig::default(),
        );
        assert!(!result.has_warning(|w| *w == Warning::NoBuyCandidates));
    }

    #[test]
    fn no_buys_warns_with_fixed_message() {
        let warnings = planning_warnings(&empty_plan(), &screening());
        assert_eq!(warnings[0], Warning::NoBuyCandidates);
        assert_eq!(warnings[0].to_string(), "no buy candidates met threshold");
    }
}
