//! Rebalance engine facade.
//!
//! Wires evaluation, screening, allocation, execution and synthesis together.
//! The engine owns its configuration and collaborators; every call is
//! independent and reads nothing from the previous one.

use std::sync::Arc;

use log::info;
use rebalance_core::aggregator::SignalAggregator;
use rebalance_core::data::HistoryProvider;
use rebalance_core::domain::{Holding, InstrumentSnapshot, RequestId};
use rebalance_core::predictor::ReturnPredictor;
use rebalance_core::sentiment::{NeutralSentiment, SentimentProvider};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::allocation::{AllocationPlan, AllocationPlanner};
use crate::config::{ConfigError, EngineConfig};
use crate::evaluation::{EvaluationInput, Evaluator};
use crate::execution::ExecutionCoordinator;
use crate::request::RebalanceRequest;
use crate::screening::{rank_order, ScoredInstrument, Screener, ScreeningReport};
use crate::synthesis::{planning_warnings, synthesize, RebalancePreview, RebalanceResult, ScreeningSummary};
use crate::venue::TradingVenue;

/// Errors returned to the caller. Per-instrument and per-order failures are
/// recorded in the result instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("nothing to evaluate: the universe is empty and no history provider is configured")]
    NoEvaluationSource,

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("worker pool: {0}")]
    WorkerPool(String),
}

/// One entry of a read-only ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedInstrument {
    pub rank: usize,
    #[serde(flatten)]
    pub scored: ScoredInstrument,
}

pub struct RebalanceEngine {
    config: EngineConfig,
    predictor: Arc<dyn ReturnPredictor>,
    sentiment: Arc<dyn SentimentProvider>,
    venue: Arc<dyn TradingVenue>,
    evaluator: Evaluator,
}

impl RebalanceEngine {
    pub fn new(
        config: EngineConfig,
        predictor: Arc<dyn ReturnPredictor>,
        venue: Arc<dyn TradingVenue>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let evaluator = build_evaluator(&config, Arc::clone(&predictor), None)?;
        Ok(Self {
            config,
            predictor,
            sentiment: Arc::new(NeutralSentiment),
            venue,
            evaluator,
        })
    }

    pub fn with_sentiment(mut self, sentiment: Arc<dyn SentimentProvider>) -> Self {
        self.sentiment = sentiment;
        self
    }

    /// Enables fetching for holdings outside the universe and for the
    /// relaxation reserve.
    pub fn with_history_provider(mut self, history: Arc<dyn HistoryProvider>) -> Result<Self, EngineError> {
        self.evaluator = build_evaluator(&self.config, Arc::clone(&self.predictor), Some(history))?;
        Ok(self)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn venue_name(&self) -> &str {
        self.venue.name()
    }

    /// Screen, plan, execute and report one rebalance.
    ///
    /// Returns an error only for an invalid request; order and instrument
    /// failures are reported inside the result.
    pub fn screen(&self, request: &RebalanceRequest) -> Result<RebalanceResult, EngineError> {
        let request_id = self.admit(request)?;
        info!(
            "rebalance {}: {} instruments, {} holdings, budget {:.2}, target {:.2}% over {} days",
            request_id.short(),
            request.universe.len(),
            request.holdings.len(),
            request.budget,
            request.target_return_pct,
            request.horizon_days
        );

        let report = self.run_screening(request, &request_id);
        let plan = self.plan(request, &report);

        let coordinator =
            ExecutionCoordinator::new(self.venue.as_ref(), &self.config.execution).with_pool(self.evaluator.pool());
        let execution = coordinator.execute(
            &request_id,
            &plan,
            request.budget,
            &holdings_with_sectors(request, &report),
        );

        let result = synthesize(
            &execution,
            &plan,
            &report,
            &request_id,
            request.budget,
            &self.config.synthesis,
        );
        info!(
            "rebalance {} done: sold {:.2}, bought {:.2}, remaining cash {:.2}, {} warnings",
            request_id.short(),
            result.realized_sell_value,
            result.realized_buy_value,
            result.remaining_cash,
            result.warnings.len()
        );
        Ok(result)
    }

    /// Screening and allocation without submitting any order.
    pub fn preview(&self, request: &RebalanceRequest) -> Result<RebalancePreview, EngineError> {
        let request_id = self.admit(request)?;
        let report = self.run_screening(request, &request_id);
        let plan = self.plan(request, &report);
        Ok(RebalancePreview {
            request_id: request_id.to_string(),
            screening: ScreeningSummary::from(&report),
            warnings: planning_warnings(&plan, &report),
            sell_candidates: report.sell_candidates,
            buy_candidates: report.buy_candidates,
            plan,
        })
    }

    /// Score and rank a universe with no thresholds applied.
    ///
    /// Instruments that fail evaluation are left out of the ranking.
    pub fn rank(
        &self,
        universe: &[InstrumentSnapshot],
        horizon_days: u32,
    ) -> Result<Vec<RankedInstrument>, EngineError> {
        if horizon_days == 0 {
            return Err(EngineError::InvalidRequest("horizon_days must be > 0".into()));
        }
        if universe.is_empty() {
            return Err(EngineError::NoEvaluationSource);
        }

        let inputs: Vec<EvaluationInput> = universe.iter().cloned().map(EvaluationInput::Snapshot).collect();
        let evaluations: Vec<_> = self
            .evaluator
            .evaluate_all(&inputs, horizon_days)
            .into_iter()
            .filter_map(|(_, r)| r.ok())
            .collect();

        let mut scored = self.screener().score_all(&evaluations);
        scored.sort_by(rank_order);
        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(i, scored)| RankedInstrument { rank: i + 1, scored })
            .collect())
    }

    fn admit(&self, request: &RebalanceRequest) -> Result<RequestId, EngineError> {
        request.validate().map_err(EngineError::InvalidRequest)?;
        if request.universe.is_empty() && !self.evaluator.has_history_provider() {
            return Err(EngineError::NoEvaluationSource);
        }
        request.request_id().map_err(EngineError::InvalidRequest)
    }

    fn screener(&self) -> Screener<'_> {
        Screener::new(
            &self.evaluator,
            SignalAggregator::new(self.config.weights),
            self.sentiment.as_ref(),
            &self.config.screening,
        )
    }

    fn run_screening(&self, request: &RebalanceRequest, request_id: &RequestId) -> ScreeningReport {
        self.screener().screen(request, request_id)
    }

    fn plan(&self, request: &RebalanceRequest, report: &ScreeningReport) -> AllocationPlan {
        AllocationPlanner::new(&self.config.allocation, self.config.screening.max_buy_candidates).plan(
            &report.sell_candidates,
            &report.buy_candidates,
            request.budget,
            request.position_cap(self.config.allocation.max_position_fraction),
            &report.kept_holdings,
        )
    }
}

fn build_evaluator(
    config: &EngineConfig,
    predictor: Arc<dyn ReturnPredictor>,
    history: Option<Arc<dyn HistoryProvider>>,
) -> Result<Evaluator, EngineError> {
    Evaluator::new(
        predictor,
        history,
        config.screening.worker_threads,
        config.screening.instrument_timeout(),
    )
    .map_err(|e| EngineError::WorkerPool(e.to_string()))
}

/// The caller's holdings in input order, with the sector and revaluation
/// screening attached where it has them.
fn holdings_with_sectors(request: &RebalanceRequest, report: &ScreeningReport) -> Vec<Holding> {
    request
        .holdings
        .iter()
        .map(|h| {
            report
                .kept_holdings
                .iter()
                .chain(report.sell_candidates.iter().map(|c| &c.holding))
                .find(|k| k.symbol == h.symbol)
                .cloned()
                .unwrap_or_else(|| h.clone())
        })
        .collect()
}
