//! Parallel per-instrument evaluation.
//!
//! Each input is fetched (when it is not already a snapshot), validated, run
//! through the indicator calculator and scored by the return predictor on a
//! bounded rayon pool. Failures are per instrument and never abort the batch.
//! An evaluation that finishes after its deadline is discarded.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};
use rayon::prelude::*;
use rayon::ThreadPool;
use rebalance_core::data::{fetch_snapshot, DataError, HistoryProvider};
use rebalance_core::domain::{InstrumentSnapshot, SnapshotError};
use rebalance_core::indicators::{IndicatorCalculator, IndicatorError, IndicatorSet};
use rebalance_core::predictor::{Prediction, PredictorError, ReturnPredictor};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("data: {0}")]
    Data(#[from] DataError),

    #[error("indicators: {0}")]
    Indicator(#[from] IndicatorError),

    #[error("model: {0}")]
    Model(#[from] PredictorError),

    #[error("evaluation took {elapsed_ms} ms, limit {limit_ms} ms")]
    Timeout { elapsed_ms: u128, limit_ms: u128 },

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(#[from] SnapshotError),

    #[error("no snapshot and no history provider configured")]
    NoSource,
}

/// Something to evaluate: a supplied snapshot or a symbol to fetch.
#[derive(Debug, Clone)]
pub enum EvaluationInput {
    Snapshot(InstrumentSnapshot),
    Fetch { symbol: String, sector: String },
}

impl EvaluationInput {
    pub fn symbol(&self) -> &str {
        match self {
            EvaluationInput::Snapshot(s) => &s.symbol,
            EvaluationInput::Fetch { symbol, .. } => symbol,
        }
    }
}

/// A successfully evaluated instrument.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub symbol: String,
    pub sector: String,
    pub price: f64,
    pub indicators: IndicatorSet,
    pub prediction: Prediction,
}

pub struct Evaluator {
    calculator: IndicatorCalculator,
    predictor: Arc<dyn ReturnPredictor>,
    history: Option<Arc<dyn HistoryProvider>>,
    timeout: Duration,
    pool: ThreadPool,
}

impl Evaluator {
    pub fn new(
        predictor: Arc<dyn ReturnPredictor>,
        history: Option<Arc<dyn HistoryProvider>>,
        worker_threads: usize,
        timeout: Duration,
    ) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_threads.max(1))
            .thread_name(|i| format!("rebalance-eval-{i}"))
            .build()?;
        Ok(Self {
            calculator: IndicatorCalculator::new(),
            predictor,
            history,
            timeout,
            pool,
        })
    }

    pub fn has_history_provider(&self) -> bool {
        self.history.is_some()
    }

    pub fn pool(&self) -> &ThreadPool {
        &self.pool
    }

    /// Evaluate one input on the calling thread.
    pub fn evaluate_one(
        &self,
        input: &EvaluationInput,
        horizon_days: u32,
    ) -> Result<Evaluation, EvaluationError> {
        let started = Instant::now();

        let fetched;
        let snapshot = match input {
            EvaluationInput::Snapshot(s) => s,
            EvaluationInput::Fetch { symbol, sector } => {
                let provider = self.history.as_deref().ok_or(EvaluationError::NoSource)?;
                fetched = fetch_snapshot(provider, symbol, sector)?;
                &fetched
            }
        };
        snapshot.validate()?;

        let indicators = self.calculator.compute(&snapshot.history)?;
        let prediction = self.predictor.predict(&indicators, horizon_days)?;

        let elapsed = started.elapsed();
        if elapsed > self.timeout {
            return Err(EvaluationError::Timeout {
                elapsed_ms: elapsed.as_millis(),
                limit_ms: self.timeout.as_millis(),
            });
        }

        Ok(Evaluation {
            symbol: snapshot.symbol.clone(),
            sector: snapshot.sector.clone(),
            price: snapshot.price,
            indicators,
            prediction,
        })
    }

    /// Evaluate every input on the worker pool. Output order matches input order.
    pub fn evaluate_all(
        &self,
        inputs: &[EvaluationInput],
        horizon_days: u32,
    ) -> Vec<(String, Result<Evaluation, EvaluationError>)> {
        let results: Vec<_> = self.pool.install(|| {
            inputs
                .par_iter()
                .map(|input| {
                    let result = self.evaluate_one(input, horizon_days);
                    (input.symbol().to_string(), result)
                })
                .collect()
        });

        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
        for (symbol, result) in &results {
            if let Err(e) = result {
                warn!("excluding {symbol}: {e}");
            }
        }
        debug!(
            "evaluated {} instruments ({} ok, {failed} excluded)",
            results.len(),
            results.len() - failed
        );
        results
    }
}
