//! Rebalance Runner: screening, allocation, order execution, result synthesis.
//!
//! This crate builds on `rebalance-core` to provide:
//! - Parallel per-instrument evaluation with deadlines
//! - Buy and hold screening with risk-ceiling relaxation passes
//! - Cash- and cap-constrained allocation planning
//! - Sells-before-buys execution against a `TradingVenue`
//! - The `RebalanceResult` record and its warnings
//! - Holdings CSV and universe loading

pub mod allocation;
pub mod config;
pub mod engine;
pub mod evaluation;
pub mod execution;
pub mod loader;
pub mod request;
pub mod screening;
pub mod synthesis;
pub mod venue;

pub use allocation::{AllocationPlan, AllocationPlanner, SkippedCandidate};
pub use config::{
    AllocationConfig, ConfigError, EngineConfig, ExecutionConfig, ScreeningConfig, SynthesisConfig,
};
pub use engine::{EngineError, RankedInstrument, RebalanceEngine};
pub use evaluation::{Evaluation, EvaluationError, EvaluationInput, Evaluator};
pub use execution::{ExecutionCoordinator, ExecutionReport};
pub use loader::{load_holdings_csv, load_universe, LoadError, LoadOptions, LoadedUniverse};
pub use request::RebalanceRequest;
pub use screening::{
    ExcludedInstrument, ScoredInstrument, Screener, ScreeningOutcome, ScreeningReport, SellCandidate,
};
pub use synthesis::{RebalancePreview, RebalanceResult, ScreeningSummary, Warning};
pub use venue::{OrderRequest, PaperScript, PaperVenue, RejectKind, TradingVenue, VenueError, VenueFill};
