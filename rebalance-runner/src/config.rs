//! Engine configuration.
//!
//! Everything that is policy rather than per-request input: thresholds, caps,
//! score weights, worker pool size and retry policy. Loaded from TOML; every
//! section and field has a default, so an empty file is a valid config.
//!
//! ```toml
//! [screening]
//! target_return_pct = 15.0
//! worker_threads = 5
//!
//! [allocation]
//! default_sector_cap = 0.4
//!
//! [allocation.sector_targets]
//! technology = 0.5
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use rebalance_core::aggregator::ScoreWeights;
use rebalance_core::data::Universe;
use rebalance_core::domain::OrderType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub screening: ScreeningConfig,
    pub allocation: AllocationConfig,
    pub execution: ExecutionConfig,
    pub weights: ScoreWeights,
    pub synthesis: SynthesisConfig,
}

impl EngineConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.screening.validate()?;
        self.allocation.validate()?;
        self.execution.validate()?;
        self.weights.validate().map_err(ConfigError::Invalid)?;
        self.synthesis.validate()
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}

fn unit_interval(name: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be in [0, 1], got {value}")))
    }
}

// ─── Screening ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreeningConfig {
    /// Default minimum predicted return (percent) for a buy; requests may override.
    pub target_return_pct: f64,
    pub horizon_days: u32,
    /// Default maximum risk score for a buy candidate.
    pub risk_ceiling: f64,
    /// Size of the evaluation worker pool.
    pub worker_threads: usize,
    /// Deadline for one instrument's fetch + evaluation, in seconds.
    pub instrument_timeout_secs: f64,
    /// Total screening passes, including the first.
    pub max_passes: u32,
    /// Risk ceiling increase per relaxation pass, before jitter.
    pub risk_relax_step: f64,
    /// Relative jitter on the relaxation step, in [0, 1).
    pub relax_jitter: f64,
    /// Master seed for relaxation jitter.
    pub seed: u64,
    /// Symbols fetched through the history provider during relaxation passes.
    pub reserve: Universe,
    /// Reserve symbols added per relaxation pass.
    pub reserve_batch: usize,
    /// Ranked buy candidates handed to the planner.
    pub max_buy_candidates: usize,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            target_return_pct: 15.0,
            horizon_days: 30,
            risk_ceiling: 0.7,
            worker_threads: 5,
            instrument_timeout_secs: 30.0,
            max_passes: 3,
            risk_relax_step: 0.1,
            relax_jitter: 0.25,
            seed: 42,
            reserve: Universe::default(),
            reserve_batch: 10,
            max_buy_candidates: 10,
        }
    }
}

impl ScreeningConfig {
    pub fn instrument_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.instrument_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.target_return_pct.is_finite() {
            return Err(invalid("screening.target_return_pct must be finite"));
        }
        if self.horizon_days == 0 {
            return Err(invalid("screening.horizon_days must be > 0"));
        }
        unit_interval("screening.risk_ceiling", self.risk_ceiling)?;
        if self.worker_threads == 0 {
            return Err(invalid("screening.worker_threads must be > 0"));
        }
        if !(self.instrument_timeout_secs.is_finite() && self.instrument_timeout_secs > 0.0) {
            return Err(invalid("screening.instrument_timeout_secs must be > 0"));
        }
        if self.max_passes == 0 {
            return Err(invalid("screening.max_passes must be >= 1"));
        }
        unit_interval("screening.risk_relax_step", self.risk_relax_step)?;
        if !(0.0..1.0).contains(&self.relax_jitter) {
            return Err(invalid(format!(
                "screening.relax_jitter must be in [0, 1), got {}",
                self.relax_jitter
            )));
        }
        if self.max_buy_candidates == 0 {
            return Err(invalid("screening.max_buy_candidates must be > 0"));
        }
        Ok(())
    }
}

// ─── Allocation ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    /// Per-position cap as a fraction of the budget, used when the request
    /// does not carry an absolute cap.
    pub max_position_fraction: f64,
    /// Maximum share of invested value per sector when no explicit target is set.
    pub default_sector_cap: f64,
    pub sector_targets: BTreeMap<String, f64>,
    /// Smallest order worth placing, in currency.
    pub min_order_value: f64,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            max_position_fraction: 0.2,
            default_sector_cap: 0.4,
            sector_targets: BTreeMap::new(),
            min_order_value: 0.0,
        }
    }
}

impl AllocationConfig {
    pub fn sector_cap(&self, sector: &str) -> f64 {
        self.sector_targets
            .get(sector)
            .copied()
            .unwrap_or(self.default_sector_cap)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_position_fraction > 0.0 && self.max_position_fraction <= 1.0) {
            return Err(invalid(format!(
                "allocation.max_position_fraction must be in (0, 1], got {}",
                self.max_position_fraction
            )));
        }
        if !(self.default_sector_cap > 0.0 && self.default_sector_cap <= 1.0) {
            return Err(invalid(format!(
                "allocation.default_sector_cap must be in (0, 1], got {}",
                self.default_sector_cap
            )));
        }
        for (sector, cap) in &self.sector_targets {
            if !(*cap > 0.0 && *cap <= 1.0) {
                return Err(invalid(format!(
                    "allocation.sector_targets.{sector} must be in (0, 1], got {cap}"
                )));
            }
        }
        if !(self.min_order_value.is_finite() && self.min_order_value >= 0.0) {
            return Err(invalid("allocation.min_order_value must be >= 0"));
        }
        Ok(())
    }
}

// ─── Execution ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Retries after the first attempt, transient failures only.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub order_timeout_secs: f64,
    /// Submit sells on the worker pool instead of one at a time.
    pub concurrent_sells: bool,
    /// Sell order type. Buys are always limit orders at the planned price.
    pub order_type: OrderType,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            order_timeout_secs: 30.0,
            concurrent_sells: false,
            order_type: OrderType::Market,
        }
    }
}

impl ExecutionConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn order_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.order_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.order_timeout_secs.is_finite() && self.order_timeout_secs > 0.0) {
            return Err(invalid("execution.order_timeout_secs must be > 0"));
        }
        if self.max_retries > 10 {
            return Err(invalid("execution.max_retries must be <= 10"));
        }
        Ok(())
    }
}

// ─── Synthesis ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Warn when more than this fraction of the budget stays in cash.
    pub idle_cash_fraction: f64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            idle_cash_fraction: 0.5,
        }
    }
}

impl SynthesisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        unit_interval("synthesis.idle_cash_fraction", self.idle_cash_fraction)
    }
}
