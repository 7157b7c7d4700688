//! Structured rebalance request and its contract checks.

use std::collections::BTreeSet;

use rebalance_core::domain::{Holding, InstrumentSnapshot, RequestId};
use serde::{Deserialize, Serialize};

use crate::config::ScreeningConfig;

/// One rebalance invocation: what is held, what could be bought, and the goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalanceRequest {
    /// Candidate instruments with their recent history. Holdings may appear here too.
    pub universe: Vec<InstrumentSnapshot>,
    pub holdings: Vec<Holding>,
    /// Minimum predicted return (percent) to keep a holding or buy a candidate.
    pub target_return_pct: f64,
    pub horizon_days: u32,
    /// Maximum risk score in [0, 1] for a buy candidate.
    pub risk_ceiling: f64,
    /// Cash available for buys before any sell proceeds.
    pub budget: f64,
    /// Absolute per-position cap; defaults to a fraction of the budget.
    #[serde(default)]
    pub max_per_position: Option<f64>,
}

impl RebalanceRequest {
    /// Empty request with thresholds taken from the screening defaults.
    pub fn new(config: &ScreeningConfig, budget: f64) -> Self {
        Self {
            universe: Vec::new(),
            holdings: Vec::new(),
            target_return_pct: config.target_return_pct,
            horizon_days: config.horizon_days,
            risk_ceiling: config.risk_ceiling,
            budget,
            max_per_position: None,
        }
    }

    pub fn with_universe(mut self, universe: Vec<InstrumentSnapshot>) -> Self {
        self.universe = universe;
        self
    }

    pub fn with_holdings(mut self, holdings: Vec<Holding>) -> Self {
        self.holdings = holdings;
        self
    }

    pub fn with_target_return(mut self, target_return_pct: f64) -> Self {
        self.target_return_pct = target_return_pct;
        self
    }

    pub fn with_horizon(mut self, horizon_days: u32) -> Self {
        self.horizon_days = horizon_days;
        self
    }

    pub fn with_risk_ceiling(mut self, risk_ceiling: f64) -> Self {
        self.risk_ceiling = risk_ceiling;
        self
    }

    pub fn with_max_per_position(mut self, cap: f64) -> Self {
        self.max_per_position = Some(cap);
        self
    }

    /// Contract checks. The message names the first violation found.
    ///
    /// Snapshot contents are not checked here: a malformed snapshot is
    /// excluded during evaluation and the rest of the universe still runs.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.budget.is_finite() && self.budget >= 0.0) {
            return Err(format!("budget must be finite and >= 0, got {}", self.budget));
        }
        if self.horizon_days == 0 {
            return Err("horizon_days must be > 0".into());
        }
        if !self.target_return_pct.is_finite() {
            return Err(format!(
                "target_return_pct must be finite, got {}",
                self.target_return_pct
            ));
        }
        if !(0.0..=1.0).contains(&self.risk_ceiling) {
            return Err(format!("risk_ceiling must be in [0, 1], got {}", self.risk_ceiling));
        }
        if let Some(cap) = self.max_per_position {
            if !(cap.is_finite() && cap > 0.0) {
                return Err(format!("max_per_position must be finite and > 0, got {cap}"));
            }
        }

        let mut seen = BTreeSet::new();
        for snap in &self.universe {
            if !seen.insert(snap.symbol.as_str()) {
                return Err(format!("duplicate universe symbol: {}", snap.symbol));
            }
        }

        let mut held = BTreeSet::new();
        for h in &self.holdings {
            if h.symbol.trim().is_empty() {
                return Err("holding symbol must not be empty".into());
            }
            if h.quantity == 0 {
                return Err(format!("holding {} has zero quantity", h.symbol));
            }
            if !held.insert(h.symbol.as_str()) {
                return Err(format!("duplicate holding symbol: {}", h.symbol));
            }
        }
        Ok(())
    }

    /// Per-position cap in currency.
    pub fn position_cap(&self, max_position_fraction: f64) -> f64 {
        self.max_per_position
            .unwrap_or(self.budget * max_position_fraction)
    }

    /// Deterministic id over the full request content.
    pub fn request_id(&self) -> Result<RequestId, String> {
        RequestId::from_canonical(self).map_err(|e| format!("fingerprint request: {e}"))
    }

    pub fn snapshot(&self, symbol: &str) -> Option<&InstrumentSnapshot> {
        self.universe.iter().find(|s| s.symbol == symbol)
    }

    pub fn is_held(&self, symbol: &str) -> bool {
        self.holdings.iter().any(|h| h.symbol == symbol)
    }
}
