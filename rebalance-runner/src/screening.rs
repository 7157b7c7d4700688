//! Screening: score holdings and the universe, pick sell and buy candidates.
//!
//! Two tracks run on every invocation:
//! - hold track: every holding is scored; a holding whose predicted return is
//!   below target (negative or merely sub-target) becomes a sell candidate,
//!   and a holding that cannot be scored is kept and reported;
//! - buy track: every instrument not held is scored; it is a buy candidate when
//!   its predicted return meets the target and its risk is within the ceiling.
//!
//! When a pass finds no buy candidate, further passes widen the universe with
//! reserve symbols and relax the risk ceiling by a jittered step. The target
//! return is never relaxed.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info};
use rebalance_core::aggregator::{CompositeScore, SignalAggregator};
use rebalance_core::domain::{Holding, RequestId, UNCLASSIFIED_SECTOR};
use rebalance_core::risk::{correlation, market_returns, risk_score};
use rebalance_core::rng::RngHierarchy;
use rebalance_core::sentiment::{resolve_sentiment, SentimentProvider};
use serde::{Deserialize, Serialize};

use crate::config::ScreeningConfig;
use crate::evaluation::{Evaluation, EvaluationInput, Evaluator};
use crate::request::RebalanceRequest;

/// An evaluated instrument with its composite score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredInstrument {
    pub symbol: String,
    pub sector: String,
    pub price: f64,
    pub score: CompositeScore,
    /// Named indicator features behind the score.
    pub features: BTreeMap<String, f64>,
}

impl ScoredInstrument {
    pub fn predicted_return_pct(&self) -> f64 {
        self.score.predicted_return_pct
    }

    pub fn risk(&self) -> f64 {
        self.score.risk_score
    }
}

/// A holding flagged for liquidation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellCandidate {
    pub holding: Holding,
    pub scored: ScoredInstrument,
    pub reason: String,
}

/// An instrument left out of a pass, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedInstrument {
    pub symbol: String,
    pub reason: String,
    pub pass: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreeningOutcome {
    Candidates,
    NoCandidates,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningReport {
    pub passes: u32,
    /// Instruments successfully evaluated across all passes.
    pub evaluated: usize,
    pub initial_risk_ceiling: f64,
    pub final_risk_ceiling: f64,
    /// Ranked and truncated to `max_buy_candidates`.
    pub buy_candidates: Vec<ScoredInstrument>,
    /// Ranked buy candidates dropped by the shortlist cut.
    pub truncated_buy_candidates: usize,
    /// Worst predicted return first.
    pub sell_candidates: Vec<SellCandidate>,
    /// Holdings at or above target, with their sector filled in.
    pub kept_holdings: Vec<Holding>,
    /// Holdings kept because they could not be scored.
    pub unevaluated_holdings: Vec<ExcludedInstrument>,
    /// Non-held instruments that could not be scored.
    pub excluded: Vec<ExcludedInstrument>,
    pub outcome: ScreeningOutcome,
}

/// Buy ranking: score descending, then lower risk, then symbol.
pub fn rank_order(a: &ScoredInstrument, b: &ScoredInstrument) -> Ordering {
    b.score
        .score
        .total_cmp(&a.score.score)
        .then_with(|| a.risk().total_cmp(&b.risk()))
        .then_with(|| a.symbol.cmp(&b.symbol))
}

/// Sell ordering: worst predicted return first, then symbol.
fn sell_order(a: &SellCandidate, b: &SellCandidate) -> Ordering {
    a.scored
        .predicted_return_pct()
        .total_cmp(&b.scored.predicted_return_pct())
        .then_with(|| a.scored.symbol.cmp(&b.scored.symbol))
}

pub struct Screener<'a> {
    evaluator: &'a Evaluator,
    aggregator: SignalAggregator,
    sentiment: &'a dyn SentimentProvider,
    config: &'a ScreeningConfig,
    rng: RngHierarchy,
}

impl<'a> Screener<'a> {
    pub fn new(
        evaluator: &'a Evaluator,
        aggregator: SignalAggregator,
        sentiment: &'a dyn SentimentProvider,
        config: &'a ScreeningConfig,
    ) -> Self {
        Self {
            evaluator,
            aggregator,
            sentiment,
            config,
            rng: RngHierarchy::new(config.seed),
        }
    }

    /// Score a set of evaluations against each other.
    ///
    /// Cross-asset risk uses the equal-weighted mean return of every
    /// evaluation in the set; a set of one has zero correlation.
    pub fn score_all(&self, evaluations: &[Evaluation]) -> Vec<ScoredInstrument> {
        let tails: Vec<&[f64]> = evaluations
            .iter()
            .map(|e| e.indicators.recent_returns.as_slice())
            .collect();
        let market = if evaluations.len() > 1 {
            market_returns(&tails)
        } else {
            Vec::new()
        };

        evaluations
            .iter()
            .map(|e| {
                let corr = correlation(&e.indicators.recent_returns, &market);
                let risk = risk_score(&e.indicators, corr);
                let sentiment = resolve_sentiment(self.sentiment, &e.symbol, &e.sector);
                ScoredInstrument {
                    symbol: e.symbol.clone(),
                    sector: e.sector.clone(),
                    price: e.price,
                    score: self
                        .aggregator
                        .score(&e.symbol, &e.indicators, &e.prediction, sentiment, risk),
                    features: e.indicators.to_map(),
                }
            })
            .collect()
    }

    /// Run both tracks with relaxation passes.
    pub fn screen(&self, request: &RebalanceRequest, request_id: &RequestId) -> ScreeningReport {
        let held: BTreeSet<&str> = request.holdings.iter().map(|h| h.symbol.as_str()).collect();
        let mut known: BTreeSet<String> = request.universe.iter().map(|s| s.symbol.clone()).collect();

        // Pass 1 inputs: the supplied universe plus holdings missing from it.
        let mut inputs: Vec<EvaluationInput> = request
            .universe
            .iter()
            .cloned()
            .map(EvaluationInput::Snapshot)
            .collect();
        let mut unevaluated_holdings = Vec::new();
        for h in &request.holdings {
            if request.snapshot(&h.symbol).is_some() {
                continue;
            }
            if self.evaluator.has_history_provider() {
                inputs.push(EvaluationInput::Fetch {
                    symbol: h.symbol.clone(),
                    sector: self.holding_sector(h),
                });
                known.insert(h.symbol.clone());
            } else {
                unevaluated_holdings.push(ExcludedInstrument {
                    symbol: h.symbol.clone(),
                    reason: "no snapshot and no history provider".into(),
                    pass: 1,
                });
            }
        }

        let reserve = self.config.reserve.entries();
        let mut reserve_cursor = 0usize;
        let mut evaluations: Vec<Evaluation> = Vec::new();
        let mut excluded = Vec::new();
        let mut ceiling = request.risk_ceiling;
        let mut pass = 0u32;
        let mut scored;
        let mut buys;

        loop {
            pass += 1;
            for (symbol, result) in self.evaluator.evaluate_all(&inputs, request.horizon_days) {
                match result {
                    Ok(eval) => evaluations.push(eval),
                    Err(e) if held.contains(symbol.as_str()) => {
                        unevaluated_holdings.push(ExcludedInstrument {
                            symbol,
                            reason: e.to_string(),
                            pass,
                        });
                    }
                    Err(e) => excluded.push(ExcludedInstrument {
                        symbol,
                        reason: e.to_string(),
                        pass,
                    }),
                }
            }

            scored = self.score_all(&evaluations);
            buys = scored
                .iter()
                .filter(|s| !held.contains(s.symbol.as_str()))
                .filter(|s| s.predicted_return_pct() >= request.target_return_pct && s.risk() <= ceiling)
                .cloned()
                .collect::<Vec<_>>();

            info!(
                "screening pass {pass}: {} evaluated, {} buy candidates (risk ceiling {ceiling:.3})",
                evaluations.len(),
                buys.len()
            );
            if !buys.is_empty() || pass >= self.config.max_passes {
                break;
            }

            let factor = self
                .rng
                .jitter_factor(request_id, u64::from(pass), self.config.relax_jitter);
            ceiling = (ceiling + self.config.risk_relax_step * factor).min(1.0);

            inputs.clear();
            if self.evaluator.has_history_provider() {
                while inputs.len() < self.config.reserve_batch && reserve_cursor < reserve.len() {
                    let (symbol, sector) = reserve[reserve_cursor];
                    reserve_cursor += 1;
                    if held.contains(symbol) || !known.insert(symbol.to_string()) {
                        continue;
                    }
                    inputs.push(EvaluationInput::Fetch {
                        symbol: symbol.to_string(),
                        sector: sector.to_string(),
                    });
                }
            }
            debug!(
                "relaxing: pass {} adds {} reserve symbols, risk ceiling {ceiling:.3}",
                pass + 1,
                inputs.len()
            );
        }

        buys.sort_by(rank_order);
        let truncated = buys.len().saturating_sub(self.config.max_buy_candidates);
        buys.truncate(self.config.max_buy_candidates);

        let (sell_candidates, kept_holdings) = self.hold_track(request, &scored);

        let outcome = if buys.is_empty() {
            info!("no buy candidates met threshold after {pass} passes");
            ScreeningOutcome::NoCandidates
        } else {
            ScreeningOutcome::Candidates
        };

        ScreeningReport {
            passes: pass,
            evaluated: evaluations.len(),
            initial_risk_ceiling: request.risk_ceiling,
            final_risk_ceiling: ceiling,
            buy_candidates: buys,
            truncated_buy_candidates: truncated,
            sell_candidates,
            kept_holdings,
            unevaluated_holdings,
            excluded,
            outcome,
        }
    }

    fn hold_track(
        &self,
        request: &RebalanceRequest,
        scored: &[ScoredInstrument],
    ) -> (Vec<SellCandidate>, Vec<Holding>) {
        let by_symbol: BTreeMap<&str, &ScoredInstrument> =
            scored.iter().map(|s| (s.symbol.as_str(), s)).collect();
        let target = request.target_return_pct;

        let mut sells = Vec::new();
        let mut kept = Vec::new();
        for h in &request.holdings {
            let Some(s) = by_symbol.get(h.symbol.as_str()) else {
                kept.push(h.clone().with_sector(self.holding_sector_in(request, h)));
                continue;
            };
            let r = s.predicted_return_pct();
            let mut holding = h.clone().with_sector(s.sector.clone());
            if s.price.is_finite() && s.price > 0.0 {
                holding.revalue(s.price);
            }
            if r < 0.0 {
                sells.push(SellCandidate {
                    holding,
                    scored: (*s).clone(),
                    reason: format!("predicted return {r:.2}% is negative"),
                });
            } else if r < target {
                info!(
                    "{}: predicted {r:.2}% is positive but below target {target:.2}%, selling",
                    h.symbol
                );
                sells.push(SellCandidate {
                    holding,
                    scored: (*s).clone(),
                    reason: format!("predicted return {r:.2}% below target {target:.2}%"),
                });
            } else {
                kept.push(holding);
            }
        }
        sells.sort_by(sell_order);
        (sells, kept)
    }

    fn holding_sector(&self, h: &Holding) -> String {
        self.config
            .reserve
            .sector_of(&h.symbol)
            .map(str::to_string)
            .or_else(|| h.sector.clone())
            .unwrap_or_else(|| UNCLASSIFIED_SECTOR.to_string())
    }

    fn holding_sector_in(&self, request: &RebalanceRequest, h: &Holding) -> String {
        request
            .snapshot(&h.symbol)
            .map(|s| s.sector.clone())
            .unwrap_or_else(|| self.holding_sector(h))
    }
}
