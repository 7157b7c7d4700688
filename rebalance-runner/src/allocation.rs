//! Allocation planning: ranked candidates → concrete whole-share orders.
//!
//! Sells liquidate the full held quantity and their expected proceeds join the
//! cash pool. Buys walk the ranked list, each targeting an equal split of the
//! remaining cash over the remaining slots, bounded by the per-position cap
//! and shrunk to respect the sector cap.

use std::collections::BTreeMap;

use log::debug;
use rebalance_core::domain::{Holding, OrderPlan, OrderSide, UNCLASSIFIED_SECTOR};
use serde::{Deserialize, Serialize};

use crate::config::AllocationConfig;
use crate::screening::{ScoredInstrument, SellCandidate};

/// A candidate the planner passed over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedCandidate {
    pub symbol: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub sells: Vec<OrderPlan>,
    pub buys: Vec<OrderPlan>,
    pub skipped: Vec<SkippedCandidate>,
    /// Cash before sells.
    pub available_cash: f64,
    /// Cash plus expected sell proceeds.
    pub planning_cash: f64,
    /// Planning cash left after all planned buys.
    pub unallocated_cash: f64,
    pub max_per_position: f64,
}

impl AllocationPlan {
    pub fn has_buys(&self) -> bool {
        !self.buys.is_empty()
    }

    pub fn order_count(&self) -> usize {
        self.sells.len() + self.buys.len()
    }
}

pub struct AllocationPlanner<'a> {
    config: &'a AllocationConfig,
    max_buy_candidates: usize,
}

impl<'a> AllocationPlanner<'a> {
    pub fn new(config: &'a AllocationConfig, max_buy_candidates: usize) -> Self {
        Self {
            config,
            max_buy_candidates: max_buy_candidates.max(1),
        }
    }

    /// Plan sells for every candidate and buys down the ranked list.
    ///
    /// `retained` are the holdings that stay in the portfolio; they count
    /// toward sector exposure.
    pub fn plan(
        &self,
        sells: &[SellCandidate],
        ranked_buys: &[ScoredInstrument],
        available_cash: f64,
        max_per_position: f64,
        retained: &[Holding],
    ) -> AllocationPlan {
        let sell_plans: Vec<OrderPlan> = sells
            .iter()
            .map(|c| {
                let price = if c.scored.price.is_finite() && c.scored.price > 0.0 {
                    c.scored.price
                } else {
                    c.holding.market_price()
                };
                OrderPlan::new(
                    &c.holding.symbol,
                    OrderSide::Sell,
                    c.holding.quantity,
                    price,
                    &c.scored.sector,
                    c.scored.predicted_return_pct(),
                )
                .with_reason(c.reason.clone())
                .with_reason(format!("score {:.2}", c.scored.score.score))
            })
            .collect();

        let freed: f64 = sell_plans
            .iter()
            .map(|p| p.expected_value)
            .filter(|v| v.is_finite())
            .sum();
        let planning_cash = available_cash.max(0.0) + freed;

        let mut cash = planning_cash;
        let mut sector_value: BTreeMap<String, f64> = BTreeMap::new();
        let mut invested = 0.0;
        for h in retained {
            let sector = h.sector.as_deref().unwrap_or(UNCLASSIFIED_SECTOR);
            *sector_value.entry(sector.to_string()).or_default() += h.current_value;
            invested += h.current_value;
        }

        let shortlist = &ranked_buys[..ranked_buys.len().min(self.max_buy_candidates)];
        let mut buys = Vec::new();
        let mut skipped = Vec::new();

        for (i, c) in shortlist.iter().enumerate() {
            let skip = |reason: String| SkippedCandidate {
                symbol: c.symbol.clone(),
                reason,
            };
            let price = c.price;
            if !(price.is_finite() && price > 0.0) {
                skipped.push(skip(format!("invalid price {price}")));
                continue;
            }

            let cheapest_left = shortlist[i..]
                .iter()
                .map(|s| self.min_viable(s.price))
                .fold(f64::INFINITY, f64::min);
            if cash < cheapest_left {
                for rest in &shortlist[i..] {
                    skipped.push(SkippedCandidate {
                        symbol: rest.symbol.clone(),
                        reason: format!("cash exhausted ({cash:.2} left)"),
                    });
                }
                break;
            }

            let min_viable = self.min_viable(price);
            if min_viable > max_per_position {
                skipped.push(skip(format!(
                    "minimum order {min_viable:.2} exceeds position cap {max_per_position:.2}"
                )));
                continue;
            }
            if min_viable > cash {
                skipped.push(skip(format!(
                    "minimum order {min_viable:.2} exceeds remaining cash {cash:.2}"
                )));
                continue;
            }

            let slots = (shortlist.len() - i) as f64;
            let target = (cash / slots).min(max_per_position);
            let mut quantity = (target / price).floor() as u64;
            if quantity == 0 {
                skipped.push(skip(format!("target {target:.2} buys less than one share")));
                continue;
            }

            let cap = self.config.sector_cap(&c.sector);
            let held_in_sector = sector_value.get(&c.sector).copied().unwrap_or(0.0);
            let sector_room = sector_room(cap, held_in_sector, invested, cash);
            let sector_shares = (sector_room / price).floor().max(0.0) as u64;
            if sector_shares < quantity {
                debug!(
                    "{}: sector {} cap {cap:.2} limits {quantity} shares to {sector_shares}",
                    c.symbol, c.sector
                );
                quantity = sector_shares;
            }
            if quantity == 0 {
                skipped.push(skip(format!(
                    "sector {} would exceed its {:.0}% cap",
                    c.sector,
                    cap * 100.0
                )));
                continue;
            }

            let value = quantity as f64 * price;
            if value < self.config.min_order_value {
                skipped.push(skip(format!(
                    "order value {value:.2} below minimum {:.2}",
                    self.config.min_order_value
                )));
                continue;
            }

            let plan = OrderPlan::new(
                &c.symbol,
                OrderSide::Buy,
                quantity,
                price,
                &c.sector,
                c.predicted_return_pct(),
            )
            .with_reason(format!(
                "predicted return {:.2}% over target",
                c.predicted_return_pct()
            ))
            .with_reason(format!("score {:.2}, risk {:.2}", c.score.score, c.risk()))
            .with_reason(format!("sentiment {:+.2}", c.score.sentiment));

            cash -= value;
            invested += value;
            *sector_value.entry(c.sector.clone()).or_default() += value;
            buys.push(plan);
        }

        AllocationPlan {
            sells: sell_plans,
            buys,
            skipped,
            available_cash,
            planning_cash,
            unallocated_cash: cash,
            max_per_position,
        }
    }

    fn min_viable(&self, price: f64) -> f64 {
        price.max(self.config.min_order_value)
    }
}

/// Largest value that can be added to a sector without breaking its cap.
///
/// The share is measured against invested value (retained holdings plus
/// planned buys). With nothing invested yet the share is measured against
/// invested value plus remaining cash, so a first buy is not blocked.
fn sector_room(cap: f64, held_in_sector: f64, invested: f64, cash: f64) -> f64 {
    if cap >= 1.0 {
        return f64::INFINITY;
    }
    if invested <= 0.0 {
        return cap * (invested + cash) - held_in_sector;
    }
    (cap * invested - held_in_sector) / (1.0 - cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rebalance_core::aggregator::CompositeScore;

    fn candidate(symbol: &str, sector: &str, price: f64, r: f64) -> ScoredInstrument {
        ScoredInstrument {
            symbol: symbol.into(),
            sector: sector.into(),
            price,
            score: CompositeScore {
                symbol: symbol.into(),
                score: r,
                predicted_return_pct: r,
                confidence: 0.8,
                technical_score: 0.2,
                agreement: 0.2,
                agreement_multiplier: 1.1,
                sentiment: 0.0,
                risk_score: 0.1,
                sentiment_adjustment: 0.0,
                risk_penalty: 0.6,
            },
            features: BTreeMap::new(),
        }
    }

    fn sell(symbol: &str, qty: u64, price: f64, r: f64) -> SellCandidate {
        SellCandidate {
            holding: Holding::new(symbol, qty, price, price).with_sector("energy"),
            scored: candidate(symbol, "energy", price, r),
            reason: "below target".into(),
        }
    }

    fn config(cap: f64) -> AllocationConfig {
        AllocationConfig {
            default_sector_cap: cap,
            ..AllocationConfig::default()
        }
    }

    #[test]
    fn sells_full_quantity_and_free_cash() {
        let cfg = config(1.0);
        let planner = AllocationPlanner::new(&cfg, 10);
        let plan = planner.plan(&[sell("A", 10, 100.0, -6.0)], &[], 500.0, 1_000.0, &[]);
        assert_eq!(plan.sells.len(), 1);
        assert_eq!(plan.sells[0].quantity, 10);
        assert_eq!(plan.sells[0].expected_value, 1_000.0);
        assert_eq!(plan.planning_cash, 1_500.0);
        assert!(!plan.has_buys());
    }

    #[test]
    fn buys_respect_cap_and_whole_shares() {
        let cfg = config(1.0);
        let planner = AllocationPlanner::new(&cfg, 10);
        let buys = [candidate("B", "technology", 300.0, 20.0)];
        let plan = planner.plan(&[], &buys, 100_000.0, 20_000.0, &[]);
        assert_eq!(plan.buys.len(), 1);
        assert_eq!(plan.buys[0].quantity, 66);
        assert!(plan.buys[0].expected_value <= 20_000.0);
    }

    #[test]
    fn cash_split_over_remaining_slots() {
        let cfg = config(1.0);
        let planner = AllocationPlanner::new(&cfg, 10);
        let buys = [
            candidate("B", "technology", 10.0, 30.0),
            candidate("C", "fmcg", 10.0, 25.0),
        ];
        let plan = planner.plan(&[], &buys, 1_000.0, 10_000.0, &[]);
        assert_eq!(plan.buys[0].quantity, 50);
        assert_eq!(plan.buys[1].quantity, 50);
        assert_eq!(plan.unallocated_cash, 0.0);
    }

    #[test]
    fn unaffordable_candidate_is_skipped() {
        let cfg = config(1.0);
        let planner = AllocationPlanner::new(&cfg, 10);
        let buys = [
            candidate("PRICEY", "technology", 5_000.0, 30.0),
            candidate("CHEAP", "fmcg", 10.0, 20.0),
        ];
        let plan = planner.plan(&[], &buys, 1_000.0, 2_000.0, &[]);
        assert_eq!(plan.buys.len(), 1);
        assert_eq!(plan.buys[0].symbol, "CHEAP");
        assert_eq!(plan.skipped[0].symbol, "PRICEY");
    }

    #[test]
    fn sector_cap_shrinks_buy() {
        let cfg = config(0.5);
        let planner = AllocationPlanner::new(&cfg, 10);
        let retained = [Holding::new("X", 100, 10.0, 10.0).with_sector("fmcg")];
        let buys = [candidate("T", "technology", 10.0, 20.0)];
        // 1,000 invested in fmcg; technology may reach at most 50% of the total.
        let plan = planner.plan(&[], &buys, 10_000.0, 10_000.0, &retained);
        assert_eq!(plan.buys[0].quantity, 100);
    }

    #[test]
    fn saturated_sector_is_skipped() {
        let cfg = config(0.4);
        let planner = AllocationPlanner::new(&cfg, 10);
        let retained = [Holding::new("X", 100, 10.0, 10.0).with_sector("technology")];
        let buys = [candidate("T", "technology", 10.0, 20.0)];
        let plan = planner.plan(&[], &buys, 10_000.0, 10_000.0, &retained);
        assert!(plan.buys.is_empty());
        assert!(plan.skipped[0].reason.contains("sector technology"));
    }

    #[test]
    fn lone_first_buy_is_not_blocked_by_sector_cap() {
        let cfg = config(0.4);
        let planner = AllocationPlanner::new(&cfg, 10);
        let buys = [candidate("T", "technology", 10.0, 20.0)];
        let plan = planner.plan(&[], &buys, 10_000.0, 2_000.0, &[]);
        assert_eq!(plan.buys[0].quantity, 200);
    }

    #[test]
    fn shortlist_limits_candidates() {
        let cfg = config(1.0);
        let planner = AllocationPlanner::new(&cfg, 1);
        let buys = [
            candidate("B", "technology", 10.0, 30.0),
            candidate("C", "fmcg", 10.0, 25.0),
        ];
        let plan = planner.plan(&[], &buys, 1_000.0, 10_000.0, &[]);
        assert_eq!(plan.buys.len(), 1);
        assert_eq!(plan.buys[0].quantity, 100);
    }
}
