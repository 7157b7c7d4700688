//! Order execution with partial-failure tolerance.
//!
//! Sells go first (optionally concurrently on the worker pool) and every sell
//! completes before any buy is attempted. Buys draw only on cash that exists:
//! the starting cash plus proceeds from sells the venue actually confirmed.
//! A buy that does not fit is rejected locally and never reaches the venue.
//! Buys go out as limit orders at the planned price, so a fill can never cost
//! more than the cash it was checked against.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use rayon::prelude::*;
use rayon::ThreadPool;
use rebalance_core::domain::{
    ClientOrderId, Holding, OrderOutcome, OrderPlan, OrderSide, OrderStatus, OrderType, RequestId,
};
use serde::{Deserialize, Serialize};

use crate::allocation::AllocationPlan;
use crate::config::ExecutionConfig;
use crate::venue::{OrderRequest, RejectKind, TradingVenue, VenueError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Sells first, then buys, in plan order.
    pub outcomes: Vec<OrderOutcome>,
    pub holdings_after: Vec<Holding>,
    pub cash_before: f64,
    /// cash_before + confirmed sell proceeds − confirmed buy cost.
    pub cash_after: f64,
}

pub struct ExecutionCoordinator<'a> {
    venue: &'a dyn TradingVenue,
    config: &'a ExecutionConfig,
    pool: Option<&'a ThreadPool>,
}

impl<'a> ExecutionCoordinator<'a> {
    pub fn new(venue: &'a dyn TradingVenue, config: &'a ExecutionConfig) -> Self {
        Self {
            venue,
            config,
            pool: None,
        }
    }

    /// Pool used for concurrent sells when `concurrent_sells` is set.
    pub fn with_pool(mut self, pool: &'a ThreadPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn execute(
        &self,
        request_id: &RequestId,
        plan: &AllocationPlan,
        cash_before: f64,
        holdings: &[Holding],
    ) -> ExecutionReport {
        let sell_ids: Vec<ClientOrderId> = plan
            .sells
            .iter()
            .enumerate()
            .map(|(i, p)| ClientOrderId::derive(request_id, &p.symbol, p.side, i))
            .collect();

        let sell_outcomes: Vec<OrderOutcome> = match self.pool {
            Some(pool) if self.config.concurrent_sells && plan.sells.len() > 1 => pool.install(|| {
                plan.sells
                    .par_iter()
                    .zip(sell_ids.par_iter())
                    .map(|(p, cid)| self.submit_with_retry(p, cid.clone()))
                    .collect()
            }),
            _ => plan
                .sells
                .iter()
                .zip(&sell_ids)
                .map(|(p, cid)| self.submit_with_retry(p, cid.clone()))
                .collect(),
        };

        let proceeds: f64 = sell_outcomes.iter().map(OrderOutcome::filled_value).sum();
        let mut available = cash_before + proceeds;
        debug!("confirmed sell proceeds {proceeds:.2}, cash for buys {available:.2}");

        let mut outcomes = sell_outcomes;
        for (j, p) in plan.buys.iter().enumerate() {
            let cid = ClientOrderId::derive(request_id, &p.symbol, p.side, plan.sells.len() + j);
            if p.expected_value > available {
                warn!(
                    "{}: buy of {:.2} exceeds confirmed cash {available:.2}, not submitted",
                    p.symbol, p.expected_value
                );
                outcomes.push(OrderOutcome::rejected(
                    p.clone(),
                    OrderStatus::RejectedInsufficientFunds,
                    cid.0,
                    0,
                    format!("needs {:.2}, confirmed cash {available:.2}", p.expected_value),
                ));
                continue;
            }
            let outcome = self.submit_with_retry(p, cid);
            if outcome.filled_value() > available {
                warn!(
                    "{}: venue filled {:.2} against a planned {:.2}, confirmed cash overdrawn",
                    p.symbol,
                    outcome.filled_value(),
                    p.expected_value
                );
            }
            available -= outcome.filled_value();
            outcomes.push(outcome);
        }

        let holdings_after = apply_fills(holdings, &outcomes);
        let cash_after = cash_before + outcomes_value(&outcomes, OrderSide::Sell)
            - outcomes_value(&outcomes, OrderSide::Buy);

        let filled = outcomes.iter().filter(|o| o.status == OrderStatus::Filled).count();
        info!(
            "executed {} orders: {filled} filled, {} not filled, cash {cash_before:.2} -> {cash_after:.2}",
            outcomes.len(),
            outcomes.len() - filled
        );

        ExecutionReport {
            outcomes,
            holdings_after,
            cash_before,
            cash_after,
        }
    }

    /// Buys are capped at the planned price; sells use the configured type.
    fn order_type(&self, side: OrderSide) -> OrderType {
        match side {
            OrderSide::Buy => OrderType::Limit,
            OrderSide::Sell => self.config.order_type,
        }
    }

    /// Submit one order, retrying transient failures with exponential backoff.
    /// The client order id is identical on every attempt.
    pub fn submit_with_retry(&self, plan: &OrderPlan, client_order_id: ClientOrderId) -> OrderOutcome {
        let request = OrderRequest {
            client_order_id: client_order_id.clone(),
            symbol: plan.symbol.clone(),
            side: plan.side,
            quantity: plan.quantity,
            order_type: self.order_type(plan.side),
            limit_price: Some(plan.expected_price),
            timeout: self.config.order_timeout(),
        };

        let mut attempts = 0u32;
        let last_error = loop {
            attempts += 1;
            match self.venue.submit(&request) {
                Ok(fill) => return fill_outcome(plan, client_order_id.0, attempts, fill),
                Err(e) if e.is_transient() && attempts <= self.config.max_retries => {
                    let delay = self.config.base_delay() * 2u32.pow(attempts - 1);
                    debug!(
                        "{} {}: {e}, retrying in {delay:?} (attempt {attempts})",
                        plan.side, plan.symbol
                    );
                    std::thread::sleep(delay);
                }
                Err(e) => break e,
            }
        };

        let status = match &last_error {
            VenueError::Timeout => OrderStatus::RejectedTimeout,
            VenueError::Rejected {
                kind: RejectKind::InsufficientFunds,
                ..
            } => OrderStatus::RejectedInsufficientFunds,
            _ => OrderStatus::Rejected,
        };
        warn!(
            "{} {} x{} failed after {attempts} attempt(s): {last_error}",
            plan.side, plan.symbol, plan.quantity
        );
        OrderOutcome::rejected(plan.clone(), status, client_order_id.0, attempts, last_error.to_string())
    }
}

fn fill_outcome(
    plan: &OrderPlan,
    client_order_id: String,
    attempts: u32,
    fill: crate::venue::VenueFill,
) -> OrderOutcome {
    let filled_quantity = fill.filled_quantity.min(plan.quantity);
    let valid_price = fill.average_price.is_finite() && fill.average_price > 0.0;
    if filled_quantity == 0 || !valid_price {
        return OrderOutcome {
            venue_order_id: Some(fill.venue_order_id),
            ..OrderOutcome::rejected(
                plan.clone(),
                OrderStatus::Rejected,
                client_order_id,
                attempts,
                format!(
                    "venue reported no usable fill ({} @ {})",
                    fill.filled_quantity, fill.average_price
                ),
            )
        };
    }
    let (status, error) = if filled_quantity < plan.quantity {
        (
            OrderStatus::PartiallyFilled,
            Some(format!("filled {filled_quantity} of {}", plan.quantity)),
        )
    } else {
        (OrderStatus::Filled, None)
    };
    OrderOutcome {
        plan: plan.clone(),
        status,
        client_order_id,
        venue_order_id: Some(fill.venue_order_id),
        filled_quantity,
        fill_price: Some(fill.average_price),
        attempts,
        error,
    }
}

fn outcomes_value(outcomes: &[OrderOutcome], side: OrderSide) -> f64 {
    outcomes
        .iter()
        .filter(|o| o.plan.side == side)
        .map(OrderOutcome::filled_value)
        .sum()
}

/// New holdings set: confirmed sells removed, confirmed buys added.
fn apply_fills(holdings: &[Holding], outcomes: &[OrderOutcome]) -> Vec<Holding> {
    let mut order: Vec<String> = holdings.iter().map(|h| h.symbol.clone()).collect();
    let mut book: BTreeMap<String, Holding> = holdings
        .iter()
        .map(|h| (h.symbol.clone(), h.clone()))
        .collect();

    for o in outcomes.iter().filter(|o| o.status.has_fill()) {
        let Some(price) = o.fill_price else { continue };
        match o.plan.side {
            OrderSide::Sell => {
                if let Some(h) = book.get_mut(&o.plan.symbol) {
                    if h.remove_shares(o.filled_quantity, price) {
                        book.remove(&o.plan.symbol);
                    }
                }
            }
            OrderSide::Buy => match book.get_mut(&o.plan.symbol) {
                Some(h) => h.add_shares(o.filled_quantity, price),
                None => {
                    let h = Holding::new(&o.plan.symbol, o.filled_quantity, price, price)
                        .with_sector(o.plan.sector.clone());
                    order.push(o.plan.symbol.clone());
                    book.insert(o.plan.symbol.clone(), h);
                }
            },
        }
    }

    order.into_iter().filter_map(|s| book.remove(&s)).collect()
}
