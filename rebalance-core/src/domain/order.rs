//! Order plans and recorded order outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// How an order is priced at the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    #[default]
    Market,
    Limit,
}

/// A planned order, produced by the allocation planner.
///
/// A plan is either submitted as-is or dropped before submission; it is never
/// edited after planning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPlan {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: u64,
    pub expected_price: f64,
    pub expected_value: f64,
    pub sector: String,
    /// Predicted return (percent) behind the decision.
    pub predicted_return_pct: f64,
    /// Human-readable factors that drove the decision.
    pub rationale: Vec<String>,
}

impl OrderPlan {
    pub fn new(
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: u64,
        expected_price: f64,
        sector: impl Into<String>,
        predicted_return_pct: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            expected_price,
            expected_value: quantity as f64 * expected_price,
            sector: sector.into(),
            predicted_return_pct,
            rationale: Vec::new(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.rationale.push(reason.into());
        self
    }
}

/// Terminal status of one submitted (or locally rejected) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Filled,
    PartiallyFilled,
    Rejected,
    RejectedInsufficientFunds,
    RejectedTimeout,
}

impl OrderStatus {
    /// True when at least part of the order executed.
    pub fn has_fill(self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::PartiallyFilled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Filled => "FILLED",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::RejectedInsufficientFunds => "REJECTED_INSUFFICIENT_FUNDS",
            OrderStatus::RejectedTimeout => "REJECTED_TIMEOUT",
        };
        write!(f, "{s}")
    }
}

/// What actually happened to one order plan. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderOutcome {
    pub plan: OrderPlan,
    pub status: OrderStatus,
    pub client_order_id: String,
    pub venue_order_id: Option<String>,
    pub filled_quantity: u64,
    pub fill_price: Option<f64>,
    /// Venue submissions made (0 when rejected locally).
    pub attempts: u32,
    pub error: Option<String>,
}

impl OrderOutcome {
    /// An order that never produced a fill.
    pub fn rejected(
        plan: OrderPlan,
        status: OrderStatus,
        client_order_id: impl Into<String>,
        attempts: u32,
        error: impl Into<String>,
    ) -> Self {
        Self {
            plan,
            status,
            client_order_id: client_order_id.into(),
            venue_order_id: None,
            filled_quantity: 0,
            fill_price: None,
            attempts,
            error: Some(error.into()),
        }
    }

    /// Cash value of the confirmed fill (zero when nothing filled).
    pub fn filled_value(&self) -> f64 {
        match self.fill_price {
            Some(price) if self.status.has_fill() => self.filled_quantity as f64 * price,
            _ => 0.0,
        }
    }
}
