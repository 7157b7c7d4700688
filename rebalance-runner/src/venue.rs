//! Trading venue contract and an in-memory paper venue.
//!
//! The venue receives an already-authenticated submission capability; the
//! engine only needs `submit`. Implementations must treat a repeated
//! `client_order_id` as the same order and return the original fill.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rebalance_core::domain::{ClientOrderId, OrderSide, OrderType};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub client_order_id: ClientOrderId,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: u64,
    pub order_type: OrderType,
    pub limit_price: Option<f64>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueFill {
    pub venue_order_id: String,
    pub filled_quantity: u64,
    pub average_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectKind {
    InvalidSymbol,
    MarketClosed,
    InsufficientFunds,
    Other,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum VenueError {
    #[error("rejected ({kind:?}): {reason}")]
    Rejected { kind: RejectKind, reason: String },

    #[error("venue timed out")]
    Timeout,

    #[error("venue rate limited")]
    RateLimited,

    #[error("network: {0}")]
    Network(String),
}

impl VenueError {
    /// Transient failures are worth retrying with the same client order id.
    pub fn is_transient(&self) -> bool {
        !matches!(self, VenueError::Rejected { .. })
    }
}

pub trait TradingVenue: Send + Sync {
    fn name(&self) -> &str;

    fn submit(&self, order: &OrderRequest) -> Result<VenueFill, VenueError>;
}

// ─── Paper venue ─────────────────────────────────────────────────────

/// Scripted response for the next submission of a symbol.
#[derive(Debug, Clone, PartialEq)]
pub enum PaperScript {
    Fail(VenueError),
    /// Fill at most this many shares.
    PartialFill(u64),
    /// Fill fully at this price instead of the quote.
    FillAt(f64),
}

#[derive(Debug, Default)]
struct PaperState {
    fills: HashMap<String, VenueFill>,
    scripts: HashMap<String, VecDeque<PaperScript>>,
    always_fail: HashMap<String, VenueError>,
    submissions: Vec<OrderRequest>,
    next_id: u64,
}

/// In-memory venue that fills market orders at quoted prices, falling back
/// to the order's reference price for unquoted symbols. Limit orders fill at
/// their limit and never through it, scripted prices included.
///
/// Idempotent by client order id. Failures can be scripted per symbol, either
/// as a queue consumed one submission at a time or as a permanent failure.
#[derive(Debug, Default)]
pub struct PaperVenue {
    quotes: HashMap<String, f64>,
    state: Mutex<PaperState>,
}

impl PaperVenue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quote(mut self, symbol: impl Into<String>, price: f64) -> Self {
        self.quotes.insert(symbol.into(), price);
        self
    }

    pub fn with_quotes<I, S>(mut self, quotes: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        for (symbol, price) in quotes {
            self.quotes.insert(symbol.into(), price);
        }
        self
    }

    /// Queue responses for the next submissions of `symbol`.
    pub fn script(&self, symbol: &str, responses: impl IntoIterator<Item = PaperScript>) {
        self.lock()
            .scripts
            .entry(symbol.to_string())
            .or_default()
            .extend(responses);
    }

    /// Fail every submission of `symbol`.
    pub fn fail_always(&self, symbol: &str, error: VenueError) {
        self.lock().always_fail.insert(symbol.to_string(), error);
    }

    /// Every submission received, in arrival order, retries included.
    pub fn submissions(&self) -> Vec<OrderRequest> {
        self.lock().submissions.clone()
    }

    pub fn submission_count(&self, symbol: &str) -> usize {
        self.lock()
            .submissions
            .iter()
            .filter(|o| o.symbol == symbol)
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, PaperState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TradingVenue for PaperVenue {
    fn name(&self) -> &str {
        "paper"
    }

    fn submit(&self, order: &OrderRequest) -> Result<VenueFill, VenueError> {
        let mut state = self.lock();
        state.submissions.push(order.clone());

        if let Some(fill) = state.fills.get(&order.client_order_id.0) {
            return Ok(fill.clone());
        }
        if let Some(err) = state.always_fail.get(&order.symbol) {
            return Err(err.clone());
        }

        let script = state
            .scripts
            .get_mut(&order.symbol)
            .and_then(|q| q.pop_front());
        let quoted = self.quotes.get(&order.symbol).copied();
        let quote = match order.order_type {
            OrderType::Limit => order.limit_price.or(quoted),
            OrderType::Market => quoted.or(order.limit_price),
        }
        .ok_or_else(|| VenueError::Rejected {
            kind: RejectKind::InvalidSymbol,
            reason: format!("no quote for {}", order.symbol),
        })?;

        let (filled_quantity, average_price) = match script {
            Some(PaperScript::Fail(err)) => return Err(err),
            Some(PaperScript::PartialFill(max)) => (order.quantity.min(max), quote),
            Some(PaperScript::FillAt(price)) => (order.quantity, price),
            None => (order.quantity, quote),
        };
        let average_price = match (order.order_type, order.limit_price) {
            (OrderType::Limit, Some(limit)) => match order.side {
                OrderSide::Buy => average_price.min(limit),
                OrderSide::Sell => average_price.max(limit),
            },
            _ => average_price,
        };

        state.next_id += 1;
        let fill = VenueFill {
            venue_order_id: format!("paper-{}", state.next_id),
            filled_quantity,
            average_price,
        };
        state
            .fills
            .insert(order.client_order_id.0.clone(), fill.clone());
        Ok(fill)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(cid: &str, symbol: &str, qty: u64) -> OrderRequest {
        OrderRequest {
            client_order_id: ClientOrderId(cid.into()),
            symbol: symbol.into(),
            side: OrderSide::Buy,
            quantity: qty,
            order_type: OrderType::Market,
            limit_price: None,
            timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn fills_at_quote() {
        let venue = PaperVenue::new().with_quote("TCS", 100.0);
        let fill = venue.submit(&order("c1", "TCS", 5)).unwrap();
        assert_eq!(fill.filled_quantity, 5);
        assert_eq!(fill.average_price, 100.0);
    }

    #[test]
    fn repeated_client_order_id_is_idempotent() {
        let venue = PaperVenue::new().with_quote("TCS", 100.0);
        let a = venue.submit(&order("c1", "TCS", 5)).unwrap();
        let b = venue.submit(&order("c1", "TCS", 5)).unwrap();
        assert_eq!(a, b);
        assert_eq!(venue.submission_count("TCS"), 2);
    }

    #[test]
    fn scripted_failures_are_consumed_in_order() {
        let venue = PaperVenue::new().with_quote("TCS", 100.0);
        venue.script("TCS", [PaperScript::Fail(VenueError::Timeout), PaperScript::PartialFill(2)]);
        assert_eq!(venue.submit(&order("c1", "TCS", 5)), Err(VenueError::Timeout));
        assert_eq!(venue.submit(&order("c1", "TCS", 5)).unwrap().filled_quantity, 2);
        assert_eq!(venue.submit(&order("c2", "TCS", 5)).unwrap().filled_quantity, 5);
    }

    #[test]
    fn unquoted_market_order_fills_at_reference_price() {
        let venue = PaperVenue::new();
        let mut o = order("c1", "NEW", 2);
        o.limit_price = Some(42.0);
        assert_eq!(venue.submit(&o).unwrap().average_price, 42.0);
    }

    #[test]
    fn limit_buy_does_not_fill_through_its_limit() {
        let venue = PaperVenue::new().with_quote("TCS", 100.0);
        venue.script("TCS", [PaperScript::FillAt(120.0), PaperScript::FillAt(90.0)]);
        let mut o = order("c1", "TCS", 1);
        o.order_type = OrderType::Limit;
        o.limit_price = Some(100.0);
        assert_eq!(venue.submit(&o).unwrap().average_price, 100.0);
        o.client_order_id = ClientOrderId("c2".into());
        assert_eq!(venue.submit(&o).unwrap().average_price, 90.0);
    }

    #[test]
    fn unknown_symbol_is_rejected() {
        let venue = PaperVenue::new();
        let err = venue.submit(&order("c1", "NOPE", 1)).unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn transient_classification() {
        assert!(VenueError::Timeout.is_transient());
        assert!(VenueError::RateLimited.is_transient());
        assert!(VenueError::Network("reset".into()).is_transient());
        assert!(!VenueError::Rejected {
            kind: RejectKind::MarketClosed,
            reason: "closed".into()
        }
        .is_transient());
    }
}
