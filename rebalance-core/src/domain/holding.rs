//! Holding: one position in the caller's portfolio.

use serde::{Deserialize, Serialize};

/// A held position. Quantities are whole shares.
///
/// Holdings are supplied fresh by the caller on every invocation. The engine
/// never mutates the caller's holdings; it returns a new set after execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub quantity: u64,
    pub average_cost: f64,
    pub current_value: f64,
    pub pnl_pct: f64,
    #[serde(default)]
    pub sector: Option<String>,
}

impl Holding {
    /// Create a holding valued at `price`.
    pub fn new(symbol: impl Into<String>, quantity: u64, average_cost: f64, price: f64) -> Self {
        let mut h = Self {
            symbol: symbol.into(),
            quantity,
            average_cost,
            current_value: 0.0,
            pnl_pct: 0.0,
            sector: None,
        };
        h.revalue(price);
        h
    }

    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = Some(sector.into());
        self
    }

    /// Implied per-share price from the reported value.
    pub fn market_price(&self) -> f64 {
        if self.quantity == 0 {
            return f64::NAN;
        }
        self.current_value / self.quantity as f64
    }

    /// Recompute value and P&L at a new price.
    pub fn revalue(&mut self, price: f64) {
        self.current_value = self.quantity as f64 * price;
        self.pnl_pct = if self.average_cost > 0.0 {
            (price - self.average_cost) / self.average_cost * 100.0
        } else {
            0.0
        };
    }

    /// Add filled shares; the average cost becomes the quantity-weighted mean.
    pub fn add_shares(&mut self, quantity: u64, price: f64) {
        if quantity == 0 {
            return;
        }
        let old_cost = self.average_cost * self.quantity as f64;
        self.quantity += quantity;
        self.average_cost = (old_cost + price * quantity as f64) / self.quantity as f64;
        self.revalue(price);
    }

    /// Remove sold shares. Returns true when the position is fully closed.
    pub fn remove_shares(&mut self, quantity: u64, price: f64) -> bool {
        self.quantity = self.quantity.saturating_sub(quantity);
        self.revalue(price);
        self.quantity == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_computes_value_and_pnl() {
        let h = Holding::new("INFY", 10, 100.0, 110.0);
        assert_eq!(h.current_value, 1100.0);
        assert!((h.pnl_pct - 10.0).abs() < 1e-12);
        assert_eq!(h.market_price(), 110.0);
    }

    #[test]
    fn add_shares_weights_average_cost() {
        let mut h = Holding::new("INFY", 10, 100.0, 100.0);
        h.add_shares(10, 120.0);
        assert_eq!(h.quantity, 20);
        assert!((h.average_cost - 110.0).abs() < 1e-12);
        assert_eq!(h.current_value, 2400.0);
    }

    #[test]
    fn remove_all_shares_closes_position() {
        let mut h = Holding::new("INFY", 10, 100.0, 100.0);
        assert!(!h.remove_shares(4, 100.0));
        assert!(h.remove_shares(6, 100.0));
        assert_eq!(h.current_value, 0.0);
    }

    #[test]
    fn zero_quantity_price_is_nan() {
        let h = Holding::new("X", 0, 1.0, 1.0);
        assert!(h.market_price().is_nan());
    }
}
