//! Aggregated price ladder
//!
//! Uses BTreeMap for efficient sorted price level management.

use rust_decimal::Decimal;
use std::cmp::Reverse;
use std::collections::BTreeMap;

use super::{OrderBookMetrics, Side};

/// Levels shown in the top-of-book imbalance
const IMBALANCE_LEVELS: usize = 5;

/// Price-aggregated bids and asks
#[derive(Debug, Default, Clone)]
pub struct PriceLadder {
    /// Bids sorted by price descending (highest first)
    bids: BTreeMap<Reverse<Decimal>, Decimal>,
    /// Asks sorted by price ascending (lowest first)
    asks: BTreeMap<Decimal, Decimal>,
}

impl PriceLadder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
    }

    /// Replace the quantity at a level; zero removes it
    pub fn set(&mut self, side: Side, price: Decimal, quantity: Decimal) {
        match side {
            Side::Bid => {
                if quantity <= Decimal::ZERO {
                    self.bids.remove(&Reverse(price));
                } else {
                    self.bids.insert(Reverse(price), quantity);
                }
            }
            Side::Ask => {
                if quantity <= Decimal::ZERO {
                    self.asks.remove(&price);
                } else {
                    self.asks.insert(price, quantity);
                }
            }
        }
    }

    /// Add (or with a negative delta, remove) quantity at a level
    pub fn adjust(&mut self, side: Side, price: Decimal, delta: Decimal) {
        let current = self.quantity_at(side, price).unwrap_or(Decimal::ZERO);
        self.set(side, price, current + delta);
    }

    pub fn quantity_at(&self, side: Side, price: Decimal) -> Option<Decimal> {
        match side {
            Side::Bid => self.bids.get(&Reverse(price)).copied(),
            Side::Ask => self.asks.get(&price).copied(),
        }
    }

    /// Get best bid price
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first_key_value().map(|(Reverse(p), _)| *p)
    }

    /// Get best ask price
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first_key_value().map(|(p, _)| *p)
    }

    /// Get mid price
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::from(2)),
            _ => None,
        }
    }

    /// Get spread in basis points
    pub fn spread_bps(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask(), self.mid_price()) {
            (Some(bid), Some(ask), Some(mid)) if mid > Decimal::ZERO => {
                Some((ask - bid) / mid * Decimal::from(10000))
            }
            _ => None,
        }
    }

    /// Calculate order book imbalance at top N levels
    pub fn imbalance(&self, levels: usize) -> Option<Decimal> {
        let bid_volume: Decimal = self.bids.values().take(levels).sum();
        let ask_volume: Decimal = self.asks.values().take(levels).sum();

        let total = bid_volume + ask_volume;
        if total > Decimal::ZERO {
            Some((bid_volume - ask_volume) / total)
        } else {
            None
        }
    }

    pub fn bid_levels(&self) -> usize {
        self.bids.len()
    }

    pub fn ask_levels(&self) -> usize {
        self.asks.len()
    }

    /// Calculate order book metrics
    pub fn metrics(&self, last_trade_price: Option<Decimal>) -> OrderBookMetrics {
        OrderBookMetrics {
            best_bid: self.best_bid(),
            best_ask: self.best_ask(),
            mid_price: self.mid_price(),
            spread_bps: self.spread_bps(),
            imbalance: self.imbalance(IMBALANCE_LEVELS),
            bid_depth: self.bids.values().copied().sum(),
            ask_depth: self.asks.values().copied().sum(),
            bid_levels: self.bids.len(),
            ask_levels: self.asks.len(),
            last_trade_price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn create_test_ladder() -> PriceLadder {
        let mut ladder = PriceLadder::new();
        ladder.set(Side::Bid, dec!(50000), dec!(1.0));
        ladder.set(Side::Bid, dec!(49999), dec!(2.0));
        ladder.set(Side::Ask, dec!(50001), dec!(1.5));
        ladder.set(Side::Ask, dec!(50002), dec!(2.5));
        ladder
    }

    #[test]
    fn test_best_bid_ask() {
        let ladder = create_test_ladder();
        assert_eq!(ladder.best_bid(), Some(dec!(50000)));
        assert_eq!(ladder.best_ask(), Some(dec!(50001)));
    }

    #[test]
    fn test_mid_price() {
        let ladder = create_test_ladder();
        assert_eq!(ladder.mid_price(), Some(dec!(50000.5)));
    }

    #[test]
    fn test_imbalance() {
        let ladder = create_test_ladder();
        // Bids: 1.0 + 2.0 = 3.0, Asks: 1.5 + 2.5 = 4.0
        // Imbalance = (3.0 - 4.0) / (3.0 + 4.0) = -1/7
        let imbalance = ladder.imbalance(10).unwrap();
        assert!(imbalance < Decimal::ZERO);
    }

    #[test]
    fn test_set_zero_removes_level() {
        let mut ladder = create_test_ladder();
        ladder.set(Side::Bid, dec!(50000), Decimal::ZERO);
        assert_eq!(ladder.best_bid(), Some(dec!(49999)));
        assert_eq!(ladder.bid_levels(), 1);
    }

    #[test]
    fn test_adjust_aggregates_and_removes() {
        let mut ladder = create_test_ladder();
        ladder.adjust(Side::Ask, dec!(50001), dec!(0.5));
        assert_eq!(ladder.quantity_at(Side::Ask, dec!(50001)), Some(dec!(2.0)));

        ladder.adjust(Side::Ask, dec!(50001), dec!(-2.0));
        assert_eq!(ladder.quantity_at(Side::Ask, dec!(50001)), None);
        assert_eq!(ladder.best_ask(), Some(dec!(50002)));
    }

    #[test]
    fn test_metrics() {
        let metrics = create_test_ladder().metrics(Some(dec!(50000.7)));
        assert_eq!(metrics.bid_depth, dec!(3.0));
        assert_eq!(metrics.ask_depth, dec!(4.0));
        assert_eq!(metrics.bid_levels, 2);
        assert_eq!(metrics.last_trade_price, Some(dec!(50000.7)));
        assert!(metrics.is_healthy());
    }
}
