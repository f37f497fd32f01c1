//! Order book metrics calculation

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Computed metrics for an order book
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBookMetrics {
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,

    /// Mid price (average of best bid and ask)
    pub mid_price: Option<Decimal>,

    /// Spread in basis points
    pub spread_bps: Option<Decimal>,

    /// Simple imbalance over the top levels: (bid_vol - ask_vol) / (bid_vol + ask_vol)
    pub imbalance: Option<Decimal>,

    /// Total bid depth (volume)
    pub bid_depth: Decimal,

    /// Total ask depth (volume)
    pub ask_depth: Decimal,

    pub bid_levels: usize,
    pub ask_levels: usize,

    pub last_trade_price: Option<Decimal>,
}

impl OrderBookMetrics {
    /// Check if the order book is healthy (two-sided and not crossed)
    pub fn is_healthy(&self) -> bool {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) => bid < ask && self.bid_levels > 0 && self.ask_levels > 0,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_empty_book_is_not_healthy() {
        assert!(!OrderBookMetrics::default().is_healthy());
    }

    #[test]
    fn test_crossed_book_is_not_healthy() {
        let metrics = OrderBookMetrics {
            best_bid: Some(dec!(101)),
            best_ask: Some(dec!(100)),
            bid_levels: 1,
            ask_levels: 1,
            ..Default::default()
        };
        assert!(!metrics.is_healthy());

        let metrics = OrderBookMetrics {
            best_bid: Some(dec!(99)),
            ..metrics
        };
        assert!(metrics.is_healthy());
    }
}
