//! Bitpanda ORDER_BOOK / PRICE_TICKS book (level 2)

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{Book, BookStatus, OrderBookMetrics, PriceLadder, Side, SnapshotClient};
use crate::error::{MarketDataError, Result};
use crate::parser::{parse_decimal, parse_levels, parse_side};

pub struct BitpandaBook {
    symbol: String,
    snapshot_url: String,
    client: SnapshotClient,
    ladder: PriceLadder,
    last_trade_price: Option<Decimal>,
    status: BookStatus,
}

impl BitpandaBook {
    pub fn new(symbol: &str, rest_endpoint: &str, client: SnapshotClient) -> Self {
        Self {
            symbol: symbol.to_string(),
            snapshot_url: format!("{}/order-book/{}?level=2", rest_endpoint, symbol),
            client,
            ladder: PriceLadder::new(),
            last_trade_price: None,
            status: BookStatus::new(),
        }
    }

    /// Replace the book with a level-2 snapshot. Used for both the
    /// ORDER_BOOK_SNAPSHOT frame and the REST response.
    pub fn load_snapshot(&mut self, snapshot: &Value) -> Result<()> {
        let bids = snapshot.get("bids").and_then(parse_levels);
        let asks = snapshot.get("asks").and_then(parse_levels);
        let (Some(bids), Some(asks)) = (bids, asks) else {
            return Err(MarketDataError::OrderBookError(format!(
                "bad Bitpanda snapshot for {}",
                self.symbol
            )));
        };

        self.ladder.clear();
        for (price, quantity) in bids {
            self.ladder.set(Side::Bid, price, quantity);
        }
        for (price, quantity) in asks {
            self.ladder.set(Side::Ask, price, quantity);
        }

        self.status.set_warming_up(false);
        info!(
            symbol = %self.symbol,
            bid_levels = self.ladder.bid_levels(),
            ask_levels = self.ladder.ask_levels(),
            "Bitpanda book loaded from snapshot"
        );
        Ok(())
    }

    /// Apply `changes: [["BUY"|"SELL", price, amount], ..]`, amount 0 removes
    fn apply_changes(&mut self, message: &Value) -> bool {
        if self.status.is_warming_up() {
            debug!(symbol = %self.symbol, "Book update before snapshot");
            return false;
        }

        let Some(changes) = message.get("changes").and_then(Value::as_array) else {
            return false;
        };

        let mut parsed = Vec::with_capacity(changes.len());
        for change in changes {
            let change = (
                change.get(0).and_then(parse_side),
                change.get(1).and_then(parse_decimal),
                change.get(2).and_then(parse_decimal),
            );
            let (Some(side), Some(price), Some(quantity)) = change else {
                return false;
            };
            parsed.push((side, price, quantity));
        }

        for (side, price, quantity) in parsed {
            self.ladder.set(side, price, quantity);
        }
        true
    }
}

#[async_trait]
impl Book for BitpandaBook {
    fn apply_message(&mut self, message: &Value) -> bool {
        let Some(kind) = message.get("type").and_then(Value::as_str) else {
            return false;
        };

        match kind {
            "ORDER_BOOK_SNAPSHOT" => self.load_snapshot(message).is_ok(),
            "ORDER_BOOK_UPDATE" => self.apply_changes(message),
            "PRICE_TICK" => match message.get("price").and_then(parse_decimal) {
                Some(price) => {
                    self.last_trade_price = Some(price);
                    true
                }
                None => false,
            },
            "ERROR" => {
                warn!(symbol = %self.symbol, message = %message, "Bitpanda reported an error");
                true
            }
            // SUBSCRIPTIONS, UNSUBSCRIBED, HEARTBEAT, PRICE_TICK_HISTORY, CONNECTION_CLOSING
            _ => true,
        }
    }

    async fn reload(&mut self) -> Result<()> {
        self.status.set_warming_up(true);
        let snapshot = self.client.fetch(&self.snapshot_url).await?;
        self.load_snapshot(&snapshot)
    }

    fn metrics(&self) -> OrderBookMetrics {
        self.ladder.metrics(self.last_trade_price)
    }

    fn status(&self) -> BookStatus {
        self.status.clone()
    }
}
