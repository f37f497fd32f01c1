//! Coinbase `full` channel book
//!
//! Level-3: every resting order is tracked. Frames carry a strict sequence
//! number; any gap invalidates the book until the next REST snapshot.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{Book, BookStatus, OrderBookMetrics, OrderLedger, Side, SnapshotClient};
use crate::error::{MarketDataError, Result};
use crate::parser::{parse_decimal, parse_level, parse_side};

pub struct CoinbaseBook {
    symbol: String,
    snapshot_url: String,
    client: SnapshotClient,
    ledger: OrderLedger<String>,
    sequence: u64,
    last_trade_price: Option<Decimal>,
    status: BookStatus,
}

impl CoinbaseBook {
    pub fn new(symbol: &str, rest_endpoint: &str, client: SnapshotClient) -> Self {
        Self {
            symbol: symbol.to_string(),
            snapshot_url: format!("{}/products/{}/book?level=3", rest_endpoint, symbol),
            client,
            ledger: OrderLedger::new(),
            sequence: 0,
            last_trade_price: None,
            status: BookStatus::new(),
        }
    }

    /// Last applied sequence number
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn order_count(&self) -> usize {
        self.ledger.len()
    }

    /// Replace the book with a level-3 snapshot:
    /// `{"sequence": n, "bids": [[price, size, order_id], ..], "asks": [..]}`
    pub fn load_snapshot(&mut self, snapshot: &Value) -> Result<()> {
        let sequence = snapshot
            .get("sequence")
            .and_then(Value::as_u64)
            .ok_or_else(|| MarketDataError::OrderBookError("snapshot without sequence".into()))?;

        self.ledger.clear();

        for (side, key) in [(Side::Bid, "bids"), (Side::Ask, "asks")] {
            let entries = snapshot.get(key).and_then(Value::as_array).ok_or_else(|| {
                MarketDataError::OrderBookError(format!("snapshot without {}", key))
            })?;

            for entry in entries {
                let (price, size) = parse_level(entry).ok_or_else(|| {
                    MarketDataError::OrderBookError(format!("bad snapshot level {}", entry))
                })?;
                let order_id = entry.get(2).and_then(Value::as_str).ok_or_else(|| {
                    MarketDataError::OrderBookError(format!("snapshot level without order id {}", entry))
                })?;
                self.ledger.insert(order_id.to_string(), side, price, size);
            }
        }

        self.sequence = sequence;
        self.status.set_warming_up(false);

        info!(
            symbol = %self.symbol,
            sequence,
            orders = self.ledger.len(),
            "Coinbase book loaded from snapshot"
        );
        Ok(())
    }

    fn apply_sequenced(&mut self, kind: &str, message: &Value) -> bool {
        let field = |key: &str| message.get(key);

        match kind {
            "open" => {
                let order = (
                    field("order_id").and_then(Value::as_str),
                    field("side").and_then(parse_side),
                    field("price").and_then(parse_decimal),
                    field("remaining_size").and_then(parse_decimal),
                );
                let (Some(id), Some(side), Some(price), Some(size)) = order else {
                    return false;
                };
                self.ledger.insert(id.to_string(), side, price, size);
            }
            "done" => {
                let Some(id) = field("order_id").and_then(Value::as_str) else {
                    return false;
                };
                // Orders filled on receipt never opened
                self.ledger.remove(&id.to_string());
            }
            "match" => {
                let (Some(maker), Some(size)) = (
                    field("maker_order_id").and_then(Value::as_str),
                    field("size").and_then(parse_decimal),
                ) else {
                    return false;
                };
                self.ledger.fill(&maker.to_string(), size);
                if let Some(price) = field("price").and_then(parse_decimal) {
                    self.last_trade_price = Some(price);
                }
            }
            "change" => {
                let Some(id) = field("order_id").and_then(Value::as_str) else {
                    return false;
                };
                // Changes to orders not on the book (still `received`) are ignored
                if let Some(new_size) = field("new_size").and_then(parse_decimal) {
                    self.ledger.resize(&id.to_string(), new_size);
                }
            }
            _ => {}
        }

        true
    }
}

#[async_trait]
impl Book for CoinbaseBook {
    fn apply_message(&mut self, message: &Value) -> bool {
        let Some(kind) = message.get("type").and_then(Value::as_str) else {
            return false;
        };

        match kind {
            "subscriptions" | "heartbeat" | "status" => return true,
            "error" => {
                warn!(symbol = %self.symbol, message = %message, "Coinbase reported an error");
                return true;
            }
            _ => {}
        }

        let Some(sequence) = message.get("sequence").and_then(Value::as_u64) else {
            return false;
        };

        if self.status.is_warming_up() {
            debug!(symbol = %self.symbol, sequence, "Book not loaded yet");
            return false;
        }

        if sequence <= self.sequence {
            // Already reflected in the snapshot
            return true;
        }

        if sequence != self.sequence + 1 {
            warn!(
                symbol = %self.symbol,
                expected = self.sequence + 1,
                got = sequence,
                "Coinbase sequence gap"
            );
            return false;
        }

        let applied = self.apply_sequenced(kind, message);
        if applied {
            self.sequence = sequence;
        }
        applied
    }

    async fn reload(&mut self) -> Result<()> {
        self.status.set_warming_up(true);
        let snapshot = self.client.fetch(&self.snapshot_url).await?;
        self.load_snapshot(&snapshot)
    }

    fn metrics(&self) -> OrderBookMetrics {
        self.ledger.ladder().metrics(self.last_trade_price)
    }

    fn status(&self) -> BookStatus {
        self.status.clone()
    }
}
