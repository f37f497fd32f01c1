//! Bitfinex raw (R0) book
//!
//! Bitfinex assigns a channel id per subscription and prefixes every data
//! frame with it. Events (`subscribed`, `unsubscribed`, `info`, `error`)
//! are JSON objects; data frames are arrays:
//!
//! - `[chanId, "hb"]` heartbeat
//! - `[chanId, [[orderId, price, amount], ..]]` book snapshot
//! - `[chanId, [orderId, price, amount]]` book update, price 0 removes
//! - `[chanId, "te", [id, mts, amount, price]]` trade execution

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{Book, BookStatus, OrderBookMetrics, OrderLedger, Side, SnapshotClient};
use crate::error::{MarketDataError, Result};
use crate::parser::parse_decimal;

/// Info code asking clients to reconnect
const INFO_RECONNECT: u64 = 20051;

pub struct BitfinexBook {
    symbol: String,
    snapshot_url: String,
    client: SnapshotClient,
    ledger: OrderLedger<u64>,
    book_channel: Option<u64>,
    trades_channel: Option<u64>,
    last_trade_price: Option<Decimal>,
    status: BookStatus,
}

/// One raw book entry: (order id, side, price, size); price 0 means delete
fn parse_raw_order(entry: &Value) -> Option<(u64, Side, Decimal, Decimal)> {
    let fields = entry.as_array()?;
    if fields.len() < 3 {
        return None;
    }
    let id = fields[0].as_u64()?;
    let price = parse_decimal(&fields[1])?;
    let amount = parse_decimal(&fields[2])?;
    let side = if amount > Decimal::ZERO { Side::Bid } else { Side::Ask };
    Some((id, side, price, amount.abs()))
}

impl BitfinexBook {
    pub fn new(symbol: &str, rest_endpoint: &str, depth: usize, client: SnapshotClient) -> Self {
        Self {
            symbol: symbol.to_string(),
            snapshot_url: format!("{}/book/{}/R0?len={}", rest_endpoint, symbol, depth),
            client,
            ledger: OrderLedger::new(),
            book_channel: None,
            trades_channel: None,
            last_trade_price: None,
            status: BookStatus::new(),
        }
    }

    pub fn order_count(&self) -> usize {
        self.ledger.len()
    }

    /// Replace the book with a raw snapshot: `[[orderId, price, amount], ..]`
    pub fn load_snapshot(&mut self, entries: &Value) -> Result<()> {
        let entries = entries
            .as_array()
            .ok_or_else(|| MarketDataError::OrderBookError("raw snapshot is not a list".into()))?;

        self.ledger.clear();
        for entry in entries {
            let (id, side, price, size) = parse_raw_order(entry).ok_or_else(|| {
                MarketDataError::OrderBookError(format!("bad raw book entry {}", entry))
            })?;
            self.ledger.insert(id, side, price, size);
        }

        self.status.set_warming_up(false);
        info!(symbol = %self.symbol, orders = self.ledger.len(), "Bitfinex book loaded from snapshot");
        Ok(())
    }

    fn apply_event(&mut self, event: &Value) -> bool {
        let chan_id = event.get("chanId").and_then(Value::as_u64);

        match event.get("event").and_then(Value::as_str) {
            Some("subscribed") => {
                let Some(chan_id) = chan_id else {
                    return false;
                };
                let previous = match event.get("channel").and_then(Value::as_str) {
                    Some("book") => self.book_channel.replace(chan_id),
                    Some("trades") => self.trades_channel.replace(chan_id),
                    _ => None,
                };
                // A resubscribe on a new socket supersedes the old id
                if let Some(previous) = previous.filter(|&previous| previous != chan_id) {
                    self.status.remove_channel(previous);
                }
                self.status.add_channel(chan_id);
                info!(symbol = %self.symbol, chan_id, channel = ?event.get("channel"), "Bitfinex channel subscribed");
            }
            Some("unsubscribed") => {
                if let Some(chan_id) = chan_id {
                    self.status.remove_channel(chan_id);
                    if self.book_channel == Some(chan_id) {
                        self.book_channel = None;
                    }
                    if self.trades_channel == Some(chan_id) {
                        self.trades_channel = None;
                    }
                }
            }
            Some("info") => {
                if event.get("code").and_then(Value::as_u64) == Some(INFO_RECONNECT) {
                    warn!(symbol = %self.symbol, "Bitfinex asked clients to reconnect");
                }
            }
            Some("error") => {
                warn!(symbol = %self.symbol, event = %event, "Bitfinex reported an error");
            }
            Some(_) => {}
            None => return false,
        }

        true
    }

    fn apply_book(&mut self, payload: &Value) -> bool {
        let Some(fields) = payload.as_array() else {
            return false;
        };

        if fields.first().map_or(true, Value::is_array) {
            return self.load_snapshot(payload).is_ok();
        }

        if self.status.is_warming_up() {
            debug!(symbol = %self.symbol, "Book update before snapshot");
            return false;
        }

        let Some((id, side, price, size)) = parse_raw_order(payload) else {
            return false;
        };

        if price.is_zero() {
            self.ledger.remove(&id);
        } else {
            self.ledger.insert(id, side, price, size);
        }
        true
    }

    fn apply_trade(&mut self, frame: &[Value]) -> bool {
        if frame.get(1).and_then(Value::as_str) == Some("te") {
            let Some(price) = frame
                .get(2)
                .and_then(Value::as_array)
                .and_then(|trade| trade.get(3))
                .and_then(parse_decimal)
            else {
                return false;
            };
            self.last_trade_price = Some(price);
        }
        true
    }
}

#[async_trait]
impl Book for BitfinexBook {
    fn apply_message(&mut self, message: &Value) -> bool {
        let frame = match message {
            Value::Object(_) => return self.apply_event(message),
            Value::Array(frame) => frame,
            _ => return false,
        };

        let Some(chan_id) = frame.first().and_then(Value::as_u64) else {
            return false;
        };

        if frame.get(1).and_then(Value::as_str) == Some("hb") {
            return true;
        }

        if Some(chan_id) == self.book_channel {
            match frame.get(1) {
                Some(payload) => self.apply_book(payload),
                None => false,
            }
        } else if Some(chan_id) == self.trades_channel {
            self.apply_trade(frame)
        } else {
            debug!(symbol = %self.symbol, chan_id, "Frame for unknown channel");
            true
        }
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
