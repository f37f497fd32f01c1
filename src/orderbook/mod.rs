//! Order book module
//!
//! The connector only needs two calls from a book: apply one decoded frame,
//! and reload from a fresh snapshot when that fails. Each exchange has its
//! own book behind the [`Book`] trait.

mod bitfinex;
mod bitpanda;
mod coinbase;
mod ladder;
mod ledger;
mod metrics;
mod snapshot;
mod status;

pub use bitfinex::BitfinexBook;
pub use bitpanda::BitpandaBook;
pub use coinbase::CoinbaseBook;
pub use ladder::PriceLadder;
pub use ledger::OrderLedger;
pub use metrics::OrderBookMetrics;
pub use snapshot::SnapshotClient;
pub use status::BookStatus;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Side of the order book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
}

/// Order book state for one symbol, owned by its connector's processing loop
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Book: Send + 'static {
    /// Apply one decoded frame. `false` means the book can no longer be
    /// trusted incrementally (gap, out-of-order or uninterpretable frame).
    fn apply_message(&mut self, message: &Value) -> bool;

    /// Resynchronise from a fresh snapshot
    async fn reload(&mut self) -> Result<()>;

    /// Current book metrics
    fn metrics(&self) -> OrderBookMetrics;

    /// Shared handle read by the status timer and the transport session
    fn status(&self) -> BookStatus;
}
