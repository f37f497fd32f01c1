//! Observable connector state
//!
//! Written only by the owning connector and its processing loop; read by
//! the status timer and the health endpoints.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use super::queue::QueueDepth;
use crate::exchange::Exchange;
use crate::orderbook::{BookStatus, OrderBookMetrics};

/// Reconnection state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorState {
    Disconnected,
    Connecting,
    Subscribed,
    /// Retry budget spent; the symbol receives no more data
    Exhausted,
    /// Non-recoverable error; the symbol receives no more data
    Failed,
    /// Shut down on request
    Stopped,
}

impl ConnectorState {
    /// No further connection attempts will be made from this state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConnectorState::Exhausted | ConnectorState::Failed | ConnectorState::Stopped
        )
    }

    /// Terminal without being asked to stop
    pub fn is_stalled(&self) -> bool {
        matches!(self, ConnectorState::Exhausted | ConnectorState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectorState::Disconnected => "disconnected",
            ConnectorState::Connecting => "connecting",
            ConnectorState::Subscribed => "subscribed",
            ConnectorState::Exhausted => "exhausted",
            ConnectorState::Failed => "failed",
            ConnectorState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ConnectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of one connector, as served by `/health`
#[derive(Debug, Clone, Serialize)]
pub struct ConnectorReport {
    pub exchange: Exchange,
    pub symbol: String,
    pub state: ConnectorState,
    pub retry_count: u32,
    pub repair_count: u32,
    pub frames_received: u64,
    pub queue_depth: usize,
    pub warming_up: bool,
    pub last_subscribe_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub book: Option<OrderBookMetrics>,
}

#[derive(Debug)]
pub struct ConnectorStatus {
    exchange: Exchange,
    symbol: String,
    state: RwLock<ConnectorState>,
    retry_count: AtomicU32,
    repair_count: AtomicU32,
    frames_received: AtomicU64,
    last_subscribe_at: RwLock<Option<DateTime<Utc>>>,
    last_error: RwLock<Option<String>>,
    queue_depth: QueueDepth,
    book: BookStatus,
}

impl ConnectorStatus {
    pub fn new(exchange: Exchange, symbol: &str, book: BookStatus, queue_depth: QueueDepth) -> Self {
        Self {
            exchange,
            symbol: symbol.to_string(),
            state: RwLock::new(ConnectorState::Disconnected),
            retry_count: AtomicU32::new(0),
            repair_count: AtomicU32::new(0),
            frames_received: AtomicU64::new(0),
            last_subscribe_at: RwLock::new(None),
            last_error: RwLock::new(None),
            queue_depth,
            book,
        }
    }

    pub fn exchange(&self) -> Exchange {
        self.exchange
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn state(&self) -> ConnectorState {
        *self.state.read()
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count.load(Ordering::Relaxed)
    }

    pub fn repair_count(&self) -> u32 {
        self.repair_count.load(Ordering::Relaxed)
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    pub fn queue_depth(&self) -> usize {
        self.queue_depth.get()
    }

    pub fn book(&self) -> &BookStatus {
        &self.book
    }

    pub fn last_subscribe_at(&self) -> Option<DateTime<Utc>> {
        *self.last_subscribe_at.read()
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    pub(crate) fn set_state(&self, state: ConnectorState) {
        *self.state.write() = state;
    }

    pub(crate) fn mark_subscribed(&self) {
        *self.last_subscribe_at.write() = Some(Utc::now());
        self.set_state(ConnectorState::Subscribed);
    }

    pub(crate) fn set_retry_count(&self, retries: u32) {
        self.retry_count.store(retries, Ordering::Relaxed);
    }

    pub(crate) fn record_repair(&self) -> u32 {
        self.repair_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_frame(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_last_error(&self, error: String) {
        *self.last_error.write() = Some(error);
    }

    pub fn report(&self) -> ConnectorReport {
        ConnectorReport {
            exchange: self.exchange,
            symbol: self.symbol.clone(),
            state: self.state(),
            retry_count: self.retry_count(),
            repair_count: self.repair_count(),
            frames_received: self.frames_received(),
            queue_depth: self.queue_depth(),
            warming_up: self.book.is_warming_up(),
            last_subscribe_at: self.last_subscribe_at(),
            last_error: self.last_error(),
            book: self.book.metrics(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(ConnectorState::Exhausted.is_terminal());
        assert!(ConnectorState::Failed.is_terminal());
        assert!(ConnectorState::Stopped.is_terminal());
        assert!(!ConnectorState::Subscribed.is_terminal());

        assert!(ConnectorState::Exhausted.is_stalled());
        assert!(!ConnectorState::Stopped.is_stalled());
    }

    #[test]
    fn test_report_reflects_updates() {
        let status = ConnectorStatus::new(
            Exchange::Bitfinex,
            "tBTCUSD",
            BookStatus::new(),
            QueueDepth::default(),
        );

        status.mark_subscribed();
        status.record_frame();
        status.record_frame();
        status.set_retry_count(2);
        assert_eq!(status.record_repair(), 1);

        let report = status.report();
        assert_eq!(report.state, ConnectorState::Subscribed);
        assert_eq!(report.frames_received, 2);
        assert_eq!(report.retry_count, 2);
        assert_eq!(report.repair_count, 1);
        assert!(report.warming_up);
        assert!(report.last_subscribe_at.is_some());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["state"], "subscribed");
        assert_eq!(json["exchange"], "bitfinex");
    }
}
