//! WebSocket transport for exchange feeds

mod client;
pub mod protocol;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub use client::TransportSession;
pub use protocol::{ChannelLayout, SubscriptionProtocol};

/// Wire-level session for one symbol on one exchange.
///
/// The connector drives this: `connect` once per attempt, then `next_frame`
/// until it fails. At most one socket is live per session; `connect` closes
/// any previous one first.
#[async_trait]
pub trait Session: Send {
    /// Open the socket and send the subscribe request(s)
    async fn connect(&mut self) -> Result<()>;

    /// Next decoded frame. Control frames are handled internally.
    async fn next_frame(&mut self) -> Result<Value>;

    /// Send the unsubscribe request(s), returning one acknowledgement per
    /// request. Data frames that arrive ahead of an ack are dropped.
    async fn unsubscribe(&mut self, channel_ids: &[u64]) -> Result<Vec<Value>>;

    /// Close the socket if one is open
    async fn close(&mut self);

    fn is_connected(&self) -> bool;
}
