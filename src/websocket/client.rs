//! WebSocket transport session
//!
//! Handles connection, subscription handshake, frame reception and
//! unsubscription for a single symbol.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async,
    tungstenite::protocol::Message,
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};

use super::{Session, SubscriptionProtocol};
use crate::error::{MarketDataError, Result};
use crate::exchange::Exchange;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const DEFAULT_STALE_TIMEOUT: Duration = Duration::from_secs(45);
const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// WebSocket session for one symbol on one exchange
pub struct TransportSession {
    stream: Option<WsStream>,
    exchange: Exchange,
    endpoint: String,
    symbol: String,
    stale_timeout: Duration,
    ack_timeout: Duration,
}

impl TransportSession {
    /// Create a new, disconnected session
    pub fn new(exchange: Exchange, endpoint: &str, symbol: &str) -> Self {
        Self {
            stream: None,
            exchange,
            endpoint: endpoint.to_string(),
            symbol: symbol.to_string(),
            stale_timeout: DEFAULT_STALE_TIMEOUT,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
        }
    }

    /// Override the keepalive and acknowledgement timeouts
    pub fn with_timeouts(mut self, stale_timeout: Duration, ack_timeout: Duration) -> Self {
        self.stale_timeout = stale_timeout;
        self.ack_timeout = ack_timeout;
        self
    }

    pub fn exchange(&self) -> Exchange {
        self.exchange
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    async fn open(&mut self) -> Result<()> {
        // Never hold two sockets for the same symbol
        self.close().await;

        info!(
            exchange = %self.exchange,
            symbol = %self.symbol,
            endpoint = %self.endpoint,
            "Connecting to exchange WebSocket"
        );

        let (ws_stream, response) = connect_async(self.endpoint.as_str()).await?;

        debug!(status = ?response.status(), "WebSocket connected");
        self.stream = Some(ws_stream);

        Ok(())
    }

    async fn send(&mut self, request: &Value) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(MarketDataError::NotConnected)?;
        stream.send(Message::Text(request.to_string())).await?;
        Ok(())
    }

    /// Receive the next frame, `None` for control frames
    async fn recv(&mut self) -> Result<Option<Value>> {
        let stream = self.stream.as_mut().ok_or(MarketDataError::NotConnected)?;

        match stream.next().await {
            Some(Ok(Message::Text(text))) => Ok(Some(serde_json::from_str(&text)?)),
            Some(Ok(Message::Binary(data))) => Ok(Some(serde_json::from_slice(&data)?)),
            Some(Ok(Message::Ping(data))) => {
                debug!("Received ping, sending pong");
                stream.send(Message::Pong(data)).await?;
                Ok(None)
            }
            Some(Ok(Message::Pong(_))) => {
                debug!("Received pong");
                Ok(None)
            }
            Some(Ok(Message::Close(frame))) => {
                warn!(exchange = %self.exchange, symbol = %self.symbol, frame = ?frame, "Received close frame");
                self.stream = None;
                Err(MarketDataError::ConnectionClosed(match frame {
                    Some(frame) => format!("{} {}", frame.code, frame.reason),
                    None => "close frame".to_string(),
                }))
            }
            Some(Ok(Message::Frame(_))) => Ok(None),
            Some(Err(e)) => {
                self.stream = None;
                Err(e.into())
            }
            None => {
                self.stream = None;
                Err(MarketDataError::ConnectionClosed("stream ended".to_string()))
            }
        }
    }

    async fn ping(&mut self) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(MarketDataError::NotConnected)?;
        stream.send(Message::Ping(vec![])).await?;
        Ok(())
    }

    /// Read until the exchange answers an unsubscribe. Data frames still in
    /// flight are dropped; the book is going away.
    async fn next_ack(&mut self, protocol: &dyn SubscriptionProtocol) -> Result<Value> {
        let mut skipped = 0usize;
        loop {
            let frame = self.next_frame().await?;
            if protocol.is_unsubscribe_ack(&frame) {
                if skipped > 0 {
                    debug!(exchange = %self.exchange, symbol = %self.symbol, skipped, "Frames dropped while awaiting unsubscribe ack");
                }
                return Ok(frame);
            }
            skipped += 1;
        }
    }
}

#[async_trait]
impl Session for TransportSession {
    async fn connect(&mut self) -> Result<()> {
        self.open().await?;

        let protocol = self.exchange.protocol();

        self.send(&protocol.subscribe_request(&self.symbol)).await?;
        info!(exchange = %self.exchange, symbol = %self.symbol, "BOOK subscription request sent");

        if let Some(trades) = protocol.trades_subscribe_request(&self.symbol) {
            self.send(&trades).await?;
            info!(exchange = %self.exchange, symbol = %self.symbol, "TRADES subscription request sent");
        }

        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Value> {
        let mut pinged = false;

        loop {
            match timeout(self.stale_timeout, self.recv()).await {
                Ok(Ok(Some(frame))) => return Ok(frame),
                Ok(Ok(None)) => {
                    // Control frames prove the socket is alive
                    pinged = false;
                }
                Ok(Err(e)) => return Err(e),
                Err(_) if pinged => {
                    warn!(exchange = %self.exchange, symbol = %self.symbol, "Socket silent after keepalive, giving up on it");
                    return Err(MarketDataError::ConnectionTimeout);
                }
                Err(_) => {
                    warn!(
                        exchange = %self.exchange,
                        symbol = %self.symbol,
                        silent_secs = self.stale_timeout.as_secs(),
                        "No frame received within timeout, sending keepalive"
                    );
                    self.ping().await?;
                    pinged = true;
                }
            }
        }
    }

    async fn unsubscribe(&mut self, channel_ids: &[u64]) -> Result<Vec<Value>> {
        let protocol = self.exchange.protocol();
        let requests = protocol.unsubscribe_requests(&self.symbol, channel_ids);
        debug!(
            exchange = %self.exchange,
            symbol = %self.symbol,
            layout = ?protocol.layout(),
            requests = requests.len(),
            "Unsubscribing"
        );

        let mut acks = Vec::with_capacity(requests.len());
        for request in requests {
            self.send(&request).await?;
            info!(exchange = %self.exchange, symbol = %self.symbol, request = %request, "Unsubscribe request sent");

            let ack = timeout(self.ack_timeout, self.next_ack(protocol))
                .await
                .map_err(|_| MarketDataError::ConnectionTimeout)??;
            info!(exchange = %self.exchange, symbol = %self.symbol, ack = %ack, "Unsubscribe acknowledged");
            acks.push(ack);
        }

        Ok(acks)
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.close(None).await;
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}
