//! Error types for the feed connectors

use std::io::ErrorKind;

use thiserror::Error;
use tokio_tungstenite::tungstenite::{self, error::ProtocolError};

/// Feed connector errors
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// The exchange (or the network) closed the socket. Recoverable through
    /// the reconnection state machine.
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    #[error("WebSocket connection error: {0}")]
    WebSocketConnection(String),

    #[error("WebSocket message error: {0}")]
    WebSocketMessage(String),

    #[error("Failed to decode frame: {0}")]
    Decode(String),

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("Not connected")]
    NotConnected,

    #[error("Ingress queue closed")]
    QueueClosed,

    #[error("REST API error: {0}")]
    RestApiError(String),

    #[error("Order book error: {0}")]
    OrderBookError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Metrics error: {0}")]
    MetricsError(String),
}

impl MarketDataError {
    /// True for the distinguished "connection closed" condition.
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, MarketDataError::ConnectionClosed(_))
    }

    /// Whether this error sends the connector down the reconnection path.
    /// Everything else is fatal to the connector that raised it.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MarketDataError::ConnectionClosed(_)
                | MarketDataError::Decode(_)
                | MarketDataError::ConnectionTimeout
        )
    }
}

impl From<tungstenite::Error> for MarketDataError {
    fn from(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                MarketDataError::ConnectionClosed(err.to_string())
            }
            tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake) => {
                MarketDataError::ConnectionClosed(err.to_string())
            }
            tungstenite::Error::Io(ref io)
                if matches!(
                    io.kind(),
                    ErrorKind::ConnectionReset
                        | ErrorKind::ConnectionAborted
                        | ErrorKind::BrokenPipe
                        | ErrorKind::UnexpectedEof
                ) =>
            {
                MarketDataError::ConnectionClosed(err.to_string())
            }
            other => MarketDataError::WebSocketConnection(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for MarketDataError {
    fn from(err: serde_json::Error) -> Self {
        MarketDataError::Decode(err.to_string())
    }
}

impl From<reqwest::Error> for MarketDataError {
    fn from(err: reqwest::Error) -> Self {
        MarketDataError::RestApiError(err.to_string())
    }
}

impl From<prometheus::Error> for MarketDataError {
    fn from(err: prometheus::Error) -> Self {
        MarketDataError::MetricsError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MarketDataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_kinds_map_to_connection_closed() {
        let closed: MarketDataError = tungstenite::Error::ConnectionClosed.into();
        assert!(closed.is_connection_closed());

        let reset: MarketDataError =
            tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake).into();
        assert!(reset.is_connection_closed());

        let io: MarketDataError =
            tungstenite::Error::Io(std::io::Error::from(ErrorKind::ConnectionReset)).into();
        assert!(io.is_connection_closed());
    }

    #[test]
    fn test_other_failures_are_fatal() {
        let refused: MarketDataError =
            tungstenite::Error::Io(std::io::Error::from(ErrorKind::ConnectionRefused)).into();
        assert!(!refused.is_retryable());
        assert!(!MarketDataError::NotConnected.is_retryable());
        assert!(!MarketDataError::ConfigError("bad".into()).is_retryable());
    }

    #[test]
    fn test_decode_and_timeout_take_retry_path() {
        let decode: MarketDataError = serde_json::from_str::<serde_json::Value>("{oops")
            .unwrap_err()
            .into();
        assert!(decode.is_retryable());
        assert!(!decode.is_connection_closed());
        assert!(MarketDataError::ConnectionTimeout.is_retryable());
    }
}
