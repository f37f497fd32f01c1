//! Feed Connector - per-symbol exchange connectors
//!
//! Each configured symbol gets one connector: a WebSocket session that
//! subscribes and forwards frames into an ingress queue, and a processing
//! loop that applies them to that symbol's order book, reloading the book
//! from a REST snapshot whenever it falls out of sync.

pub mod config;
pub mod connector;
pub mod error;
pub mod exchange;
pub mod health;
pub mod orderbook;
pub mod parser;
pub mod supervisor;
pub mod websocket;

pub use config::{Config, Subscription};
pub use connector::{BookProcessor, Connector, ConnectorReport, ConnectorState, ConnectorStatus, ReconnectPolicy};
pub use error::{MarketDataError, Result};
pub use exchange::Exchange;
pub use orderbook::{Book, BookStatus, OrderBookMetrics};
pub use supervisor::Supervisor;
pub use websocket::{Session, TransportSession};
