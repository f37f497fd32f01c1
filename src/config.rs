//! Configuration module for the feed connectors

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{MarketDataError, Result};
use crate::exchange::Exchange;

const DEFAULT_BASKET: &str = "coinbase:BTC-USD,bitfinex:tBTCUSD";

/// Parse straight into the target type; malformed or out-of-range values
/// fall back to the default.
fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

/// One entry of the symbol basket
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Subscription {
    pub exchange: Exchange,
    /// Exchange-native instrument identifier (e.g. "BTC-USD", "tBTCUSD", "BTC_EUR")
    pub symbol: String,
}

impl FromStr for Subscription {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self> {
        let (exchange, symbol) = s.trim().split_once(':').ok_or_else(|| {
            MarketDataError::ConfigError(format!("Expected exchange:symbol, got '{}'", s))
        })?;

        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(MarketDataError::ConfigError(format!(
                "Missing symbol in basket entry '{}'",
                s
            )));
        }

        Ok(Self {
            exchange: exchange.parse()?,
            symbol: symbol.to_string(),
        })
    }
}

/// WebSocket and REST endpoints for one exchange
#[derive(Debug, Clone, Deserialize)]
pub struct Endpoints {
    pub ws: String,
    pub rest: String,
}

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Symbols to record, one connector each
    pub basket: Vec<Subscription>,

    pub coinbase: Endpoints,
    pub bitfinex: Endpoints,
    pub bitpanda: Endpoints,

    /// Lifetime reconnection ceiling per connector
    pub max_reconnect_attempts: u32,

    /// Cool-down window measured from the last successful subscribe
    pub cool_down_secs: u64,
    pub min_sleep_secs: u64,

    /// Status timer period in seconds
    pub status_interval_secs: u64,

    /// Silence tolerated on a socket before a keepalive ping
    pub stale_timeout_secs: u64,
    pub ack_timeout_secs: u64,

    /// Depth requested from REST snapshot endpoints
    pub book_depth: usize,

    /// Health server port, 0 disables it
    pub health_port: u16,
}

impl Config {
    /// Load configuration from `.env` and environment variables
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Ok(Self::from_lookup(|key| env::var(key).ok())?)
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let basket = var("BASKET", DEFAULT_BASKET)
            .split(',')
            .filter(|entry| !entry.trim().is_empty())
            .map(Subscription::from_str)
            .collect::<Result<Vec<_>>>()?;

        if basket.is_empty() {
            return Err(MarketDataError::ConfigError("BASKET is empty".to_string()));
        }

        Ok(Self {
            basket,
            coinbase: Endpoints {
                ws: var("COINBASE_WS_ENDPOINT", "wss://ws-feed.exchange.coinbase.com"),
                rest: var("COINBASE_REST_ENDPOINT", "https://api.exchange.coinbase.com"),
            },
            bitfinex: Endpoints {
                ws: var("BITFINEX_WS_ENDPOINT", "wss://api-pub.bitfinex.com/ws/2"),
                rest: var("BITFINEX_REST_ENDPOINT", "https://api-pub.bitfinex.com/v2"),
            },
            bitpanda: Endpoints {
                ws: var("BITPANDA_WS_ENDPOINT", "wss://streams.exchange.bitpanda.com"),
                rest: var(
                    "BITPANDA_REST_ENDPOINT",
                    "https://api.exchange.bitpanda.com/public/v1",
                ),
            },
            max_reconnect_attempts: parse_or(lookup("MAX_RECONNECT_ATTEMPTS"), 30),
            cool_down_secs: parse_or(lookup("COOL_DOWN_SECS"), 10),
            min_sleep_secs: parse_or(lookup("MIN_SLEEP_SECS"), 1),
            status_interval_secs: parse_or::<u64>(lookup("STATUS_INTERVAL_SECS"), 5).max(1),
            stale_timeout_secs: parse_or::<u64>(lookup("STALE_TIMEOUT_SECS"), 45).max(1),
            ack_timeout_secs: parse_or::<u64>(lookup("ACK_TIMEOUT_SECS"), 5).max(1),
            book_depth: parse_or(lookup("BOOK_DEPTH"), 100),
            health_port: parse_or(lookup("HEALTH_PORT"), 9090),
        })
    }

    /// Endpoints for the given exchange
    pub fn endpoints(&self, exchange: Exchange) -> &Endpoints {
        match exchange {
            Exchange::Coinbase => &self.coinbase,
            Exchange::Bitfinex => &self.bitfinex,
            Exchange::Bitpanda => &self.bitpanda,
        }
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs)
    }

    pub fn stale_timeout(&self) -> Duration {
        Duration::from_secs(self.stale_timeout_secs)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_secs(self.ack_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        // The empty lookup only ever yields the built-in defaults, which parse.
        match Self::from_lookup(|_| None) {
            Ok(config) => config,
            Err(e) => unreachable!("default configuration is invalid: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.basket.len(), 2);
        assert_eq!(config.basket[0].exchange, Exchange::Coinbase);
        assert_eq!(config.basket[1].symbol, "tBTCUSD");
        assert_eq!(config.cool_down_secs, 10);
        assert_eq!(config.min_sleep_secs, 1);
        assert_eq!(config.max_reconnect_attempts, 30);
    }

    #[test]
    fn test_basket_parsing() {
        let config = config_from(&[(
            "BASKET",
            "coinbase:ETH-USD, bitpanda:BTC_EUR ,bitfinex:tETHUSD,",
        )])
        .unwrap();

        assert_eq!(
            config.basket,
            vec![
                Subscription {
                    exchange: Exchange::Coinbase,
                    symbol: "ETH-USD".to_string()
                },
                Subscription {
                    exchange: Exchange::Bitpanda,
                    symbol: "BTC_EUR".to_string()
                },
                Subscription {
                    exchange: Exchange::Bitfinex,
                    symbol: "tETHUSD".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_bad_basket_is_an_error() {
        assert!(config_from(&[("BASKET", "kraken:XBTUSD")]).is_err());
        assert!(config_from(&[("BASKET", "BTC-USD")]).is_err());
        assert!(config_from(&[("BASKET", "coinbase:")]).is_err());
        assert!(config_from(&[("BASKET", " , ")]).is_err());
    }

    #[test]
    fn test_malformed_numbers_fall_back() {
        let config = config_from(&[
            ("MAX_RECONNECT_ATTEMPTS", "lots"),
            ("COOL_DOWN_SECS", "20"),
        ])
        .unwrap();
        assert_eq!(config.max_reconnect_attempts, 30);
        assert_eq!(config.cool_down_secs, 20);
    }

    #[test]
    fn test_out_of_range_numbers_fall_back() {
        let config = config_from(&[
            ("MAX_RECONNECT_ATTEMPTS", "4294967296"),
            ("HEALTH_PORT", "70000"),
            ("BOOK_DEPTH", "-5"),
        ])
        .unwrap();
        assert_eq!(config.max_reconnect_attempts, 30);
        assert_eq!(config.health_port, 9090);
        assert_eq!(config.book_depth, 100);

        let config = config_from(&[("MAX_RECONNECT_ATTEMPTS", "4294967295"), ("HEALTH_PORT", "0")]).unwrap();
        assert_eq!(config.max_reconnect_attempts, u32::MAX);
        assert_eq!(config.health_port, 0);
    }

    #[test]
    fn test_endpoint_selection() {
        let config = config_from(&[("BITPANDA_WS_ENDPOINT", "ws://localhost:9000")]).unwrap();
        assert_eq!(config.endpoints(Exchange::Bitpanda).ws, "ws://localhost:9000");
        assert!(config.endpoints(Exchange::Coinbase).ws.starts_with("wss://"));
    }
}
