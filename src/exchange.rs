//! Supported exchanges

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MarketDataError;

/// Exchange identity. Selects the wire protocol and the book implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    /// Single-channel protocol (`full` channel carries book and trades)
    Coinbase,
    /// Channel-id protocol (separate book and trades subscriptions)
    Bitfinex,
    /// Named-channel protocol (ORDER_BOOK + PRICE_TICKS)
    Bitpanda,
}

impl Exchange {
    pub const ALL: [Exchange; 3] = [Exchange::Coinbase, Exchange::Bitfinex, Exchange::Bitpanda];

    pub fn as_str(&self) -> &'static str {
        match self {
            Exchange::Coinbase => "coinbase",
            Exchange::Bitfinex => "bitfinex",
            Exchange::Bitpanda => "bitpanda",
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Exchange {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "coinbase" | "gdax" => Ok(Exchange::Coinbase),
            "bitfinex" => Ok(Exchange::Bitfinex),
            "bitpanda" => Ok(Exchange::Bitpanda),
            other => Err(MarketDataError::ConfigError(format!(
                "Unknown exchange: {}",
                other
            ))),
        }
    }
}
