//! Subscribe/unsubscribe request shaping per exchange
//!
//! Each exchange gets one [`SubscriptionProtocol`] implementation; the
//! transport session picks it once from [`Exchange::protocol`] and never
//! branches on the exchange itself.

use serde_json::{json, Value};

use crate::exchange::Exchange;

/// How a symbol subscription is laid out on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    /// One subscription covers book and trades, unsubscribe by symbol list
    SingleChannel,
    /// One subscription per feed, exchange hands back a channel id for each
    ChannelIds,
    /// Several named channels in one request, unsubscribe by channel name
    NamedChannels,
}

/// Request-shaping strategy for one exchange
pub trait SubscriptionProtocol: Send + Sync {
    fn layout(&self) -> ChannelLayout;

    /// Book subscription, the first frame sent after connect
    fn subscribe_request(&self, symbol: &str) -> Value;

    /// Separate trades subscription, when the exchange splits feeds
    fn trades_subscribe_request(&self, _symbol: &str) -> Option<Value> {
        None
    }

    /// Unsubscribe frames; one acknowledgement is awaited per frame
    fn unsubscribe_requests(&self, symbol: &str, channel_ids: &[u64]) -> Vec<Value>;

    /// Whether a frame answers an unsubscribe request, successfully or not.
    /// Data frames still in flight are not acknowledgements.
    fn is_unsubscribe_ack(&self, frame: &Value) -> bool;
}

fn field<'a>(frame: &'a Value, key: &str) -> Option<&'a str> {
    frame.get(key).and_then(Value::as_str)
}

pub struct CoinbaseProtocol;

impl SubscriptionProtocol for CoinbaseProtocol {
    fn layout(&self) -> ChannelLayout {
        ChannelLayout::SingleChannel
    }

    fn subscribe_request(&self, symbol: &str) -> Value {
        json!({
            "type": "subscribe",
            "product_ids": [symbol],
            "channels": ["full"]
        })
    }

    fn unsubscribe_requests(&self, symbol: &str, _channel_ids: &[u64]) -> Vec<Value> {
        vec![json!({
            "type": "unsubscribe",
            "product_ids": [symbol],
            "channels": ["full"]
        })]
    }

    fn is_unsubscribe_ack(&self, frame: &Value) -> bool {
        matches!(field(frame, "type"), Some("subscriptions" | "error"))
    }
}

pub struct BitfinexProtocol;

impl SubscriptionProtocol for BitfinexProtocol {
    fn layout(&self) -> ChannelLayout {
        ChannelLayout::ChannelIds
    }

    fn subscribe_request(&self, symbol: &str) -> Value {
        json!({
            "event": "subscribe",
            "channel": "book",
            "prec": "R0",
            "freq": "F0",
            "symbol": symbol,
            "len": "100"
        })
    }

    fn trades_subscribe_request(&self, symbol: &str) -> Option<Value> {
        Some(json!({
            "event": "subscribe",
            "channel": "trades",
            "symbol": symbol
        }))
    }

    fn unsubscribe_requests(&self, _symbol: &str, channel_ids: &[u64]) -> Vec<Value> {
        channel_ids
            .iter()
            .map(|chan_id| {
                json!({
                    "event": "unsubscribe",
                    "chanId": chan_id
                })
            })
            .collect()
    }

    fn is_unsubscribe_ack(&self, frame: &Value) -> bool {
        matches!(field(frame, "event"), Some("unsubscribed" | "error"))
    }
}

pub struct BitpandaProtocol;

impl SubscriptionProtocol for BitpandaProtocol {
    fn layout(&self) -> ChannelLayout {
        ChannelLayout::NamedChannels
    }

    fn subscribe_request(&self, symbol: &str) -> Value {
        json!({
            "type": "subscribe",
            "channels": [
                { "name": "ORDER_BOOK", "instrument_codes": [symbol] },
                { "name": "PRICE_TICKS", "instrument_codes": [symbol] }
            ]
        })
    }

    fn unsubscribe_requests(&self, _symbol: &str, _channel_ids: &[u64]) -> Vec<Value> {
        vec![json!({
            "type": "unsubscribe",
            "channels": ["PRICE_TICKS", "ORDER_BOOK"]
        })]
    }

    fn is_unsubscribe_ack(&self, frame: &Value) -> bool {
        field(frame, "type").map_or(false, |kind| {
            kind.eq_ignore_ascii_case("unsubscribed") || kind.eq_ignore_ascii_case("error")
        })
    }
}

impl Exchange {
    /// Request-shaping strategy for this exchange
    pub fn protocol(&self) -> &'static dyn SubscriptionProtocol {
        match self {
            Exchange::Coinbase => &CoinbaseProtocol,
            Exchange::Bitfinex => &BitfinexProtocol,
            Exchange::Bitpanda => &BitpandaProtocol,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coinbase_requests() {
        let protocol = Exchange::Coinbase.protocol();
        assert_eq!(protocol.layout(), ChannelLayout::SingleChannel);
        assert_eq!(
            protocol.subscribe_request("BTC-USD"),
            json!({"type": "subscribe", "product_ids": ["BTC-USD"], "channels": ["full"]})
        );
        assert!(protocol.trades_subscribe_request("BTC-USD").is_none());

        let unsubscribe = protocol.unsubscribe_requests("BTC-USD", &[7, 8]);
        assert_eq!(unsubscribe.len(), 1);
        assert_eq!(unsubscribe[0]["type"], "unsubscribe");
        assert_eq!(unsubscribe[0]["product_ids"], json!(["BTC-USD"]));
    }

    #[test]
    fn test_bitfinex_requests() {
        let protocol = Exchange::Bitfinex.protocol();
        let book = protocol.subscribe_request("tBTCUSD");
        assert_eq!(book["channel"], "book");
        assert_eq!(book["prec"], "R0");
        assert_eq!(book["freq"], "F0");
        assert_eq!(book["len"], "100");
        assert_eq!(book["symbol"], "tBTCUSD");

        let trades = protocol.trades_subscribe_request("tBTCUSD").unwrap();
        assert_eq!(
            trades,
            json!({"event": "subscribe", "channel": "trades", "symbol": "tBTCUSD"})
        );
    }

    #[test]
    fn test_bitfinex_unsubscribes_every_channel_id() {
        let protocol = Exchange::Bitfinex.protocol();
        let requests = protocol.unsubscribe_requests("tBTCUSD", &[17, 42, 99]);
        assert_eq!(requests.len(), 3);
        for (request, chan_id) in requests.iter().zip([17u64, 42, 99]) {
            assert_eq!(request, &json!({"event": "unsubscribe", "chanId": chan_id}));
        }
        assert!(protocol.unsubscribe_requests("tBTCUSD", &[]).is_empty());
    }

    #[test]
    fn test_unsubscribe_acks_are_told_apart_from_data() {
        let coinbase = Exchange::Coinbase.protocol();
        assert!(coinbase.is_unsubscribe_ack(&json!({"type": "subscriptions", "channels": []})));
        assert!(coinbase.is_unsubscribe_ack(&json!({"type": "error", "message": "bad"})));
        assert!(!coinbase.is_unsubscribe_ack(&json!({"type": "open", "sequence": 5})));

        let bitfinex = Exchange::Bitfinex.protocol();
        assert!(bitfinex.is_unsubscribe_ack(&json!({"event": "unsubscribed", "status": "OK", "chanId": 17})));
        assert!(!bitfinex.is_unsubscribe_ack(&json!([17, "hb"])));
        assert!(!bitfinex.is_unsubscribe_ack(&json!({"event": "info", "version": 2})));

        let bitpanda = Exchange::Bitpanda.protocol();
        assert!(bitpanda.is_unsubscribe_ack(&json!({"type": "UNSUBSCRIBED", "channel_name": "ORDER_BOOK"})));
        assert!(!bitpanda.is_unsubscribe_ack(&json!({"type": "ORDER_BOOK_UPDATE", "changes": []})));
    }

    #[test]
    fn test_bitpanda_requests() {
        let protocol = Exchange::Bitpanda.protocol();
        let request = protocol.subscribe_request("BTC_EUR");
        assert_eq!(request["channels"][0]["name"], "ORDER_BOOK");
        assert_eq!(request["channels"][1]["name"], "PRICE_TICKS");
        assert_eq!(request["channels"][1]["instrument_codes"], json!(["BTC_EUR"]));

        assert_eq!(
            protocol.unsubscribe_requests("BTC_EUR", &[]),
            vec![json!({"type": "unsubscribe", "channels": ["PRICE_TICKS", "ORDER_BOOK"]})]
        );
    }
}
