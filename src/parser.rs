//! Field parsing helpers for exchange payloads
//!
//! Exchanges disagree on whether prices travel as JSON strings or numbers,
//! and on whether a level is an array or an object. These helpers accept
//! all of them.

use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

use crate::orderbook::Side;

/// Parse a decimal from a JSON string or number
pub fn parse_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => decimal_from_str(s),
        Value::Number(n) => decimal_from_str(&n.to_string()),
        _ => None,
    }
}

fn decimal_from_str(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

/// Parse a (price, quantity) level.
///
/// Accepts `["price", "qty", ...]` arrays and `{"price": .., "amount"|"size": ..}`
/// objects.
pub fn parse_level(value: &Value) -> Option<(Decimal, Decimal)> {
    match value {
        Value::Array(fields) if fields.len() >= 2 => {
            Some((parse_decimal(&fields[0])?, parse_decimal(&fields[1])?))
        }
        Value::Object(fields) => {
            let price = parse_decimal(fields.get("price")?)?;
            let quantity = fields
                .get("amount")
                .or_else(|| fields.get("size"))
                .and_then(parse_decimal)?;
            Some((price, quantity))
        }
        _ => None,
    }
}

/// Parse every level of a JSON array, failing on the first bad one
pub fn parse_levels(value: &Value) -> Option<Vec<(Decimal, Decimal)>> {
    value.as_array()?.iter().map(parse_level).collect()
}

/// Parse a side marker ("buy"/"sell", "BUY"/"SELL", "bid"/"ask")
pub fn parse_side(value: &Value) -> Option<Side> {
    match value.as_str()?.to_ascii_lowercase().as_str() {
        "buy" | "bid" => Some(Side::Bid),
        "sell" | "ask" => Some(Side::Ask),
        _ => None,
    }
}
