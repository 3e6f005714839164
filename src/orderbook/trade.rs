//! Immutable trade records.
//!
//! Fees are not part of this core: no `FeeSchedule`/fee fields are carried
//! on a `Trade` — a subscriber computes fees from `Trade` events
//! independently.

use crate::decimal::Decimal;
use crate::orderbook::order::Side;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single execution between a resting maker order and an incoming taker
/// order. Immutable once emitted; `seq` is strictly increasing per pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    /// Globally unique trade identifier.
    pub trade_id: String,
    /// Trading pair symbol.
    pub pair: String,
    /// The resting order's identifier.
    pub maker_order_id: String,
    /// The incoming order's identifier.
    pub taker_order_id: String,
    /// Execution price — always the maker's resting limit price.
    pub price: Decimal,
    /// Executed quantity; always strictly positive.
    pub qty: Decimal,
    /// The side of the taker in this trade.
    pub taker_side: Side,
    /// Wall-clock timestamp in Unix epoch milliseconds.
    pub ts: u64,
    /// Per-pair monotone sequence number assigned at emission.
    pub seq: u64,
}

/// Generate a globally unique trade identifier (UUIDv4, same convention as
/// [`crate::orderbook::order::new_order_id`]).
pub fn new_trade_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trade_ids_are_unique() {
        assert_ne!(new_trade_id(), new_trade_id());
    }

    #[test]
    fn trade_serializes_decimal_fields_as_strings() {
        let trade = Trade {
            trade_id: new_trade_id(),
            pair: "BTC-USD".into(),
            maker_order_id: "m1".into(),
            taker_order_id: "t1".into(),
            price: Decimal::parse_str("100.00").unwrap(),
            qty: Decimal::parse_str("1.5").unwrap(),
            taker_side: Side::Sell,
            ts: 0,
            seq: 1,
        };
        let json = serde_json::to_string(&trade).unwrap();
        assert!(json.contains("\"price\":\"100.00\""));
        assert!(json.contains("\"qty\":\"1.5\""));
    }
}
