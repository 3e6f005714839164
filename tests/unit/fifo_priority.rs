//! S3 — FIFO priority: among resting orders at the same price, the
//! earliest-accepted order trades first (SPEC_FULL.md §8 property 7).

use matching_engine::config::{EngineConfig, PairConfig};
use matching_engine::decimal::Decimal;
use matching_engine::orderbook::sequencer::{EngineCommand, EventPayload};
use matching_engine::orderbook::{Book, Matcher, OrderKind, Side, TimeInForce};

fn pair_config() -> PairConfig {
    PairConfig::new("BTC-USD", "0.01", "0.0001", "0.0001", 2, 4).unwrap()
}

fn submit(user_id: &str, side: Side, qty: &str, price: &str, tif: TimeInForce) -> EngineCommand {
    EngineCommand::Submit {
        pair: "BTC-USD".into(),
        user_id: user_id.into(),
        side,
        kind: OrderKind::Limit,
        qty: Decimal::parse_with_scale(qty, 4).unwrap(),
        limit_price: Some(Decimal::parse_with_scale(price, 2).unwrap()),
        stop_price: None,
        time_in_force: tif,
        expires_at: None,
        client_order_id: None,
    }
}

#[test]
fn earlier_accepted_order_at_the_same_price_trades_first() {
    let matcher = Matcher::new(Book::new(pair_config()), EngineConfig::default());

    let accepted_a = matcher.handle(submit("userA", Side::Buy, "1", "100.00", TimeInForce::Gtc), 1);
    let order_a = accepted_a
        .iter()
        .find_map(|e| match &e.payload {
            EventPayload::OrderAccepted { order_id, .. } => Some(order_id.clone()),
            _ => None,
        })
        .unwrap();

    matcher.handle(submit("userC", Side::Buy, "1", "100.00", TimeInForce::Gtc), 2);

    let crossing = matcher.handle(submit("userB", Side::Sell, "1", "100.00", TimeInForce::Gtc), 3);

    let trade_maker = crossing
        .iter()
        .find_map(|e| match &e.payload {
            EventPayload::Trade { maker_order_id, .. } => Some(maker_order_id.clone()),
            _ => None,
        })
        .unwrap();

    assert_eq!(trade_maker, order_a, "the earlier-accepted order must be the maker");
    assert_eq!(matcher.book.best_bid().unwrap().to_canonical_string(), "100.00");
    let remaining: Vec<_> = matcher.book.all_resting_orders();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].user_id, "userC");
}
