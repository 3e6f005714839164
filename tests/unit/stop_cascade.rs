//! S6 — stop cascade: a trade moves `last_trade_price` enough to trigger
//! a resting stop order, which is fed back in as a synthetic taker and may
//! itself fail to find liquidity (SPEC_FULL.md §4.F "Post-trade stop
//! cascade", §8 scenario S6).

use matching_engine::config::{EngineConfig, PairConfig};
use matching_engine::decimal::Decimal;
use matching_engine::orderbook::sequencer::{EngineCommand, EventPayload, ReasonCode};
use matching_engine::orderbook::{Book, Matcher, OrderKind, OrderState, Side, TimeInForce};

fn pair_config() -> PairConfig {
    PairConfig::new("BTC-USD", "0.01", "0.0001", "0.0001", 2, 4).unwrap()
}

#[allow(clippy::too_many_arguments)]
fn submit(
    user_id: &str,
    side: Side,
    kind: OrderKind,
    qty: &str,
    price: Option<&str>,
    stop: Option<&str>,
    tif: TimeInForce,
) -> EngineCommand {
    EngineCommand::Submit {
        pair: "BTC-USD".into(),
        user_id: user_id.into(),
        side,
        kind,
        qty: Decimal::parse_with_scale(qty, 4).unwrap(),
        limit_price: price.map(|p| Decimal::parse_with_scale(p, 2).unwrap()),
        stop_price: stop.map(|p| Decimal::parse_with_scale(p, 2).unwrap()),
        time_in_force: tif,
        expires_at: None,
        client_order_id: None,
    }
}

#[test]
fn a_trade_triggers_a_resting_stop_which_then_finds_no_liquidity() {
    let matcher = Matcher::new(Book::new(pair_config()), EngineConfig::default());

    // Resting ask away from the action, establishing last_trade_price=102
    // via an initial cross, then a stop sell triggered at 100.
    matcher.handle(
        submit("userA", Side::Buy, OrderKind::Limit, "1", Some("102.00"), None, TimeInForce::Gtc),
        1,
    );
    matcher.handle(
        submit("userB", Side::Sell, OrderKind::Limit, "1", Some("102.00"), None, TimeInForce::Gtc),
        2,
    );
    assert_eq!(matcher.book.last_trade_price().unwrap().to_canonical_string(), "102.00");

    let stop_events = matcher.handle(
        submit("userX", Side::Sell, OrderKind::Stop, "1", None, Some("100.00"), TimeInForce::Gtc),
        3,
    );
    assert!(stop_events.iter().any(|e| matches!(
        e.payload,
        EventPayload::OrderAccepted { initial_state: OrderState::PendingTrigger, .. }
    )));

    // A GTC sell resting at 99 with no bids present does not cross and
    // does not move last_trade_price, so the stop does not fire yet.
    matcher.handle(
        submit("userC", Side::Sell, OrderKind::Limit, "1", Some("99.00"), None, TimeInForce::Gtc),
        4,
    );
    assert_eq!(matcher.book.last_trade_price().unwrap().to_canonical_string(), "102.00");

    // Now a buy at 99 crosses, moves last_trade_price to 99, and triggers
    // the stop; the resulting synthetic MARKET SELL finds no bids left
    // and is cancelled for lack of liquidity.
    let cascade_events = matcher.handle(
        submit("userD", Side::Buy, OrderKind::Limit, "1", Some("99.00"), None, TimeInForce::Gtc),
        5,
    );

    assert_eq!(matcher.book.last_trade_price().unwrap().to_canonical_string(), "99.00");
    assert!(cascade_events.iter().any(|e| matches!(
        &e.payload,
        EventPayload::OrderCancelled { reason: ReasonCode::MarketNoLiquidity, .. }
    )));
    assert!(matcher.book.best_bid().is_none());
    assert!(matcher.book.best_ask().is_none());
}

#[test]
fn a_triggered_stop_limit_converts_to_a_resting_limit_order() {
    let matcher = Matcher::new(Book::new(pair_config()), EngineConfig::default());

    matcher.handle(
        submit("userA", Side::Sell, OrderKind::StopLimit, "1", Some("95.00"), Some("100.00"), TimeInForce::Gtc),
        1,
    );

    matcher.handle(
        submit("userB", Side::Buy, OrderKind::Limit, "1", Some("101.00"), None, TimeInForce::Gtc),
        2,
    );
    let cascade = matcher.handle(
        submit("userC", Side::Sell, OrderKind::Limit, "1", Some("101.00"), None, TimeInForce::Gtc),
        3,
    );
    assert_eq!(matcher.book.last_trade_price().unwrap().to_canonical_string(), "101.00");

    assert!(cascade.iter().any(|e| matches!(
        e.payload,
        EventPayload::OrderAccepted { initial_state: OrderState::Open, .. }
    )));
    // The converted STOP_LIMIT rests as an ordinary LIMIT sell at 95.00
    // since no bid crosses that low.
    assert_eq!(matcher.book.best_ask().unwrap().to_canonical_string(), "95.00");
}
