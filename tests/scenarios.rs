//! End-to-end scenarios driving a pair through its public `CommandRouter`/
//! `EventBus` surface, exactly as an external caller would.

use matching_engine::config::{EngineConfig, PairConfig};
use matching_engine::decimal::Decimal;
use matching_engine::orderbook::sequencer::{EngineCommand, EventPayload, ReasonCode};
use matching_engine::orderbook::{CommandRouter, EventBus, OrderKind, Side, StpPolicy, TimeInForce};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::Receiver;

fn pair_config() -> PairConfig {
    PairConfig::new("BTC-USD", "0.01", "0.0001", "0.0001", 2, 4).unwrap()
}

fn price(literal: &str) -> Decimal {
    Decimal::parse_with_scale(literal, 2).unwrap()
}

fn qty(literal: &str) -> Decimal {
    Decimal::parse_with_scale(literal, 4).unwrap()
}

fn router() -> (Arc<CommandRouter>, Arc<EventBus>) {
    let event_bus = Arc::new(EventBus::new(256));
    let mut config = EngineConfig::default();
    config.snapshot_interval_ms = 0;
    let router = Arc::new(CommandRouter::new(config, event_bus.clone()));
    router.register_pair(pair_config(), StpPolicy::default(), None);
    (router, event_bus)
}

#[allow(clippy::too_many_arguments)]
fn submit(
    router: &CommandRouter,
    user_id: &str,
    side: Side,
    kind: OrderKind,
    qty_literal: &str,
    limit_price: Option<&str>,
    time_in_force: TimeInForce,
) {
    router
        .submit(EngineCommand::Submit {
            pair: "BTC-USD".into(),
            user_id: user_id.into(),
            side,
            kind,
            qty: qty(qty_literal),
            limit_price: limit_price.map(price),
            stop_price: None,
            time_in_force,
            expires_at: None,
            client_order_id: None,
        })
        .unwrap();
}

async fn next(events: &mut Receiver<matching_engine::orderbook::sequencer::EngineEvent>) -> EventPayload {
    tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("matcher should publish within the timeout")
        .unwrap()
        .payload
}

/// S1 — Simple cross: two opposite limit orders at the same price fully
/// execute against each other.
#[tokio::test]
async fn simple_cross_fills_both_orders() {
    let (router, event_bus) = router();
    let mut events = event_bus.subscribe("BTC-USD").unwrap();

    submit(&router, "userA", Side::Buy, OrderKind::Limit, "1.0", Some("100.00"), TimeInForce::Gtc);
    assert!(matches!(next(&mut events).await, EventPayload::OrderAccepted { .. }));
    assert!(matches!(next(&mut events).await, EventPayload::OrderResting { .. }));

    submit(&router, "userB", Side::Sell, OrderKind::Limit, "1.0", Some("100.00"), TimeInForce::Gtc);
    assert!(matches!(next(&mut events).await, EventPayload::OrderAccepted { .. }));

    let trade = next(&mut events).await;
    match trade {
        EventPayload::Trade { price, qty, taker_side, .. } => {
            assert_eq!(price.to_canonical_string(), "100.00");
            assert_eq!(qty.to_canonical_string(), "1.0000");
            assert_eq!(taker_side, Side::Sell);
        }
        other => panic!("expected Trade, got {other:?}"),
    }
    assert!(matches!(next(&mut events).await, EventPayload::OrderFilled { .. }));
    assert!(matches!(next(&mut events).await, EventPayload::OrderFilled { .. }));
}

/// S2 — Partial fill rest: a smaller taker fills part of a larger resting
/// order, which remains on the book at PARTIAL.
#[tokio::test]
async fn partial_fill_leaves_maker_resting() {
    let (router, event_bus) = router();
    let mut events = event_bus.subscribe("BTC-USD").unwrap();

    submit(&router, "userA", Side::Buy, OrderKind::Limit, "2.0", Some("99.00"), TimeInForce::Gtc);
    next(&mut events).await;
    next(&mut events).await;

    submit(&router, "userB", Side::Sell, OrderKind::Limit, "1.0", Some("99.00"), TimeInForce::Gtc);
    next(&mut events).await;

    assert!(matches!(next(&mut events).await, EventPayload::Trade { .. }));
    match next(&mut events).await {
        EventPayload::OrderPartiallyFilled { remaining_qty, .. } => {
            assert_eq!(remaining_qty.to_canonical_string(), "1.0000");
        }
        other => panic!("expected OrderPartiallyFilled, got {other:?}"),
    }
    assert!(matches!(next(&mut events).await, EventPayload::OrderFilled { .. }));
}

/// S3 — FIFO priority: among two resting orders at the same price, the
/// earlier one trades first and the later one keeps its place in line.
#[tokio::test]
async fn fifo_priority_at_same_price() {
    let (router, event_bus) = router();
    let mut events = event_bus.subscribe("BTC-USD").unwrap();

    submit(&router, "userA", Side::Buy, OrderKind::Limit, "1.0", Some("100.00"), TimeInForce::Gtc);
    let first_accept = next(&mut events).await;
    let first_order_id = match first_accept {
        EventPayload::OrderAccepted { order_id, .. } => order_id,
        other => panic!("expected OrderAccepted, got {other:?}"),
    };
    next(&mut events).await; // OrderResting

    submit(&router, "userC", Side::Buy, OrderKind::Limit, "1.0", Some("100.00"), TimeInForce::Gtc);
    next(&mut events).await;
    next(&mut events).await;

    submit(&router, "userB", Side::Sell, OrderKind::Limit, "1.0", Some("100.00"), TimeInForce::Gtc);
    next(&mut events).await;

    match next(&mut events).await {
        EventPayload::Trade { maker_order_id, .. } => assert_eq!(maker_order_id, first_order_id),
        other => panic!("expected Trade, got {other:?}"),
    }
}

/// S4 — FOK reject: a fill-or-kill order that cannot be fully satisfied is
/// rejected outright, with no partial execution.
#[tokio::test]
async fn fok_rejects_when_not_fully_fillable() {
    let (router, event_bus) = router();
    let mut events = event_bus.subscribe("BTC-USD").unwrap();

    submit(&router, "userA", Side::Sell, OrderKind::Limit, "1.0", Some("100.00"), TimeInForce::Gtc);
    next(&mut events).await;
    next(&mut events).await;

    submit(&router, "userB", Side::Buy, OrderKind::Limit, "2.0", Some("100.00"), TimeInForce::Fok);
    match next(&mut events).await {
        EventPayload::OrderRejected { reason, .. } => assert_eq!(reason, ReasonCode::FillOrKill),
        other => panic!("expected OrderRejected(FillOrKill), got {other:?}"),
    }
}

/// S5 — IOC partial: an immediate-or-cancel taker fills what it can and
/// the remainder is cancelled rather than resting.
#[tokio::test]
async fn ioc_cancels_unfilled_remainder() {
    let (router, event_bus) = router();
    let mut events = event_bus.subscribe("BTC-USD").unwrap();

    submit(&router, "userA", Side::Sell, OrderKind::Limit, "1.0", Some("100.00"), TimeInForce::Gtc);
    next(&mut events).await;
    next(&mut events).await;

    submit(&router, "userB", Side::Buy, OrderKind::Limit, "2.0", Some("100.00"), TimeInForce::Ioc);
    next(&mut events).await; // OrderAccepted
    assert!(matches!(next(&mut events).await, EventPayload::Trade { .. }));
    assert!(matches!(next(&mut events).await, EventPayload::OrderFilled { .. })); // userA's maker filled

    match next(&mut events).await {
        EventPayload::OrderCancelled { reason, .. } => assert_eq!(reason, ReasonCode::IocRemainder),
        other => panic!("expected OrderCancelled(IocRemainder), got {other:?}"),
    }
}

/// S7 — Self-trade skip: the default policy never matches a user against
/// their own resting order; the incoming order simply rests alongside it.
#[tokio::test]
async fn self_trade_is_skipped_by_default() {
    let (router, event_bus) = router();
    let mut events = event_bus.subscribe("BTC-USD").unwrap();

    submit(&router, "userA", Side::Buy, OrderKind::Limit, "1.0", Some("100.00"), TimeInForce::Gtc);
    next(&mut events).await;
    next(&mut events).await;

    submit(&router, "userA", Side::Sell, OrderKind::Limit, "1.0", Some("100.00"), TimeInForce::Gtc);
    next(&mut events).await; // OrderAccepted
    match next(&mut events).await {
        EventPayload::OrderResting { side, price, .. } => {
            assert_eq!(side, Side::Sell);
            assert_eq!(price.to_canonical_string(), "100.00");
        }
        other => panic!("expected OrderResting (no self-trade), got {other:?}"),
    }
}

/// An unregistered pair fails fast with `UnknownPair` rather than hanging.
#[tokio::test]
async fn unknown_pair_is_rejected_up_front() {
    let (router, _event_bus) = router();
    let result = router.submit(EngineCommand::Cancel {
        pair: "ETH-USD".into(),
        order_id: "x".into(),
        user_id: "u1".into(),
    });
    assert!(result.is_err());
}
