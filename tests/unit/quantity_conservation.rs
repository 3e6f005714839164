//! Quantity conservation: for every order the engine has ever accepted,
//! `original_qty == remaining_qty + sum(trade.qty for trades against it)`
//! must hold after any sequence of submits (SPEC_FULL.md §8 invariant 4).

use matching_engine::config::{EngineConfig, PairConfig};
use matching_engine::decimal::Decimal;
use matching_engine::orderbook::sequencer::{EngineCommand, EventPayload};
use matching_engine::orderbook::{Book, Matcher, OrderKind, Side, TimeInForce};
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::HashMap;

fn pair_config() -> PairConfig {
    PairConfig::new("BTC-USD", "0.01", "0.0001", "0.0001", 2, 4).unwrap()
}

#[derive(Debug, Clone)]
struct Intent {
    user_id: String,
    side: Side,
    price_ticks: i64,
    qty_lots: i64,
}

impl Intent {
    fn qty(&self) -> Decimal {
        Decimal::parse_with_scale(&format!("{}", self.qty_lots), 4).unwrap()
    }
}

fn intent_strategy() -> impl Strategy<Value = Intent> {
    (
        prop_oneof![Just("userA"), Just("userB"), Just("userC")],
        prop_oneof![Just(Side::Buy), Just(Side::Sell)],
        1i64..=20,
        1i64..=50,
    )
        .prop_map(|(user_id, side, price_ticks, qty_lots)| Intent {
            user_id: user_id.to_string(),
            side,
            price_ticks,
            qty_lots,
        })
}

fn submit(intent: &Intent) -> EngineCommand {
    EngineCommand::Submit {
        pair: "BTC-USD".into(),
        user_id: intent.user_id.clone(),
        side: intent.side,
        kind: OrderKind::Limit,
        qty: intent.qty(),
        limit_price: Some(Decimal::parse_with_scale(&format!("{}.00", intent.price_ticks), 2).unwrap()),
        stop_price: None,
        time_in_force: TimeInForce::Gtc,
        expires_at: None,
        client_order_id: None,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn original_qty_equals_remaining_plus_traded(intents in vec(intent_strategy(), 1..40)) {
        let matcher = Matcher::new(Book::new(pair_config()), EngineConfig::default());

        let mut original_qty: HashMap<String, Decimal> = HashMap::new();
        let mut traded_qty: HashMap<String, Decimal> = HashMap::new();

        for (seq, intent) in intents.iter().enumerate() {
            let events = matcher.handle(submit(intent), seq as u64 + 1);

            for event in &events {
                match &event.payload {
                    EventPayload::OrderAccepted { order_id, .. } => {
                        original_qty.insert(order_id.clone(), intent.qty());
                        traded_qty.insert(order_id.clone(), Decimal::zero(4));
                    }
                    EventPayload::Trade {
                        maker_order_id,
                        taker_order_id,
                        qty,
                        ..
                    } => {
                        for id in [maker_order_id, taker_order_id] {
                            let prior = traded_qty.get(id).copied().unwrap_or_else(|| Decimal::zero(4));
                            traded_qty.insert(id.clone(), prior.checked_add(qty).unwrap());
                        }
                    }
                    _ => {}
                }
            }
        }

        for (order_id, original) in &original_qty {
            let traded = traded_qty.get(order_id).copied().unwrap_or_else(|| Decimal::zero(4));
            let remaining = matcher
                .book
                .get_order(order_id)
                .map(|o| o.remaining_qty)
                .unwrap_or_else(|| Decimal::zero(4));
            let accounted = remaining.checked_add(&traded).unwrap();
            prop_assert_eq!(
                original.to_canonical_string(),
                accounted.to_canonical_string(),
                "order {} lost or gained quantity: original={} remaining={} traded={}",
                order_id,
                original,
                remaining,
                traded
            );
        }
    }
}
