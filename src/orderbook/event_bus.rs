//! Typed, per-pair, strictly-ordered event publication.
//!
//! A single synchronous callback cannot fan out to an arbitrary number of
//! subscribers without blocking the matcher, so publication here is a
//! `tokio::sync::broadcast` channel per pair (lagging subscribers drop old
//! events rather than stall the writer) with an optional `async-nats`
//! bridge behind the `nats` feature.

use crate::orderbook::sequencer::EngineEvent;
use dashmap::DashMap;
use tokio::sync::broadcast;

/// Per-pair fan-out of the matcher's event stream. One broadcast channel
/// per registered pair; every event published to it keeps the `seq`
/// ordering the matcher assigned — this type never reorders or drops
/// events on the write side, only slow readers can lag.
pub struct EventBus {
    channels: DashMap<String, broadcast::Sender<EngineEvent>>,
    capacity: usize,
    #[cfg(feature = "nats")]
    nats: Option<async_nats::Client>,
}

impl EventBus {
    /// A bus with no pairs registered yet. `capacity` bounds each pair's
    /// broadcast channel (the number of events a lagging subscriber may
    /// fall behind before it starts missing them).
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity,
            #[cfg(feature = "nats")]
            nats: None,
        }
    }

    /// Also publish every event to NATS, on subject
    /// `matching-engine.<pair>.events`, JSON-encoded.
    #[cfg(feature = "nats")]
    pub fn with_nats(mut self, client: async_nats::Client) -> Self {
        self.nats = Some(client);
        self
    }

    /// Open this pair's channel if it doesn't already exist. Idempotent.
    pub fn register_pair(&self, pair: &str) {
        self.channels
            .entry(pair.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
    }

    /// Subscribe to a registered pair's event stream. `None` if the pair
    /// has not been registered.
    pub fn subscribe(&self, pair: &str) -> Option<broadcast::Receiver<EngineEvent>> {
        self.channels.get(pair).map(|sender| sender.subscribe())
    }

    /// Publish one event. A no-op (aside from the optional NATS bridge)
    /// if nobody has subscribed — `broadcast::Sender::send` only fails
    /// when there are zero receivers, which is an expected idle state,
    /// not an error worth surfacing.
    pub fn publish(&self, event: EngineEvent) {
        if let Some(sender) = self.channels.get(&event.pair) {
            let _ = sender.send(event.clone());
        }
        #[cfg(feature = "nats")]
        self.publish_nats(event);
    }

    #[cfg(feature = "nats")]
    fn publish_nats(&self, event: EngineEvent) {
        let Some(client) = self.nats.clone() else {
            return;
        };
        let Ok(payload) = serde_json::to_vec(&event) else {
            return;
        };
        let subject = format!("matching-engine.{}.events", event.pair);
        tokio::spawn(async move {
            let _ = client.publish(subject, payload.into()).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::sequencer::EventPayload;

    fn event(pair: &str, seq: u64) -> EngineEvent {
        EngineEvent {
            pair: pair.to_string(),
            seq,
            ts: 0,
            payload: EventPayload::PairClosed,
        }
    }

    #[test]
    fn subscribe_before_register_returns_none() {
        let bus = EventBus::new(16);
        assert!(bus.subscribe("BTC-USD").is_none());
    }

    #[tokio::test]
    async fn published_events_preserve_sequence_order() {
        let bus = EventBus::new(16);
        bus.register_pair("BTC-USD");
        let mut rx = bus.subscribe("BTC-USD").unwrap();
        bus.publish(event("BTC-USD", 1));
        bus.publish(event("BTC-USD", 2));
        assert_eq!(rx.recv().await.unwrap().seq, 1);
        assert_eq!(rx.recv().await.unwrap().seq, 2);
    }

    #[tokio::test]
    async fn events_for_other_pairs_are_not_delivered() {
        let bus = EventBus::new(16);
        bus.register_pair("BTC-USD");
        bus.register_pair("ETH-USD");
        let mut btc_rx = bus.subscribe("BTC-USD").unwrap();
        bus.publish(event("ETH-USD", 1));
        bus.publish(event("BTC-USD", 1));
        assert_eq!(btc_rx.recv().await.unwrap().pair, "BTC-USD");
    }
}
