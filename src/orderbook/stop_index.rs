//! Stop-order index.
//!
//! Holds STOP and STOP_LIMIT orders that are dormant until
//! `last_trade_price` crosses their `stop_price`. Uses the same
//! `crossbeam_skiplist::SkipMap` pattern as [`crate::orderbook::ladder`]:
//! two ordered indices, one per trigger direction, so a trade only has to
//! walk the triggered prefix rather than scan every pending stop.

use crate::decimal::Decimal;
use crate::orderbook::order::{Order, Side};
use crossbeam_skiplist::SkipMap;

/// Buy-stops trigger when the last trade price rises to meet them, so they
/// are indexed ascending and drained from the front. Sell-stops trigger
/// when price falls to meet them, so they are indexed descending (stored
/// as negated keys) and likewise drained from the front.
pub struct StopIndex {
    buy_stops: SkipMap<i128, Vec<Order>>,
    sell_stops: SkipMap<i128, Vec<Order>>,
}

impl StopIndex {
    /// An empty stop index.
    pub fn new() -> Self {
        Self {
            buy_stops: SkipMap::new(),
            sell_stops: SkipMap::new(),
        }
    }

    /// `true` if no stop orders are pending.
    pub fn is_empty(&self) -> bool {
        self.buy_stops.is_empty() && self.sell_stops.is_empty()
    }

    /// Total number of pending stop orders across both sides.
    pub fn len(&self) -> usize {
        self.buy_stops.iter().map(|e| e.value().len()).sum::<usize>()
            + self.sell_stops.iter().map(|e| e.value().len()).sum::<usize>()
    }

    /// Clone of every pending stop order, used by GTD expiry scans and
    /// checkpointing; not on the matching hot path.
    pub fn all_orders(&self) -> Vec<Order> {
        self.buy_stops
            .iter()
            .flat_map(|e| e.value().clone())
            .chain(self.sell_stops.iter().flat_map(|e| e.value().clone()))
            .collect()
    }

    /// File a stop order into the index, keyed by `stop_price` and grouped
    /// with any other orders already pending at that exact price
    /// (preserving acceptance order within the group).
    pub fn insert(&self, order: Order) {
        let key = order.stop_price.expect("stop order must carry a stop_price").units();
        let map = match order.side {
            Side::Buy => &self.buy_stops,
            Side::Sell => &self.sell_stops,
        };
        if map.get(&key).is_none() {
            map.insert(key, Vec::new());
        }
        if let Some(entry) = map.get(&key) {
            // SkipMap values aren't interior-mutable; re-insert with the
            // order appended. Single-writer access makes this race-free.
            let mut orders = entry.value().clone();
            orders.push(order);
            map.insert(key, orders);
        }
    }

    /// Clone the pending stop order with the given id and side, if present,
    /// without removing it.
    pub fn get(&self, side: Side, stop_price: Decimal, order_id: &str) -> Option<Order> {
        let key = stop_price.units();
        let map = match side {
            Side::Buy => &self.buy_stops,
            Side::Sell => &self.sell_stops,
        };
        map.get(&key)?
            .value()
            .iter()
            .find(|o| o.order_id == order_id)
            .cloned()
    }

    /// Remove a specific pending stop order by id and side, returning it if
    /// found.
    pub fn remove(&self, side: Side, stop_price: Decimal, order_id: &str) -> Option<Order> {
        let key = stop_price.units();
        let map = match side {
            Side::Buy => &self.buy_stops,
            Side::Sell => &self.sell_stops,
        };
        let entry = map.get(&key)?;
        let mut orders = entry.value().clone();
        let idx = orders.iter().position(|o| o.order_id == order_id)?;
        let removed = orders.remove(idx);
        if orders.is_empty() {
            entry.remove();
        } else {
            map.insert(key, orders);
        }
        Some(removed)
    }

    /// Drain every stop order triggered by a last trade price of
    /// `last_trade_price`, in trigger-priority order (nearest-to-trigger
    /// first, acceptance order within a price group).
    ///
    /// - Buy-stops trigger when `last_trade_price >= stop_price`.
    /// - Sell-stops trigger when `last_trade_price <= stop_price`.
    pub fn drain_triggered(&self, last_trade_price: Decimal) -> Vec<Order> {
        let mut triggered = Vec::new();
        let key = last_trade_price.units();

        loop {
            let Some(entry) = self.buy_stops.front() else {
                break;
            };
            if *entry.key() > key {
                break;
            }
            triggered.extend(entry.value().clone());
            entry.remove();
        }

        loop {
            let Some(entry) = self.sell_stops.back() else {
                break;
            };
            if *entry.key() < key {
                break;
            }
            triggered.extend(entry.value().clone());
            entry.remove();
        }

        triggered
    }
}

impl Default for StopIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::order::{OrderKind, OrderState, TimeInForce};

    fn stop_order(id: &str, side: Side, stop_price: &str, seq: u64) -> Order {
        Order {
            order_id: id.to_string(),
            pair: "BTC-USD".into(),
            user_id: "u1".into(),
            side,
            kind: OrderKind::Stop,
            limit_price: None,
            stop_price: Some(Decimal::parse_str(stop_price).unwrap()),
            time_in_force: TimeInForce::Gtc,
            expires_at: None,
            original_qty: Decimal::parse_str("1").unwrap(),
            remaining_qty: Decimal::parse_str("1").unwrap(),
            accepted_seq: seq,
            client_order_id: None,
            state: OrderState::PendingTrigger,
        }
    }

    #[test]
    fn buy_stop_triggers_when_price_rises_to_meet_it() {
        let idx = StopIndex::new();
        idx.insert(stop_order("a", Side::Buy, "100", 1));
        assert!(idx.drain_triggered(Decimal::parse_str("99").unwrap()).is_empty());
        let triggered = idx.drain_triggered(Decimal::parse_str("100").unwrap());
        assert_eq!(triggered.len(), 1);
        assert!(idx.is_empty());
    }

    #[test]
    fn sell_stop_triggers_when_price_falls_to_meet_it() {
        let idx = StopIndex::new();
        idx.insert(stop_order("a", Side::Sell, "100", 1));
        assert!(idx.drain_triggered(Decimal::parse_str("101").unwrap()).is_empty());
        let triggered = idx.drain_triggered(Decimal::parse_str("100").unwrap());
        assert_eq!(triggered.len(), 1);
        assert!(idx.is_empty());
    }

    #[test]
    fn acceptance_order_preserved_within_a_price_group() {
        let idx = StopIndex::new();
        idx.insert(stop_order("a", Side::Buy, "100", 1));
        idx.insert(stop_order("b", Side::Buy, "100", 2));
        let triggered = idx.drain_triggered(Decimal::parse_str("100").unwrap());
        assert_eq!(triggered[0].order_id, "a");
        assert_eq!(triggered[1].order_id, "b");
    }

    #[test]
    fn remove_before_trigger() {
        let idx = StopIndex::new();
        idx.insert(stop_order("a", Side::Buy, "100", 1));
        let removed = idx.remove(Side::Buy, Decimal::parse_str("100").unwrap(), "a");
        assert!(removed.is_some());
        assert!(idx.is_empty());
        assert!(idx.drain_triggered(Decimal::parse_str("100").unwrap()).is_empty());
    }

    #[test]
    fn drain_only_takes_prices_crossed_so_far() {
        let idx = StopIndex::new();
        idx.insert(stop_order("a", Side::Buy, "100", 1));
        idx.insert(stop_order("b", Side::Buy, "105", 2));
        let triggered = idx.drain_triggered(Decimal::parse_str("102").unwrap());
        assert_eq!(triggered.len(), 1);
        assert_eq!(triggered[0].order_id, "a");
        assert_eq!(idx.len(), 1);
    }
}
