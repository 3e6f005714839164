//! Per-pair composite book state.
//!
//! A closed component set: bid ladder, ask ladder, stop index, last trade
//! price, and sequence counter, indexed by `bids`/`asks` `SkipMap`s and an
//! `order_locations: DashMap<Id, (u128, Side)>`. No analytics surface
//! (`vwap`, `micro_price`, `market_impact`, `order_book_imbalance`,
//! depth/queue-position helpers) lives here; fee schedule and special-order
//! repricing are out of scope, and lifecycle notification goes through the
//! typed event bus instead of direct listener callbacks.

use crate::config::PairConfig;
use crate::decimal::Decimal;
use crate::orderbook::error::EngineError;
use crate::orderbook::ladder::{Ladder, LadderSide, PriceLevel};
use crate::orderbook::order::{Order, OrderState, Side, TimeInForce};
use crate::orderbook::stop_index::StopIndex;
use crossbeam::atomic::AtomicCell;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Where a tracked order currently lives, so it can be found and removed
/// in O(log L) without scanning every level.
#[derive(Debug, Clone, Copy)]
enum OrderLocation {
    /// Resting in a ladder at `price`.
    Resting { side: Side, price: Decimal },
    /// Pending in the stop index, keyed by `stop_price`.
    PendingTrigger { side: Side, stop_price: Decimal },
}

/// Per-pair book: bid ladder, ask ladder, stop index, last trade price,
/// and the monotone sequence counter that stamps every accepted order and
/// emitted event for this pair.
pub struct Book {
    /// The trading pair this book tracks.
    pub pair: String,
    pub(crate) bids: Ladder,
    pub(crate) asks: Ladder,
    pub(crate) stops: StopIndex,
    order_locations: DashMap<String, OrderLocation>,
    seq: AtomicU64,
    last_trade_price: AtomicCell<Option<Decimal>>,
    /// Per-pair trading parameters (tick/lot size, scales).
    pub config: PairConfig,
}

impl Book {
    /// An empty book for the given pair configuration.
    pub fn new(config: PairConfig) -> Self {
        Self {
            pair: config.pair.clone(),
            bids: Ladder::new(LadderSide::Bid),
            asks: Ladder::new(LadderSide::Ask),
            stops: StopIndex::new(),
            order_locations: DashMap::new(),
            seq: AtomicU64::new(0),
            last_trade_price: AtomicCell::new(None),
            config,
        }
    }

    /// Allocate the next per-pair sequence number. Strictly increasing and
    /// contiguous: every accepted order and every emitted event for this
    /// pair consumes exactly one.
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// The current sequence counter value without advancing it.
    pub fn current_seq(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }

    /// The ladder for `side`.
    pub fn ladder(&self, side: Side) -> &Ladder {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    /// The ladder a taker of `side` crosses against (the opposite side's
    /// ladder).
    pub fn opposing_ladder(&self, side: Side) -> &Ladder {
        self.ladder(side.opposite())
    }

    /// Best bid price, if any resting buy orders exist.
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.best().map(|l| l.price())
    }

    /// Best ask price, if any resting sell orders exist.
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.best().map(|l| l.price())
    }

    /// The price of the most recent trade for this pair, if any.
    pub fn last_trade_price(&self) -> Option<Decimal> {
        self.last_trade_price.load()
    }

    /// Record that a trade occurred at `price`: updates `last_trade_price`
    /// and drains every stop order this price now triggers.
    pub fn record_trade(&self, price: Decimal) -> Vec<Order> {
        self.last_trade_price.store(Some(price));
        let triggered = self.stops.drain_triggered(price);
        for order in &triggered {
            self.order_locations.remove(&order.order_id);
        }
        triggered
    }

    /// Insert an order into its ladder and index its location.
    pub fn insert_resting(&self, order: Order) {
        let side = order.side;
        let price = order
            .limit_price
            .expect("only priced orders may rest in the ladder");
        self.order_locations
            .insert(order.order_id.clone(), OrderLocation::Resting { side, price });
        self.ladder(side).insert(order);
    }

    /// File a STOP/STOP_LIMIT order into the stop index and index its
    /// location.
    pub fn insert_pending_trigger(&self, order: Order) {
        let side = order.side;
        let stop_price = order
            .stop_price
            .expect("stop order must carry a stop_price");
        self.order_locations.insert(
            order.order_id.clone(),
            OrderLocation::PendingTrigger { side, stop_price },
        );
        self.stops.insert(order);
    }

    /// Clone the current state of a tracked order, wherever it lives.
    pub fn get_order(&self, order_id: &str) -> Option<Order> {
        match *self.order_locations.get(order_id)?.value() {
            OrderLocation::Resting { side, price } => self
                .level_at(side, price)
                .and_then(|level| level.get(order_id)),
            OrderLocation::PendingTrigger { side, stop_price } => {
                self.stops.get(side, stop_price, order_id)
            }
        }
    }

    fn level_at(&self, side: Side, price: Decimal) -> Option<Arc<PriceLevel>> {
        self.ladder(side).level_at(price)
    }

    /// Remove a tracked order from wherever it lives (ladder or stop
    /// index), returning it. Used by Cancel and by full-fill cleanup.
    pub fn remove_order(&self, order_id: &str) -> Option<Order> {
        let (_, location) = self.order_locations.remove(order_id)?;
        match location {
            OrderLocation::Resting { side, price } => self.ladder(side).remove(price, order_id),
            OrderLocation::PendingTrigger { side, stop_price } => {
                self.stops.remove(side, stop_price, order_id)
            }
        }
    }

    /// Apply a partial fill of `qty` to a resting order at `price`/`side`,
    /// keeping the order's location index unchanged (it is still resting).
    pub fn apply_fill_to_resting(
        &self,
        side: Side,
        price: Decimal,
        order_id: &str,
        qty: Decimal,
    ) -> Result<(), EngineError> {
        let level = self
            .level_at(side, price)
            .ok_or_else(|| EngineError::InvariantViolation {
                detail: format!("price level {price} missing for resting order {order_id}"),
            })?;
        match level.apply_fill(order_id, qty) {
            Some(Ok(())) => Ok(()),
            Some(Err(err)) => Err(err.into()),
            None => Err(EngineError::InvariantViolation {
                detail: format!("resting order {order_id} missing from its price level"),
            }),
        }
    }

    /// `true` if neither ladder nor the stop index has any orders left.
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty() && self.stops.is_empty()
    }

    /// Clone of every resting order across both ladders, in no particular
    /// order. Used by GTD expiry scans and checkpointing; not on the
    /// matching hot path.
    pub fn all_resting_orders(&self) -> Vec<Order> {
        self.bids
            .iterate_from_best()
            .chain(self.asks.iterate_from_best())
            .flat_map(|level| level.orders_fifo())
            .collect()
    }

    /// Every GTD order (resting or pending-trigger) whose `expires_at` is
    /// at or before `now`, removed from wherever it lives (ladder or stop
    /// index). The matcher converts each to an `OrderExpired` event.
    pub fn collect_expired(&self, now: u64) -> Vec<Order> {
        let mut due: Vec<Order> = self
            .all_resting_orders()
            .into_iter()
            .chain(self.stops.all_orders())
            .filter(|o| o.time_in_force == TimeInForce::Gtd)
            .filter(|o| o.expires_at.is_some_and(|at| at <= now))
            .collect();
        for order in &mut due {
            self.remove_order(&order.order_id);
            order.state = OrderState::Expired;
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::order::{OrderKind, OrderState, TimeInForce};

    fn config() -> PairConfig {
        PairConfig::new("BTC-USD", "0.01", "0.0001", "0.0001", 2, 4).unwrap()
    }

    fn limit_order(id: &str, side: Side, price: &str, qty: &str, seq: u64) -> Order {
        Order {
            order_id: id.to_string(),
            pair: "BTC-USD".into(),
            user_id: "u1".into(),
            side,
            kind: OrderKind::Limit,
            limit_price: Some(Decimal::parse_with_scale(price, 2).unwrap()),
            stop_price: None,
            time_in_force: TimeInForce::Gtc,
            expires_at: None,
            original_qty: Decimal::parse_with_scale(qty, 4).unwrap(),
            remaining_qty: Decimal::parse_with_scale(qty, 4).unwrap(),
            accepted_seq: seq,
            client_order_id: None,
            state: OrderState::Open,
        }
    }

    #[test]
    fn insert_and_best_bid_ask() {
        let book = Book::new(config());
        book.insert_resting(limit_order("a", Side::Buy, "100.00", "1", 1));
        book.insert_resting(limit_order("b", Side::Sell, "101.00", "1", 2));
        assert_eq!(book.best_bid().unwrap().to_canonical_string(), "100.00");
        assert_eq!(book.best_ask().unwrap().to_canonical_string(), "101.00");
    }

    #[test]
    fn remove_order_cleans_up_location_index() {
        let book = Book::new(config());
        book.insert_resting(limit_order("a", Side::Buy, "100.00", "1", 1));
        let removed = book.remove_order("a");
        assert!(removed.is_some());
        assert!(book.get_order("a").is_none());
        assert!(book.is_empty());
    }

    #[test]
    fn sequence_numbers_are_monotone_and_contiguous() {
        let book = Book::new(config());
        assert_eq!(book.next_seq(), 1);
        assert_eq!(book.next_seq(), 2);
        assert_eq!(book.current_seq(), 2);
    }

    #[test]
    fn recording_a_trade_updates_last_trade_price() {
        let book = Book::new(config());
        assert!(book.last_trade_price().is_none());
        book.record_trade(Decimal::parse_with_scale("100.00", 2).unwrap());
        assert_eq!(
            book.last_trade_price().unwrap().to_canonical_string(),
            "100.00"
        );
    }

    #[test]
    fn apply_fill_to_resting_updates_order_and_level() {
        let book = Book::new(config());
        book.insert_resting(limit_order("a", Side::Buy, "100.00", "2", 1));
        book.apply_fill_to_resting(
            Side::Buy,
            Decimal::parse_with_scale("100.00", 2).unwrap(),
            "a",
            Decimal::parse_with_scale("0.5", 4).unwrap(),
        )
        .unwrap();
        let order = book.get_order("a").unwrap();
        assert_eq!(order.remaining_qty.to_canonical_string(), "1.5000");
        assert_eq!(order.state, OrderState::Partial);
    }
}
