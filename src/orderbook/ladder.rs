//! Price ladder: per-side ordered collection of price levels, each a FIFO
//! of resting orders.
//!
//! A `crossbeam_skiplist::SkipMap<u128, Arc<PriceLevel>>` is the ladder
//! representation, with the `u128` key holding a pair's scaled `Decimal`
//! units rather than a raw tick — exact and order-preserving for a fixed
//! per-pair scale. Within a level, a lazy-tombstone `DashMap`-indexed FIFO
//! gives O(1) lookup/removal by id alongside an ordered queue of ids for
//! FIFO walk order.

use crate::decimal::Decimal;
use crate::orderbook::order::Order;
use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A single price level: the resting orders at one exact price, in
/// acceptance (FIFO) order.
pub struct PriceLevel {
    price: Decimal,
    queue: Mutex<VecDeque<String>>,
    orders: DashMap<String, Order>,
    total_qty: Mutex<Decimal>,
}

impl PriceLevel {
    fn new(price: Decimal) -> Self {
        Self {
            price,
            queue: Mutex::new(VecDeque::new()),
            orders: DashMap::new(),
            total_qty: Mutex::new(Decimal::zero(price.scale())),
        }
    }

    /// The level's price.
    pub fn price(&self) -> Decimal {
        self.price
    }

    /// Number of live (non-tombstoned) resting orders.
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// `true` once every order at this level has been filled or removed.
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Aggregate remaining quantity across all live orders.
    pub fn total_qty(&self) -> Decimal {
        *self.total_qty.lock().expect("price level mutex poisoned")
    }

    fn push(&self, order: Order) {
        let qty = order.remaining_qty;
        let id = order.order_id.clone();
        self.orders.insert(id.clone(), order);
        self.queue
            .lock()
            .expect("price level mutex poisoned")
            .push_back(id);
        let mut total = self.total_qty.lock().expect("price level mutex poisoned");
        *total = total
            .checked_add(&qty)
            .expect("resting quantity overflowed the pair's decimal scale");
    }

    /// Peek the next live order id in FIFO order, compacting tombstones
    /// (ids of already-removed orders) from the queue head as it goes.
    pub fn peek_front(&self) -> Option<String> {
        let mut queue = self.queue.lock().expect("price level mutex poisoned");
        while let Some(id) = queue.front().cloned() {
            if self.orders.contains_key(&id) {
                return Some(id);
            }
            queue.pop_front();
        }
        None
    }

    /// Run `f` against the live order with the given id, if present.
    pub fn with_order_mut<R>(&self, order_id: &str, f: impl FnOnce(&mut Order) -> R) -> Option<R> {
        self.orders.get_mut(order_id).map(|mut entry| f(entry.value_mut()))
    }

    /// Clone the live order with the given id, if present, without removing
    /// it.
    pub fn get(&self, order_id: &str) -> Option<Order> {
        self.orders.get(order_id).map(|e| e.value().clone())
    }

    /// Fully remove an order (filled or cancelled), updating the aggregate.
    pub fn remove(&self, order_id: &str) -> Option<Order> {
        let (_, order) = self.orders.remove(order_id)?;
        let mut total = self.total_qty.lock().expect("price level mutex poisoned");
        *total = total.checked_sub(&order.remaining_qty).unwrap_or(*total);
        Some(order)
    }

    /// Record a partial fill of `qty` against a resting order: decrements
    /// both the order's `remaining_qty` and the level's aggregate.
    pub fn apply_fill(
        &self,
        order_id: &str,
        qty: Decimal,
    ) -> Option<Result<(), crate::decimal::DecimalError>> {
        let result = self.with_order_mut(order_id, |order| order.apply_fill(qty))?;
        if result.is_ok() {
            let mut total = self.total_qty.lock().expect("price level mutex poisoned");
            *total = total.checked_sub(&qty).unwrap_or(*total);
        }
        Some(result)
    }

    /// Snapshot a clone of every live order at this level, in FIFO order
    /// (used by checkpointing; not on the matching hot path).
    pub fn orders_fifo(&self) -> Vec<Order> {
        let queue = self.queue.lock().expect("price level mutex poisoned");
        queue
            .iter()
            .filter_map(|id| self.orders.get(id).map(|e| e.value().clone()))
            .collect()
    }
}

/// Which side of the book a [`Ladder`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LadderSide {
    /// Bids: best = highest price.
    Bid,
    /// Asks: best = lowest price.
    Ask,
}

/// A side of the book: an ordered collection of [`PriceLevel`]s keyed by
/// price, with no two levels sharing a price and empty levels removed
/// eagerly.
pub struct Ladder {
    side: LadderSide,
    levels: SkipMap<i128, Arc<PriceLevel>>,
}

impl Ladder {
    /// An empty ladder for the given side.
    pub fn new(side: LadderSide) -> Self {
        Self {
            side,
            levels: SkipMap::new(),
        }
    }

    /// `true` if no price levels remain.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Number of distinct price levels.
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Append `order` to the FIFO at `order.limit_price`, creating the
    /// level if absent.
    ///
    /// # Panics
    /// Panics if `order.limit_price` is `None` — only LIMIT orders (or
    /// triggered STOP_LIMIT orders, which carry a limit price) may rest.
    pub fn insert(&self, order: Order) {
        let price = order
            .limit_price
            .expect("only priced orders may rest in the ladder");
        let key = price.units();
        if self.levels.get(&key).is_none() {
            self.levels.insert(key, Arc::new(PriceLevel::new(price)));
        }
        if let Some(entry) = self.levels.get(&key) {
            entry.value().push(order);
        }
    }

    /// Remove a specific order from its level by identity, dropping the
    /// level if it becomes empty.
    pub fn remove(&self, price: Decimal, order_id: &str) -> Option<Order> {
        let key = price.units();
        let entry = self.levels.get(&key)?;
        let level = entry.value().clone();
        let removed = level.remove(order_id);
        if level.is_empty() {
            entry.remove();
        }
        removed
    }

    /// Look up the level at an exact price, if one exists.
    pub fn level_at(&self, price: Decimal) -> Option<Arc<PriceLevel>> {
        self.levels.get(&price.units()).map(|e| e.value().clone())
    }

    /// The best level (highest bid / lowest ask), if any.
    pub fn best(&self) -> Option<Arc<PriceLevel>> {
        match self.side {
            LadderSide::Bid => self.levels.back().map(|e| e.value().clone()),
            LadderSide::Ask => self.levels.front().map(|e| e.value().clone()),
        }
    }

    /// Remove the given level entirely if it is present and empty (used
    /// after a cross-loop drains every order at the best level).
    pub fn drop_if_empty(&self, price: Decimal) {
        let key = price.units();
        if let Some(entry) = self.levels.get(&key)
            && entry.value().is_empty()
        {
            entry.remove();
        }
    }

    /// Lazy, best-first traversal of levels.
    pub fn iterate_from_best(&self) -> BestFirstIter<'_> {
        let current = match self.side {
            LadderSide::Bid => self.levels.back(),
            LadderSide::Ask => self.levels.front(),
        };
        BestFirstIter {
            current,
            descending: matches!(self.side, LadderSide::Bid),
        }
    }
}

/// Lazy best-first iterator over a [`Ladder`]'s price levels.
pub struct BestFirstIter<'a> {
    current: Option<crossbeam_skiplist::map::Entry<'a, i128, Arc<PriceLevel>>>,
    descending: bool,
}

impl Iterator for BestFirstIter<'_> {
    type Item = Arc<PriceLevel>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.current.take()?;
        let value = entry.value().clone();
        self.current = if self.descending {
            entry.prev()
        } else {
            entry.next()
        };
        Some(value)
    }
}
