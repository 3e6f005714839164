//! The matcher: single-writer command-processing loop for one pair.
//!
//! The cross-loop skeleton walks the book best-first over a `SkipMap`,
//! exits early on a price-limit miss, walks each level's FIFO queue, and
//! batch-cleans filled orders and emptied levels; self-trade handling
//! delegates to `orderbook::stp::check_stp_at_level`. Acceptance validation,
//! TIF post-processing (FOK pre-check, IOC remainder cancel, GTC/GTD
//! resting), and the stop cascade run in the same single-writer command
//! loop.
//!
//! A `Matcher` owns exactly one pair's [`Book`] and is driven by exactly
//! one task (the [`crate::orderbook::router::CommandRouter`]'s per-pair
//! worker); every method here reads or mutates `self.book` through `Book`'s
//! own interior mutability rather than requiring `&mut self`, which keeps
//! the matcher usable from an `Arc<Matcher>` if a deployment ever wants
//! read-only introspection from another task without an extra lock layer.

use crate::config::EngineConfig;
use crate::decimal::Decimal;
use crate::orderbook::book::Book;
use crate::orderbook::error::EngineError;
use crate::orderbook::order::{Order, OrderKind, OrderState, Side, TimeInForce, new_order_id};
use crate::orderbook::sequencer::{
    EngineCommand, EngineEvent, EventPayload, Journal, JournalRecord, ReasonCode,
};
use crate::orderbook::stp::{StpAction, StpPolicy, check_stp_at_level};
use crate::orderbook::trade::new_trade_id;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, trace, warn};

/// Single-writer matcher for one pair: validates and accepts commands,
/// runs the matching algorithm, and emits the ordered event stream.
pub struct Matcher {
    /// The pair's book. Public so subscribers sharing a pair's matcher
    /// task (e.g. an in-process snapshotter) can read it directly.
    pub book: Book,
    /// Self-trade prevention policy for this pair.
    pub stp_policy: StpPolicy,
    /// Engine-wide configuration (cascade cap, snapshot depth, etc).
    pub config: EngineConfig,
    journal: Option<Arc<dyn Journal>>,
    client_order_ids: DashMap<(String, String), String>,
    halted: AtomicBool,
    /// Present only during recovery: the `order_id`/`trade_id` that was
    /// assigned, keyed by the `seq` it was assigned at, read back from the
    /// journal's own `Event` records. `process_submit`/`match_taker` look
    /// here before minting a fresh id so that replaying the same `Command`
    /// stream reproduces the exact identities the original run assigned,
    /// instead of generating new random ones — replay must yield a book
    /// bit-identical to the original run's.
    replay_ids: Option<DashMap<u64, String>>,
}

impl Matcher {
    /// A matcher for `book`, with the engine's default self-trade policy
    /// (`StpPolicy::Skip`) and no journal attached.
    pub fn new(book: Book, config: EngineConfig) -> Self {
        Self {
            book,
            stp_policy: StpPolicy::Skip,
            config,
            journal: None,
            client_order_ids: DashMap::new(),
            halted: AtomicBool::new(false),
            replay_ids: None,
        }
    }

    /// Configure an explicit self-trade prevention policy for this pair.
    pub fn with_stp_policy(mut self, policy: StpPolicy) -> Self {
        self.stp_policy = policy;
        self
    }

    /// Attach a durable journal; every accepted command and emitted event
    /// is appended to it as this matcher processes commands.
    pub fn with_journal(mut self, journal: Arc<dyn Journal>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Recovery only: seed the `seq -> id` table [`Self::replay`] consults
    /// instead of minting fresh `order_id`/`trade_id` values, so that
    /// replaying a `Command` stream reconstructs identical identities.
    pub fn with_replay_ids(mut self, ids: std::collections::HashMap<u64, String>) -> Self {
        self.replay_ids = Some(ids.into_iter().collect());
        self
    }

    /// The id to use for the event about to be emitted at `seq`: the
    /// recorded id during replay, or a freshly minted one otherwise.
    fn assign_id(&self, seq: u64, mint: impl FnOnce() -> String) -> String {
        match &self.replay_ids {
            Some(ids) => ids.remove(&seq).map(|(_, id)| id).unwrap_or_else(mint),
            None => mint(),
        }
    }

    /// `true` once a fatal condition has halted this pair (§7). No further
    /// commands are processed until the matcher is replaced (operator
    /// intervention / restart-from-journal).
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Process one command, returning the ordered events it produced.
    ///
    /// Never panics on a malformed or unauthorized command — those
    /// produce a single reject event. A fatal condition (arithmetic
    /// overflow, invariant violation, journal failure) halts the pair and
    /// returns a single `PairHalted` event instead.
    pub fn handle(&self, command: EngineCommand, now: u64) -> Vec<EngineEvent> {
        if self.is_halted() {
            return Vec::new();
        }
        if let Err(err) = self.journal_command(&command, now) {
            return self.halt(err, now);
        }
        match self.apply(command, now) {
            Ok(events) => {
                for event in &events {
                    if let Err(err) = self.journal_event(event) {
                        return self.halt(err, now);
                    }
                }
                events
            }
            Err(err) => self.halt(err, now),
        }
    }

    /// Apply a command to the book and return the events it produces,
    /// without touching the journal. Used by [`Self::handle`] (which wraps
    /// this with write-ahead journaling of the command and its resulting
    /// events) and by recovery, which replays already-durable `Command`
    /// records from the journal straight into a fresh `Book`: on restart,
    /// replaying the log per pair in seq order must reconstruct a
    /// bit-identical book.
    pub fn apply(&self, command: EngineCommand, now: u64) -> Result<Vec<EngineEvent>, EngineError> {
        match command.clone() {
            EngineCommand::Submit { .. } => self.process_submit(command, now),
            EngineCommand::Cancel {
                pair,
                order_id,
                user_id,
            } => Ok(self.process_cancel(pair, order_id, user_id, now)),
            EngineCommand::Modify { .. } => self.process_modify(command, now),
            EngineCommand::Tick { pair, now: tick_now } => Ok(self.process_tick(pair, tick_now)),
        }
    }

    /// Replay a single already-journaled command into this matcher's book,
    /// discarding the events it produces (recovery only cares about the
    /// resulting Book state, not re-announcing history to subscribers) and
    /// without appending anything back to the journal. A fatal condition
    /// during replay indicates a corrupt or inconsistent journal and is
    /// surfaced to the caller rather than silently halting.
    pub fn replay(&self, command: EngineCommand, now: u64) -> Result<(), EngineError> {
        self.apply(command, now).map(|_events| ())
    }

    /// Cooperative shutdown: halts the pair and emits the terminal
    /// `PairClosed` event (§7). Not journaled as a command — it is a
    /// router-level signal, not part of the replayable command stream.
    pub fn shutdown(&self, now: u64) -> EngineEvent {
        self.halted.store(true, Ordering::SeqCst);
        self.simple_event(EventPayload::PairClosed, now)
    }

    fn halt(&self, err: EngineError, now: u64) -> Vec<EngineEvent> {
        warn!(pair = %self.book.pair, error = %err, "halting pair on fatal condition");
        self.halted.store(true, Ordering::SeqCst);
        let event = self.simple_event(
            EventPayload::PairHalted {
                reason: err.to_string(),
            },
            now,
        );
        let _ = self.journal_event(&event);
        vec![event]
    }

    fn journal_command(&self, command: &EngineCommand, now: u64) -> Result<(), EngineError> {
        if let Some(journal) = &self.journal {
            let record = JournalRecord::Command {
                pair: command.pair().to_string(),
                seq: self.book.current_seq(),
                ts: now,
                command: command.clone(),
            };
            journal.append(&record)?;
        }
        Ok(())
    }

    fn journal_event(&self, event: &EngineEvent) -> Result<(), EngineError> {
        if let Some(journal) = &self.journal {
            journal.append(&JournalRecord::Event(event.clone()))?;
        }
        Ok(())
    }

    fn simple_event(&self, payload: EventPayload, now: u64) -> EngineEvent {
        EngineEvent {
            pair: self.book.pair.clone(),
            seq: self.book.next_seq(),
            ts: now,
            payload,
        }
    }

    fn reject_event(
        &self,
        client_order_id: Option<String>,
        reason: ReasonCode,
        detail: String,
        now: u64,
    ) -> EngineEvent {
        debug!(
            pair = %self.book.pair,
            client_order_id = ?client_order_id,
            reason = ?reason,
            detail = %detail,
            "order rejected"
        );
        self.simple_event(
            EventPayload::OrderRejected {
                client_order_id,
                reason,
                detail,
            },
            now,
        )
    }

    fn release_client_order_id(&self, order: &Order) {
        if let Some(coid) = &order.client_order_id {
            self.client_order_ids.remove(&(order.user_id.clone(), coid.clone()));
        }
    }

    // ---- Submit ---------------------------------------------------

    fn process_submit(
        &self,
        command: EngineCommand,
        now: u64,
    ) -> Result<Vec<EngineEvent>, EngineError> {
        let EngineCommand::Submit {
            pair,
            user_id,
            side,
            kind,
            qty,
            limit_price,
            stop_price,
            time_in_force,
            expires_at,
            client_order_id,
        } = command
        else {
            unreachable!("process_submit only called for Submit commands")
        };

        let mut events = Vec::new();

        // Every price/quantity the matcher touches from here on — the
        // `Order`'s own fields, the ladder keys it is inserted under, the
        // stop index it may sit in — is kept at the pair's configured
        // scale, never at whatever scale the wire literal happened to
        // imply (decimal.rs's `Decimal` invariant).
        let rescaled = (|| -> Result<_, ()> {
            let qty = qty.rescale(self.book.config.qty_scale).map_err(|_| ())?;
            let limit_price = limit_price
                .map(|p| p.rescale(self.book.config.price_scale))
                .transpose()
                .map_err(|_| ())?;
            let stop_price = stop_price
                .map(|p| p.rescale(self.book.config.price_scale))
                .transpose()
                .map_err(|_| ())?;
            Ok((qty, limit_price, stop_price))
        })();
        let (qty, limit_price, stop_price) = match rescaled {
            Ok(values) => values,
            Err(()) => {
                events.push(self.reject_event(
                    client_order_id,
                    ReasonCode::ValidationError,
                    "price or quantity precision exceeds the pair's configured scale".to_string(),
                    now,
                ));
                return Ok(events);
            }
        };

        let (kind, time_in_force) = match self.validate_submit(
            &pair,
            kind,
            qty,
            limit_price,
            stop_price,
            time_in_force,
            expires_at,
            now,
        ) {
            Ok(validated) => validated,
            Err((reason, detail)) => {
                events.push(self.reject_event(client_order_id, reason, detail, now));
                return Ok(events);
            }
        };

        if let Some(coid) = &client_order_id {
            let key = (user_id.clone(), coid.clone());
            if self.client_order_ids.contains_key(&key) {
                events.push(self.reject_event(
                    client_order_id,
                    ReasonCode::ValidationError,
                    "duplicate client_order_id for this user".to_string(),
                    now,
                ));
                return Ok(events);
            }
        }

        if time_in_force == TimeInForce::Fok {
            let fillable = self.fillable_qty(side, limit_price, qty, &user_id);
            if fillable < qty {
                events.push(self.reject_event(
                    client_order_id,
                    ReasonCode::FillOrKill,
                    "insufficient resting liquidity to fill in full".to_string(),
                    now,
                ));
                return Ok(events);
            }
        }

        let seq = self.book.next_seq();
        let order_id = self.assign_id(seq, new_order_id);
        let initial_state = if kind.is_stop() {
            OrderState::PendingTrigger
        } else {
            OrderState::Open
        };
        let order = Order {
            order_id: order_id.clone(),
            pair: pair.clone(),
            user_id,
            side,
            kind,
            limit_price,
            stop_price,
            time_in_force,
            expires_at,
            original_qty: qty,
            remaining_qty: qty,
            accepted_seq: seq,
            client_order_id: client_order_id.clone(),
            state: initial_state,
        };

        if let Some(coid) = &client_order_id {
            self.client_order_ids
                .insert((order.user_id.clone(), coid.clone()), order_id.clone());
        }

        debug!(pair = %pair, order_id = %order_id, accepted_seq = seq, "order accepted");
        events.push(EngineEvent {
            pair: pair.clone(),
            seq,
            ts: now,
            payload: EventPayload::OrderAccepted {
                order_id,
                client_order_id,
                accepted_seq: seq,
                initial_state,
            },
        });

        if kind.is_stop() {
            self.book.insert_pending_trigger(order);
            return Ok(events);
        }

        let mut taker = order;
        let mut cascade_queue: VecDeque<Order> = VecDeque::new();
        self.match_taker(&mut taker, &mut events, now, &mut cascade_queue)?;
        self.finalize_taker(taker, &mut events, now)?;
        self.run_cascade(&mut events, now, cascade_queue)?;
        Ok(events)
    }

    #[allow(clippy::too_many_arguments)]
    fn validate_submit(
        &self,
        pair: &str,
        mut kind: OrderKind,
        qty: Decimal,
        limit_price: Option<Decimal>,
        stop_price: Option<Decimal>,
        time_in_force: TimeInForce,
        expires_at: Option<u64>,
        now: u64,
    ) -> Result<(OrderKind, TimeInForce), (ReasonCode, String)> {
        if pair != self.book.pair {
            return Err((ReasonCode::PolicyViolation, format!("unknown pair: {pair}")));
        }
        if !self.book.config.qty_conforms(&qty) {
            return Err((
                ReasonCode::PolicyViolation,
                "quantity does not conform to lot size / minimum quantity".to_string(),
            ));
        }

        // "IOC without a limit price is treated as MARKET-IOC."
        if kind == OrderKind::Limit && time_in_force == TimeInForce::Ioc && limit_price.is_none() {
            kind = OrderKind::Market;
        }

        match kind {
            OrderKind::Market => {
                if limit_price.is_some() || stop_price.is_some() {
                    return Err((
                        ReasonCode::ValidationError,
                        "MARKET orders must not carry a limit or stop price".to_string(),
                    ));
                }
                if time_in_force != TimeInForce::Ioc {
                    return Err((
                        ReasonCode::PolicyViolation,
                        "MARKET orders must use IOC (GTC is invalid for MARKET)".to_string(),
                    ));
                }
            }
            OrderKind::Limit => {
                let Some(price) = limit_price else {
                    return Err((
                        ReasonCode::ValidationError,
                        "LIMIT orders require a limit price".to_string(),
                    ));
                };
                if stop_price.is_some() {
                    return Err((
                        ReasonCode::ValidationError,
                        "LIMIT orders must not carry a stop price".to_string(),
                    ));
                }
                if !self.book.config.price_conforms(&price) {
                    return Err((
                        ReasonCode::PolicyViolation,
                        "price does not conform to tick size".to_string(),
                    ));
                }
                self.validate_gtd(time_in_force, expires_at, now)?;
            }
            OrderKind::Stop => {
                let Some(sp) = stop_price else {
                    return Err((
                        ReasonCode::ValidationError,
                        "STOP orders require a stop price".to_string(),
                    ));
                };
                if limit_price.is_some() {
                    return Err((
                        ReasonCode::ValidationError,
                        "STOP orders must not carry a limit price".to_string(),
                    ));
                }
                if !self.book.config.price_conforms(&sp) {
                    return Err((
                        ReasonCode::PolicyViolation,
                        "stop price does not conform to tick size".to_string(),
                    ));
                }
                self.validate_gtd(time_in_force, expires_at, now)?;
            }
            OrderKind::StopLimit => {
                let (Some(sp), Some(lp)) = (stop_price, limit_price) else {
                    return Err((
                        ReasonCode::ValidationError,
                        "STOP_LIMIT orders require both a stop price and a limit price".to_string(),
                    ));
                };
                if !self.book.config.price_conforms(&sp) || !self.book.config.price_conforms(&lp) {
                    return Err((
                        ReasonCode::PolicyViolation,
                        "price does not conform to tick size".to_string(),
                    ));
                }
                self.validate_gtd(time_in_force, expires_at, now)?;
            }
        }

        Ok((kind, time_in_force))
    }

    fn validate_gtd(
        &self,
        time_in_force: TimeInForce,
        expires_at: Option<u64>,
        now: u64,
    ) -> Result<(), (ReasonCode, String)> {
        if time_in_force == TimeInForce::Gtd && !expires_at.is_some_and(|at| at > now) {
            return Err((
                ReasonCode::ValidationError,
                "GTD orders require expires_at in the future".to_string(),
            ));
        }
        Ok(())
    }

    /// Hypothetically walk the book the same way [`Self::match_taker`]
    /// would, without mutating anything, and sum the quantity that would
    /// be filled. Used by the FOK pre-check (§4.F). Self-trade skipped
    /// makers never count, matching the `Skip` default; for the other STP
    /// policies this is a conservative approximation (an exact estimate
    /// would require simulating the cancellations those policies perform).
    fn fillable_qty(
        &self,
        side: Side,
        limit_price: Option<Decimal>,
        qty: Decimal,
        user_id: &str,
    ) -> Decimal {
        let opp_side = side.opposite();
        let mut remaining = qty;
        let mut filled = Decimal::zero(qty.scale());
        for level in self.book.ladder(opp_side).iterate_from_best() {
            if remaining.is_zero() {
                break;
            }
            if let Some(limit) = limit_price {
                let crosses = match side {
                    Side::Buy => level.price() <= limit,
                    Side::Sell => level.price() >= limit,
                };
                if !crosses {
                    break;
                }
            }
            for maker in level.orders_fifo() {
                if remaining.is_zero() {
                    break;
                }
                if maker.user_id == user_id && self.stp_policy != StpPolicy::None {
                    continue;
                }
                let here = Decimal::min(remaining, maker.remaining_qty);
                remaining = remaining.checked_sub(&here).unwrap_or(remaining);
                filled = filled.checked_add(&here).unwrap_or(filled);
            }
        }
        filled
    }

    /// The cross loop (§4.F "Matching algorithm"): walks the opposite
    /// ladder best-first, FIFO within each level, trading `taker` against
    /// resting makers until `taker` is filled, the book is exhausted, or
    /// (for LIMIT takers) the next level no longer crosses. Every trade
    /// this produces feeds `book.record_trade`, whose drained stop orders
    /// are appended to `cascade_queue` for processing once the initiating
    /// command finishes.
    fn match_taker(
        &self,
        taker: &mut Order,
        events: &mut Vec<EngineEvent>,
        now: u64,
        cascade_queue: &mut VecDeque<Order>,
    ) -> Result<(), EngineError> {
        let opp_side = taker.side.opposite();
        for level in self.book.ladder(opp_side).iterate_from_best() {
            if taker.remaining_qty.is_zero() {
                break;
            }
            if taker.kind == OrderKind::Limit {
                let limit = taker
                    .limit_price
                    .expect("LIMIT taker always carries a limit price after validation");
                let crosses = match taker.side {
                    Side::Buy => level.price() <= limit,
                    Side::Sell => level.price() >= limit,
                };
                if !crosses {
                    break;
                }
            }

            let level_price = level.price();
            let level_orders = level.orders_fifo();
            let stp_action = check_stp_at_level(&level_orders, &taker.user_id, self.stp_policy);

            if let StpAction::CancelMaker { maker_order_ids } = &stp_action {
                for maker_id in maker_order_ids {
                    self.book.remove_order(maker_id);
                    events.push(self.simple_event(
                        EventPayload::OrderCancelled {
                            order_id: maker_id.clone(),
                            reason: ReasonCode::SelfTradePrevention,
                        },
                        now,
                    ));
                }
            }

            for maker_snapshot in level_orders {
                if taker.remaining_qty.is_zero() {
                    break;
                }
                match &stp_action {
                    StpAction::CancelMaker { maker_order_ids } => {
                        if maker_order_ids.contains(&maker_snapshot.order_id) {
                            continue;
                        }
                    }
                    StpAction::Skip if maker_snapshot.user_id == taker.user_id => {
                        continue;
                    }
                    StpAction::CancelTaker if maker_snapshot.user_id == taker.user_id => {
                        taker.state = OrderState::Cancelled;
                        taker.remaining_qty = Decimal::zero(taker.remaining_qty.scale());
                        events.push(self.simple_event(
                            EventPayload::OrderCancelled {
                                order_id: taker.order_id.clone(),
                                reason: ReasonCode::SelfTradePrevention,
                            },
                            now,
                        ));
                        break;
                    }
                    StpAction::CancelBoth { maker_order_id }
                        if *maker_order_id == maker_snapshot.order_id =>
                    {
                        self.book.remove_order(maker_order_id);
                        events.push(self.simple_event(
                            EventPayload::OrderCancelled {
                                order_id: maker_order_id.clone(),
                                reason: ReasonCode::SelfTradePrevention,
                            },
                            now,
                        ));
                        taker.state = OrderState::Cancelled;
                        taker.remaining_qty = Decimal::zero(taker.remaining_qty.scale());
                        events.push(self.simple_event(
                            EventPayload::OrderCancelled {
                                order_id: taker.order_id.clone(),
                                reason: ReasonCode::SelfTradePrevention,
                            },
                            now,
                        ));
                        break;
                    }
                    _ => {}
                }

                let Some(live_maker) = level.get(&maker_snapshot.order_id) else {
                    continue;
                };
                if live_maker.remaining_qty.is_zero() {
                    continue;
                }

                let qty = Decimal::min(taker.remaining_qty, live_maker.remaining_qty);
                taker.apply_fill(qty)?;
                self.book
                    .apply_fill_to_resting(opp_side, level_price, &live_maker.order_id, qty)?;

                trace!(
                    pair = %self.book.pair,
                    maker_order_id = %live_maker.order_id,
                    taker_order_id = %taker.order_id,
                    price = %level_price,
                    qty = %qty,
                    "trade executed"
                );
                let trade_seq = self.book.next_seq();
                let trade_id = self.assign_id(trade_seq, new_trade_id);
                events.push(EngineEvent {
                    pair: self.book.pair.clone(),
                    seq: trade_seq,
                    ts: now,
                    payload: EventPayload::Trade {
                        trade_id,
                        maker_order_id: live_maker.order_id.clone(),
                        taker_order_id: taker.order_id.clone(),
                        price: level_price,
                        qty,
                        taker_side: taker.side,
                    },
                });

                let maker_after = self.book.get_order(&live_maker.order_id);
                let maker_filled = maker_after
                    .as_ref()
                    .map(|o| o.remaining_qty.is_zero())
                    .unwrap_or(true);
                if maker_filled {
                    self.book.remove_order(&live_maker.order_id);
                    self.release_client_order_id(&live_maker);
                    events.push(self.simple_event(
                        EventPayload::OrderFilled {
                            order_id: live_maker.order_id.clone(),
                        },
                        now,
                    ));
                } else if let Some(maker) = maker_after {
                    events.push(self.simple_event(
                        EventPayload::OrderPartiallyFilled {
                            order_id: maker.order_id.clone(),
                            remaining_qty: maker.remaining_qty,
                        },
                        now,
                    ));
                }

                cascade_queue.extend(self.book.record_trade(level_price));
            }

            self.book.ladder(opp_side).drop_if_empty(level_price);
        }
        Ok(())
    }

    /// TIF post-processing for the taker once the cross loop has run
    /// (§4.F). The maker side of every fill was already finalized inline
    /// in [`Self::match_taker`].
    fn finalize_taker(
        &self,
        mut order: Order,
        events: &mut Vec<EngineEvent>,
        now: u64,
    ) -> Result<(), EngineError> {
        if order.remaining_qty.is_zero() {
            order.state = OrderState::Filled;
            self.release_client_order_id(&order);
            events.push(self.simple_event(
                EventPayload::OrderFilled {
                    order_id: order.order_id.clone(),
                },
                now,
            ));
            return Ok(());
        }

        match order.kind {
            OrderKind::Market => {
                order.state = OrderState::Cancelled;
                self.release_client_order_id(&order);
                events.push(self.simple_event(
                    EventPayload::OrderCancelled {
                        order_id: order.order_id.clone(),
                        reason: ReasonCode::MarketNoLiquidity,
                    },
                    now,
                ));
            }
            OrderKind::Limit => match order.time_in_force {
                TimeInForce::Ioc => {
                    order.state = OrderState::Cancelled;
                    self.release_client_order_id(&order);
                    events.push(self.simple_event(
                        EventPayload::OrderCancelled {
                            order_id: order.order_id.clone(),
                            reason: ReasonCode::IocRemainder,
                        },
                        now,
                    ));
                }
                TimeInForce::Fok => {
                    return Err(EngineError::InvariantViolation {
                        detail: "FOK order had a remainder despite passing the fillable pre-check"
                            .to_string(),
                    });
                }
                TimeInForce::Gtc | TimeInForce::Gtd => {
                    if order.state == OrderState::Partial {
                        events.push(self.simple_event(
                            EventPayload::OrderPartiallyFilled {
                                order_id: order.order_id.clone(),
                                remaining_qty: order.remaining_qty,
                            },
                            now,
                        ));
                    }
                    let side = order.side;
                    let price = order
                        .limit_price
                        .expect("LIMIT order always carries a limit price after validation");
                    let remaining_qty = order.remaining_qty;
                    let order_id = order.order_id.clone();
                    self.book.insert_resting(order);
                    events.push(self.simple_event(
                        EventPayload::OrderResting {
                            order_id,
                            side,
                            price,
                            remaining_qty,
                        },
                        now,
                    ));
                }
            },
            OrderKind::Stop | OrderKind::StopLimit => {
                unreachable!("stop orders rest in the stop index on submit, never reach finalize_taker")
            }
        }
        Ok(())
    }

    /// Post-trade stop cascade (§4.F): feed every triggered stop back in
    /// as a synthetic taker submit (STOP -> MARKET, STOP_LIMIT -> LIMIT),
    /// which may itself trigger further trades and further stops. Bounded
    /// by `max_cascade_iterations` to guarantee termination.
    fn run_cascade(
        &self,
        events: &mut Vec<EngineEvent>,
        now: u64,
        mut queue: VecDeque<Order>,
    ) -> Result<(), EngineError> {
        let mut iterations: u32 = 0;
        while let Some(stopped) = queue.pop_front() {
            iterations += 1;
            trace!(
                pair = %self.book.pair,
                order_id = %stopped.order_id,
                iteration = iterations,
                "stop order triggered"
            );
            if iterations > self.config.max_cascade_iterations {
                return Err(EngineError::InvariantViolation {
                    detail: format!(
                        "stop cascade exceeded max_cascade_iterations ({})",
                        self.config.max_cascade_iterations
                    ),
                });
            }

            let (kind, limit_price, time_in_force, expires_at) = match stopped.kind {
                OrderKind::Stop => (OrderKind::Market, None, TimeInForce::Ioc, None),
                OrderKind::StopLimit => (
                    OrderKind::Limit,
                    stopped.limit_price,
                    stopped.time_in_force,
                    stopped.expires_at,
                ),
                _ => unreachable!("only STOP/STOP_LIMIT orders are ever queued for cascade"),
            };

            let seq = self.book.next_seq();
            let mut synthetic = Order {
                order_id: stopped.order_id.clone(),
                pair: stopped.pair.clone(),
                user_id: stopped.user_id.clone(),
                side: stopped.side,
                kind,
                limit_price,
                stop_price: stopped.stop_price,
                time_in_force,
                expires_at,
                original_qty: stopped.remaining_qty,
                remaining_qty: stopped.remaining_qty,
                accepted_seq: seq,
                client_order_id: stopped.client_order_id.clone(),
                state: OrderState::Open,
            };

            events.push(EngineEvent {
                pair: self.book.pair.clone(),
                seq,
                ts: now,
                payload: EventPayload::OrderAccepted {
                    order_id: synthetic.order_id.clone(),
                    client_order_id: synthetic.client_order_id.clone(),
                    accepted_seq: seq,
                    initial_state: OrderState::Open,
                },
            });

            self.match_taker(&mut synthetic, events, now, &mut queue)?;
            self.finalize_taker(synthetic, events, now)?;
        }
        Ok(())
    }

    // ---- Cancel / Modify / Tick -------------------------------------

    fn process_cancel(
        &self,
        pair: String,
        order_id: String,
        user_id: String,
        now: u64,
    ) -> Vec<EngineEvent> {
        if pair != self.book.pair {
            return vec![self.simple_event(
                EventPayload::CancelRejected {
                    order_id,
                    reason: ReasonCode::NotFound,
                },
                now,
            )];
        }
        let Some(order) = self.book.get_order(&order_id) else {
            return vec![self.simple_event(
                EventPayload::CancelRejected {
                    order_id,
                    reason: ReasonCode::NotFound,
                },
                now,
            )];
        };
        if order.user_id != user_id {
            return vec![self.simple_event(
                EventPayload::CancelRejected {
                    order_id,
                    reason: ReasonCode::Unauthorized,
                },
                now,
            )];
        }
        self.book.remove_order(&order_id);
        self.release_client_order_id(&order);
        vec![self.simple_event(
            EventPayload::OrderCancelled {
                order_id,
                reason: ReasonCode::UserRequested,
            },
            now,
        )]
    }

    fn process_modify(
        &self,
        command: EngineCommand,
        now: u64,
    ) -> Result<Vec<EngineEvent>, EngineError> {
        let EngineCommand::Modify {
            pair,
            order_id,
            user_id,
            new_qty,
            new_price,
            new_time_in_force,
            new_expires_at,
        } = command
        else {
            unreachable!("process_modify only called for Modify commands")
        };

        if pair != self.book.pair {
            return Ok(vec![self.simple_event(
                EventPayload::CancelRejected {
                    order_id,
                    reason: ReasonCode::NotFound,
                },
                now,
            )]);
        }
        let Some(existing) = self.book.get_order(&order_id) else {
            return Ok(vec![self.simple_event(
                EventPayload::CancelRejected {
                    order_id,
                    reason: ReasonCode::NotFound,
                },
                now,
            )]);
        };
        if existing.user_id != user_id {
            return Ok(vec![self.simple_event(
                EventPayload::CancelRejected {
                    order_id,
                    reason: ReasonCode::Unauthorized,
                },
                now,
            )]);
        }

        let new_qty_val = new_qty.unwrap_or(existing.original_qty);
        let executed = existing
            .original_qty
            .checked_sub(&existing.remaining_qty)
            .unwrap_or(existing.original_qty);
        if new_qty_val < executed {
            return Ok(vec![self.simple_event(
                EventPayload::CancelRejected {
                    order_id: order_id.clone(),
                    reason: ReasonCode::ValidationError,
                },
                now,
            )]);
        }

        let mut events = Vec::new();
        self.book.remove_order(&order_id);
        self.release_client_order_id(&existing);
        events.push(self.simple_event(
            EventPayload::OrderCancelled {
                order_id: order_id.clone(),
                reason: ReasonCode::UserRequested,
            },
            now,
        ));

        let resubmit = EngineCommand::Submit {
            pair,
            user_id,
            side: existing.side,
            kind: existing.kind,
            qty: new_qty_val,
            limit_price: new_price.or(existing.limit_price),
            stop_price: existing.stop_price,
            time_in_force: new_time_in_force.unwrap_or(existing.time_in_force),
            expires_at: new_expires_at.or(existing.expires_at),
            client_order_id: existing.client_order_id,
        };
        events.extend(self.process_submit(resubmit, now)?);
        Ok(events)
    }

    fn process_tick(&self, _pair: String, now: u64) -> Vec<EngineEvent> {
        self.book
            .collect_expired(now)
            .into_iter()
            .map(|order| {
                self.release_client_order_id(&order);
                self.simple_event(
                    EventPayload::OrderExpired {
                        order_id: order.order_id,
                    },
                    now,
                )
            })
            .collect()
    }
}
