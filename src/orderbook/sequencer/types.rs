//! Command and event types for the matcher's single-writer loop and the
//! journal that durably records it.
//!
//! A command enum paired with an outcome, sequence number, and timestamp.
//! `EngineCommand`/`EngineEvent` are concrete rather than generic over an
//! extra-fields type parameter, since this engine's `Order` is closed —
//! every field it can carry is already listed on the type.

use crate::decimal::Decimal;
use crate::orderbook::order::{OrderKind, OrderState, Side, TimeInForce};
use serde::{Deserialize, Serialize};

/// A command accepted by the router and handed to a pair's matcher, in
/// the order it must be applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineCommand {
    /// Submit a new order.
    Submit {
        /// Trading pair symbol.
        pair: String,
        /// Submitting user.
        user_id: String,
        /// Buy or sell.
        side: Side,
        /// Instruction type.
        kind: OrderKind,
        /// Order quantity, as submitted (pre-validation canonical decimal).
        qty: Decimal,
        /// Required for LIMIT/STOP_LIMIT.
        limit_price: Option<Decimal>,
        /// Required for STOP/STOP_LIMIT.
        stop_price: Option<Decimal>,
        /// Time-in-force instruction.
        time_in_force: TimeInForce,
        /// Required iff `time_in_force == Gtd`.
        expires_at: Option<u64>,
        /// Optional client-supplied idempotency/correlation id.
        client_order_id: Option<String>,
    },

    /// Cancel an existing order.
    Cancel {
        /// Trading pair symbol.
        pair: String,
        /// The order to cancel.
        order_id: String,
        /// Must match the order's `user_id`.
        user_id: String,
    },

    /// Atomically cancel and resubmit an existing order with new terms.
    Modify {
        /// Trading pair symbol.
        pair: String,
        /// The order to modify.
        order_id: String,
        /// Must match the order's `user_id`.
        user_id: String,
        /// New quantity, if changing.
        new_qty: Option<Decimal>,
        /// New limit price, if changing.
        new_price: Option<Decimal>,
        /// New time-in-force, if changing.
        new_time_in_force: Option<TimeInForce>,
        /// New GTD expiry, if changing.
        new_expires_at: Option<u64>,
    },

    /// Periodic wall-clock advance, injected by the router for GTD expiry
    /// processing. Carries the pair so each pair's matcher only sees its
    /// own ticks.
    Tick {
        /// Trading pair symbol.
        pair: String,
        /// Unix epoch milliseconds this tick represents.
        now: u64,
    },
}

impl EngineCommand {
    /// The pair this command targets.
    pub fn pair(&self) -> &str {
        match self {
            EngineCommand::Submit { pair, .. }
            | EngineCommand::Cancel { pair, .. }
            | EngineCommand::Modify { pair, .. }
            | EngineCommand::Tick { pair, .. } => pair,
        }
    }
}

/// A reason code carried by reject/cancel/expiry events. Stable and
/// machine-readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    /// Cancelled: the IOC remainder after a cross.
    IocRemainder,
    /// Cancelled: a MARKET order found no (or insufficient) liquidity.
    MarketNoLiquidity,
    /// Cancelled: an explicit user Cancel command.
    UserRequested,
    /// Cancelled: self-trade prevention cancelled this order.
    SelfTradePrevention,
    /// Expired: GTD `expires_at` reached.
    GtdExpiry,
    /// Rejected: malformed command or missing required field.
    ValidationError,
    /// Rejected: tick/lot/min-qty/pair policy failure.
    PolicyViolation,
    /// Rejected: FOK could not be filled in full.
    FillOrKill,
    /// Rejected/cancel-rejected: order not found or already terminal.
    NotFound,
    /// Rejected/cancel-rejected: caller does not own the order.
    Unauthorized,
}

/// A sequenced event emitted by a pair's matcher. `seq` is this pair's
/// monotone counter; it strictly increases and never skips.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineEvent {
    /// Trading pair this event belongs to.
    pub pair: String,
    /// Per-pair monotone sequence number.
    pub seq: u64,
    /// Wall-clock timestamp in Unix epoch milliseconds.
    pub ts: u64,
    /// The event payload.
    pub payload: EventPayload,
}

/// The event wire schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// A Submit was accepted; always the first event for an accepted
    /// command.
    OrderAccepted {
        /// Engine-assigned order id.
        order_id: String,
        /// Echoed client correlation id, if supplied.
        client_order_id: Option<String>,
        /// The per-pair sequence assigned at acceptance.
        accepted_seq: u64,
        /// State immediately after acceptance.
        initial_state: OrderState,
    },
    /// A Submit, Cancel, or Modify was rejected; no state changed.
    OrderRejected {
        /// Echoed client correlation id, if supplied.
        client_order_id: Option<String>,
        /// Stable machine-readable reason.
        reason: ReasonCode,
        /// Human-readable detail.
        detail: String,
    },
    /// An execution between a resting maker and an incoming taker.
    Trade {
        /// Globally unique trade id.
        trade_id: String,
        /// The resting order's id.
        maker_order_id: String,
        /// The incoming order's id.
        taker_order_id: String,
        /// Execution price (always the maker's resting price).
        price: Decimal,
        /// Executed quantity.
        qty: Decimal,
        /// The taker's side.
        taker_side: Side,
    },
    /// An order began resting in the ladder.
    OrderResting {
        /// The resting order's id.
        order_id: String,
        /// Which side it rests on.
        side: Side,
        /// The resting price.
        price: Decimal,
        /// Quantity left unfilled.
        remaining_qty: Decimal,
    },
    /// An order was partially filled and remains resting.
    OrderPartiallyFilled {
        /// The order's id.
        order_id: String,
        /// Quantity left unfilled.
        remaining_qty: Decimal,
    },
    /// An order was filled in full; terminal.
    OrderFilled {
        /// The order's id.
        order_id: String,
    },
    /// An order was cancelled; terminal.
    OrderCancelled {
        /// The order's id.
        order_id: String,
        /// Why it was cancelled.
        reason: ReasonCode,
    },
    /// A GTD order's expiry was reached; terminal.
    OrderExpired {
        /// The order's id.
        order_id: String,
    },
    /// A Cancel or Modify was rejected.
    CancelRejected {
        /// The order id the command targeted.
        order_id: String,
        /// Stable machine-readable reason.
        reason: ReasonCode,
    },
    /// A depth-bounded, anonymized view of the book.
    BookSnapshot {
        /// Aggregated bid levels, best first.
        bids: Vec<SnapshotLevel>,
        /// Aggregated ask levels, best first.
        asks: Vec<SnapshotLevel>,
        /// Most recent trade price, if any.
        last_price: Option<Decimal>,
        /// Number of levels included per side.
        depth: usize,
    },
    /// A fatal condition halted this pair; no further commands are
    /// processed until operator intervention.
    PairHalted {
        /// Human-readable detail.
        reason: String,
    },
    /// Cooperative shutdown completed for this pair.
    PairClosed,
}

/// One aggregated, anonymized price level in a [`EventPayload::BookSnapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotLevel {
    /// The level's price.
    pub price: Decimal,
    /// Aggregate remaining quantity at this level.
    pub total_qty: Decimal,
    /// Number of resting orders at this level.
    pub order_count: usize,
}
