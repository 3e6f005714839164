//! Order identity and residual state.
//!
//! Grounded on `orderbook/trade.rs`'s `TradeResult`/`TransactionInfo` shape
//! for the general "immutable identity, mutable residual" texture, and on
//! `pricelevel`'s `OrderId`/`UuidGenerator` convention for identity
//! generation (`uuid` v4, rendered canonical).

use crate::decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which side of the book an order rests on or crosses against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Buyer — crosses the ask ladder, rests on the bid ladder.
    Buy,
    /// Seller — crosses the bid ladder, rests on the ask ladder.
    Sell,
}

impl Side {
    /// The opposite side.
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// The order's instruction type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    /// Executes immediately against the book at the best available
    /// price(s); never rests.
    Market,
    /// Crosses the book up to `limit_price`; any remainder may rest
    /// depending on time-in-force.
    Limit,
    /// Dormant until `last_trade_price` reaches `stop_price`, then becomes
    /// a `Market` taker of the same side and quantity.
    Stop,
    /// Dormant until `last_trade_price` reaches `stop_price`, then becomes
    /// a `Limit` taker at `limit_price`.
    StopLimit,
}

impl OrderKind {
    /// `true` for order kinds that are placed in the stop index rather
    /// than crossed immediately on submission.
    pub fn is_stop(self) -> bool {
        matches!(self, OrderKind::Stop | OrderKind::StopLimit)
    }
}

/// Time-in-force instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeInForce {
    /// Good-Til-Cancelled: rests indefinitely until filled or cancelled.
    Gtc,
    /// Immediate-Or-Cancel: any quantity not immediately fillable is
    /// cancelled.
    Ioc,
    /// Fill-Or-Kill: the entire order must be fillable immediately or the
    /// whole command is rejected.
    Fok,
    /// Good-Til-Date: as GTC, plus cancellation at `expires_at`.
    Gtd,
}

/// The order's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    /// A STOP/STOP_LIMIT order waiting in the stop index.
    PendingTrigger,
    /// Resting in the ladder with no fills yet.
    Open,
    /// Resting in the ladder with some, but not all, quantity filled.
    Partial,
    /// Terminal: fully executed.
    Filled,
    /// Terminal: cancelled by the user, IOC remainder, or STP.
    Cancelled,
    /// Terminal: GTD expiry reached before full execution.
    Expired,
    /// Terminal: never entered the book.
    Rejected,
}

impl OrderState {
    /// `true` for states from which no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderState::Filled | OrderState::Cancelled | OrderState::Expired | OrderState::Rejected
        )
    }
}

/// An order as tracked by the engine: immutable identity fields plus
/// mutable residual state (`remaining_qty`, `state`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Globally unique, engine-assigned identifier.
    pub order_id: String,
    /// Trading pair symbol, e.g. `BTC-USD`.
    pub pair: String,
    /// The submitting user.
    pub user_id: String,
    /// Buy or sell.
    pub side: Side,
    /// Instruction type.
    pub kind: OrderKind,
    /// Required for LIMIT and STOP_LIMIT; required by validation for FOK
    /// and GTC orders of any crossing kind.
    pub limit_price: Option<Decimal>,
    /// Required for STOP and STOP_LIMIT.
    pub stop_price: Option<Decimal>,
    /// Time-in-force instruction.
    pub time_in_force: TimeInForce,
    /// Required iff `time_in_force == Gtd`. Unix epoch milliseconds.
    pub expires_at: Option<u64>,
    /// Quantity at acceptance; never mutated after acceptance.
    pub original_qty: Decimal,
    /// Quantity not yet filled, cancelled, or expired.
    pub remaining_qty: Decimal,
    /// Per-pair monotone sequence assigned at acceptance. A `Modify`
    /// resubmission is a brand-new acceptance and gets a new value here.
    pub accepted_seq: u64,
    /// Optional client-supplied identifier, unique per (user, pair) if
    /// supplied.
    pub client_order_id: Option<String>,
    /// Current lifecycle state.
    pub state: OrderState,
}

impl Order {
    /// `true` if this order belongs in the price ladder right now.
    pub fn is_resting(&self) -> bool {
        matches!(self.state, OrderState::Open | OrderState::Partial)
            && self.kind != OrderKind::Market
            && !self.remaining_qty.is_zero()
    }

    /// Apply a fill of `qty` against this order's remaining quantity,
    /// transitioning `Open -> Partial -> Filled` (or `Partial -> Filled`).
    pub fn apply_fill(&mut self, qty: Decimal) -> Result<(), crate::decimal::DecimalError> {
        self.remaining_qty = self.remaining_qty.checked_sub(&qty)?;
        self.state = if self.remaining_qty.is_zero() {
            OrderState::Filled
        } else {
            OrderState::Partial
        };
        Ok(())
    }
}

/// Generate a globally unique, process-unique order identifier.
///
/// UUIDv4 gives engine-wide uniqueness with no cross-producer coordination.
pub fn new_order_id() -> String {
    Uuid::new_v4().to_string()
}
