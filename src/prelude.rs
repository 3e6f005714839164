//! Convenience re-export of the types most callers need: the command
//! router, event bus, book/order/trade model, decimal arithmetic, and the
//! command/event wire schema.

pub use crate::config::{EngineConfig, JournalSyncMode, PairConfig};
pub use crate::decimal::{Decimal, DecimalError};
pub use crate::orderbook::sequencer::{
    EngineCommand, EngineEvent, EventPayload, Journal, JournalRecord, ReasonCode, SnapshotLevel,
};
pub use crate::orderbook::{
    Book, BookSnapshot, CommandRouter, EngineError, EventBus, Matcher, Order, OrderKind,
    OrderState, Side, StpPolicy, TimeInForce, Trade,
};
