//! The matching engine's core: per-pair book state, the matching
//! algorithm, routing, event publication, and the durable command/event
//! journal.

pub mod book;
pub mod error;
pub mod event_bus;
pub mod ladder;
pub mod matcher;
pub mod order;
pub mod router;
pub mod sequencer;
pub mod snapshot;
pub mod stop_index;
pub mod stp;
pub mod trade;

pub use book::Book;
pub use error::EngineError;
pub use event_bus::EventBus;
pub use ladder::{BestFirstIter, Ladder, LadderSide, PriceLevel};
pub use matcher::Matcher;
pub use order::{Order, OrderKind, OrderState, Side, TimeInForce, new_order_id};
pub use router::CommandRouter;
pub use snapshot::BookSnapshot;
pub use stop_index::StopIndex;
pub use stp::{StpAction, StpPolicy, check_stp_at_level};
pub use trade::{Trade, new_trade_id};
