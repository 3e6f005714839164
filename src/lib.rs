//! # Matching Engine
//!
//! A peer-to-peer order matching engine for a crypto/fiat trading venue:
//! given a stream of submit/cancel/modify commands for one or more trading
//! pairs, it maintains a price-time-priority order book per pair, executes
//! trades under well-defined price/time rules, produces a durable,
//! monotonically sequenced stream of trade and order-lifecycle events, and
//! publishes depth-bounded book snapshots to subscribers.
//!
//! ## Scope
//!
//! The crate implements the matching core only: the per-pair order book,
//! the matching algorithm (MARKET, LIMIT, STOP, STOP_LIMIT with
//! GTC/IOC/FOK/GTD time-in-force), the single-writer command-processing
//! loop, and the event-publication pipeline. Transport (HTTP/WebSocket),
//! authentication, a persistent order/trade/account store, fiat payment,
//! and market-data ingestion are external collaborators, referenced only
//! by the wire schema in [`orderbook::sequencer`].
//!
//! ## Architecture
//!
//! | Component | Module |
//! |---|---|
//! | Decimal arithmetic | [`decimal`] |
//! | Order & trade identities | [`orderbook::order`], [`orderbook::trade`] |
//! | Price ladder | [`orderbook::ladder`] |
//! | Stop-order index | [`orderbook::stop_index`] |
//! | Book | [`orderbook::book`] |
//! | Matcher | [`orderbook::matcher`] |
//! | Command router | [`orderbook::router`] |
//! | Event bus | [`orderbook::event_bus`] |
//! | Journal & recovery | [`orderbook::sequencer`] |
//! | Snapshotter | [`orderbook::snapshot`] |
//!
//! A pair is brought up by constructing a [`config::PairConfig`], handing
//! it to a [`orderbook::CommandRouter`] via `register_pair`, and then
//! submitting [`orderbook::sequencer::EngineCommand`]s. Results arrive as
//! [`orderbook::sequencer::EngineEvent`]s on an [`orderbook::EventBus`]
//! subscription — one per pair, strictly ordered by `seq`.
//!
//! ```no_run
//! use matching_engine::config::{EngineConfig, PairConfig};
//! use matching_engine::orderbook::{CommandRouter, EventBus, StpPolicy};
//! use matching_engine::orderbook::sequencer::EngineCommand;
//! use matching_engine::decimal::Decimal;
//! use matching_engine::orderbook::{OrderKind, Side, TimeInForce};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let event_bus = Arc::new(EventBus::new(1024));
//! let router = CommandRouter::new(EngineConfig::default(), event_bus.clone());
//! let pair = PairConfig::new("BTC-USD", "0.01", "0.0001", "0.0001", 2, 4).unwrap();
//! router.register_pair(pair, StpPolicy::default(), None);
//!
//! let mut events = event_bus.subscribe("BTC-USD").unwrap();
//! router.submit(EngineCommand::Submit {
//!     pair: "BTC-USD".into(),
//!     user_id: "alice".into(),
//!     side: Side::Buy,
//!     kind: OrderKind::Limit,
//!     qty: Decimal::parse_with_scale("1", 4).unwrap(),
//!     limit_price: Some(Decimal::parse_with_scale("100.00", 2).unwrap()),
//!     stop_price: None,
//!     time_in_force: TimeInForce::Gtc,
//!     expires_at: None,
//!     client_order_id: None,
//! }).unwrap();
//! let accepted = events.recv().await.unwrap();
//! # }
//! ```
//!
//! ## Guarantees
//!
//! - **At-most-once execution** per accepted command.
//! - **Monotone, contiguous `seq`** per pair across every emitted event.
//! - **Atomic partial fills**: quantity is conserved across every trade a
//!   resting or taker order participates in; no phantom fills.
//! - **Exact decimal arithmetic** end to end — see [`decimal::Decimal`].
//! - **Deterministic replay**: a journal of every accepted command and
//!   emitted event reconstructs a bit-identical book (`journal` feature).
//!
//! ## Feature flags
//!
//! - `journal` — the durable, memory-mapped [`orderbook::sequencer::FileJournal`].
//! - `nats` — bridges every published event to a NATS subject via
//!   [`orderbook::EventBus::with_nats`].

pub mod config;
pub mod decimal;
pub mod orderbook;
pub mod prelude;
mod utils;

pub use orderbook::sequencer::{
    EngineCommand, EngineEvent, EventPayload, Journal, JournalEntry, JournalError, JournalRecord,
    ReasonCode, SnapshotLevel,
};
#[cfg(feature = "journal")]
pub use orderbook::sequencer::FileJournal;
pub use orderbook::{
    Book, BookSnapshot, CommandRouter, EngineError, EventBus, Matcher, Order, OrderKind,
    OrderState, Side, StpPolicy, TimeInForce, Trade,
};
pub use utils::current_time_millis;
