//! Command/event wire types and the append-only journal that durably
//! records a pair's matcher loop.
//!
//! # Types
//!
//! - [`EngineCommand`] — commands accepted by the router and handed to a
//!   pair's matcher, in the order they must be applied
//! - [`EngineEvent`] — sequenced events emitted by a pair's matcher
//! - [`EventPayload`] — the event wire schema
//! - [`ReasonCode`] — stable, machine-readable reject/cancel/expiry reasons
//! - [`JournalRecord`] — either a journaled command or an emitted event
//! - [`JournalError`] — error type for journal operations
//! - [`Journal`] — trait for append-only journals
//! - [`JournalEntry`] — a single entry read back from the journal
//! - `FileJournal` — memory-mapped file journal implementation (requires `journal` feature)
//!
//! # Feature Gate
//!
//! The `FileJournal` implementation requires the `journal` feature:
//!
//! ```toml
//! [dependencies]
//! p2p-matching-engine = { version = "0.1", features = ["journal"] }
//! ```
//!
//! The command/event types and the [`Journal`] trait are always available.

pub mod error;
pub mod types;

#[cfg(feature = "journal")]
pub mod file_journal;

pub mod journal;

pub use error::JournalError;
#[cfg(feature = "journal")]
pub use file_journal::FileJournal;
pub use journal::{
    ENTRY_CRC_SIZE, ENTRY_HEADER_SIZE, ENTRY_OVERHEAD, Journal, JournalEntry, JournalReadIter,
    JournalRecord,
};
pub use types::{EngineCommand, EngineEvent, EventPayload, ReasonCode, SnapshotLevel};
