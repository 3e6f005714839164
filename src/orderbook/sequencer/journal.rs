//! Append-only journal trait for deterministic replay.
//!
//! The [`Journal`] trait defines the contract for persisting
//! [`JournalRecord`]s to durable storage. Implementations must guarantee
//! write-ahead semantics: a record is considered committed only after
//! [`append`](Journal::append) returns `Ok(())`.
//!
//! See `FileJournal` (in the `file_journal` module) for the default
//! memory-mapped file implementation.

use super::error::JournalError;
use crate::orderbook::sequencer::types::{EngineCommand, EngineEvent};
use serde::{Deserialize, Serialize};

/// Size of the fixed-size entry header in bytes.
///
/// Layout: `[4 bytes entry_length][8 bytes sequence_num][8 bytes timestamp_ns]`
pub const ENTRY_HEADER_SIZE: usize = 4 + 8 + 8;

/// Size of the CRC32 trailer appended to each entry in bytes.
pub const ENTRY_CRC_SIZE: usize = 4;

/// Total overhead per journal entry (header + CRC trailer) in bytes.
pub const ENTRY_OVERHEAD: usize = ENTRY_HEADER_SIZE + ENTRY_CRC_SIZE;

/// A record appended to the journal: either the command that was accepted
/// (written before Book mutation) or an event the matcher emitted while
/// processing it (written after).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JournalRecord {
    /// An accepted command, recorded before it mutates the Book.
    Command {
        /// The pair this command targets.
        pair: String,
        /// The per-pair sequence this command's acceptance (or the
        /// command itself, for Cancel/Modify/Tick) is associated with.
        seq: u64,
        /// Wall-clock timestamp in Unix epoch milliseconds.
        ts: u64,
        /// The command payload.
        command: EngineCommand,
    },
    /// An event emitted while processing a command, recorded after the
    /// corresponding Book mutation.
    Event(EngineEvent),
}

impl JournalRecord {
    /// The per-pair sequence number this record is stamped with.
    pub fn seq(&self) -> u64 {
        match self {
            JournalRecord::Command { seq, .. } => *seq,
            JournalRecord::Event(event) => event.seq,
        }
    }

    /// The wall-clock timestamp this record is stamped with.
    pub fn ts(&self) -> u64 {
        match self {
            JournalRecord::Command { ts, .. } => *ts,
            JournalRecord::Event(event) => event.ts,
        }
    }

    /// The pair this record belongs to.
    pub fn pair(&self) -> &str {
        match self {
            JournalRecord::Command { pair, .. } => pair,
            JournalRecord::Event(event) => &event.pair,
        }
    }
}

/// A single journal entry as read back from storage.
///
/// Contains the deserialized record together with its on-disk metadata.
#[derive(Debug, Clone)]
pub struct JournalEntry {
    /// The deserialized record.
    pub record: JournalRecord,

    /// The CRC32 checksum that was stored alongside the entry.
    pub stored_crc: u32,
}

/// Type alias for the iterator returned by [`Journal::read_from`].
///
/// Each item is either a successfully decoded [`JournalEntry`] or a
/// [`JournalError`] (e.g. corrupt CRC, deserialization failure).
pub type JournalReadIter = Box<dyn Iterator<Item = Result<JournalEntry, JournalError>>>;

/// An append-only journal for deterministic replay.
///
/// Implementations must provide durable, ordered storage of
/// [`JournalRecord`]s. The journal is the foundation of the write-ahead
/// log pattern: every record must be persisted before its effect (Book
/// mutation, or returning a result to the caller) is considered final.
///
/// # Thread Safety
///
/// The trait requires `Send + Sync` so the journal can be shared across
/// async task boundaries. However, the intended usage pattern is
/// single-writer (the pair's matcher task) with concurrent readers
/// (replay, monitoring).
pub trait Journal: Send + Sync {
    /// Append a record to the journal.
    ///
    /// The record must be durably persisted before this method returns.
    /// Implementations should flush the underlying storage to guarantee
    /// write-ahead semantics (subject to the configured
    /// [`crate::config::JournalSyncMode`]).
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] if serialization, I/O, or flushing fails.
    fn append(&self, record: &JournalRecord) -> Result<(), JournalError>;

    /// Read records starting from the given sequence number.
    ///
    /// Returns an iterator that yields records in sequence order, starting
    /// from `sequence` (inclusive). If `sequence` is beyond the last
    /// written entry, the iterator is empty.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] if the segment files cannot be opened or
    /// the starting position cannot be located.
    fn read_from(&self, sequence: u64) -> Result<JournalReadIter, JournalError>;

    /// Returns the sequence number of the last entry in the journal.
    ///
    /// Returns `None` if the journal is empty.
    #[must_use]
    fn last_sequence(&self) -> Option<u64>;

    /// Verify the integrity of the entire journal by checking every entry's
    /// CRC32 checksum.
    ///
    /// # Errors
    ///
    /// Returns the first [`JournalError::CorruptEntry`] encountered, or an
    /// I/O error if segment files cannot be read.
    fn verify_integrity(&self) -> Result<(), JournalError>;
}
