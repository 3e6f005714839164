//! Depth-bounded, anonymized book snapshots with an integrity checksum.
//!
//! An aggregated per-level view plus a checksum wrapper. A level exposes
//! only `price`, `total_qty`, and `order_count`, never individual order
//! ids or owners.

use crate::decimal::Decimal;
use crate::orderbook::book::Book;
use crate::orderbook::order::Side;
use crate::orderbook::sequencer::{EngineEvent, EventPayload, SnapshotLevel};
use sha2::{Digest, Sha256};

/// A point-in-time, anonymized view of one pair's book.
#[derive(Debug, Clone)]
pub struct BookSnapshot {
    /// The pair this snapshot covers.
    pub pair: String,
    /// The book's sequence counter at the moment of the snapshot.
    pub seq: u64,
    /// Aggregated bid levels, best first, at most `depth` entries.
    pub bids: Vec<SnapshotLevel>,
    /// Aggregated ask levels, best first, at most `depth` entries.
    pub asks: Vec<SnapshotLevel>,
    /// Most recent trade price, if any.
    pub last_price: Option<Decimal>,
    /// Number of levels requested per side (the actual vectors may be
    /// shorter if a side has fewer than `depth` levels).
    pub depth: usize,
    /// SHA-256 hex digest over the levels and last price, so a consumer
    /// can detect a corrupted or tampered snapshot in transit.
    pub checksum: String,
}

/// Take a depth-bounded snapshot of `book`.
pub fn take(book: &Book, depth: usize) -> BookSnapshot {
    let bids = levels(book.ladder(Side::Buy), depth);
    let asks = levels(book.ladder(Side::Sell), depth);
    let last_price = book.last_trade_price();
    let checksum = checksum_of(&bids, &asks, last_price);
    BookSnapshot {
        pair: book.pair.clone(),
        seq: book.current_seq(),
        bids,
        asks,
        last_price,
        depth,
        checksum,
    }
}

fn levels(ladder: &crate::orderbook::ladder::Ladder, depth: usize) -> Vec<SnapshotLevel> {
    ladder
        .iterate_from_best()
        .take(depth)
        .map(|level| SnapshotLevel {
            price: level.price(),
            total_qty: level.total_qty(),
            order_count: level.order_count(),
        })
        .collect()
}

fn checksum_of(bids: &[SnapshotLevel], asks: &[SnapshotLevel], last_price: Option<Decimal>) -> String {
    let mut hasher = Sha256::new();
    for level in bids.iter().chain(asks.iter()) {
        hasher.update(level.price.to_canonical_string().as_bytes());
        hasher.update(b"|");
        hasher.update(level.total_qty.to_canonical_string().as_bytes());
        hasher.update(b"|");
        hasher.update(level.order_count.to_le_bytes());
    }
    if let Some(price) = last_price {
        hasher.update(price.to_canonical_string().as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

impl BookSnapshot {
    /// Wrap this snapshot as an [`EngineEvent`] ready for publication on
    /// the event bus, stamped with `seq`/`ts` from the snapshot request
    /// (snapshots are published out-of-band from the matcher's own
    /// sequence so they never consume a pair's event sequence number).
    pub fn into_event(self, seq: u64, ts: u64) -> EngineEvent {
        EngineEvent {
            pair: self.pair,
            seq,
            ts,
            payload: EventPayload::BookSnapshot {
                bids: self.bids,
                asks: self.asks,
                last_price: self.last_price,
                depth: self.depth,
            },
        }
    }
}
