//! Engine and per-pair configuration.
//!
//! Dedicated, `serde`-serializable config structs rather than scattered
//! `Option<u64>` fields set one at a time. No bespoke config-file parser is
//! introduced: a deployment loads these from JSON via `serde_json`, the same
//! way snapshot and journal payloads are (de)serialized.

use crate::decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Per-pair trading parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairConfig {
    /// Trading symbol, e.g. `BTC-USD`.
    pub pair: String,
    /// Minimum price increment. Order prices must be an exact multiple.
    pub tick_size: Decimal,
    /// Minimum quantity increment. Order quantities must be an exact
    /// multiple.
    pub lot_size: Decimal,
    /// Minimum order quantity.
    pub min_qty: Decimal,
    /// Fractional digits used for this pair's prices.
    pub price_scale: u8,
    /// Fractional digits used for this pair's quantities.
    pub qty_scale: u8,
}

impl PairConfig {
    /// Construct a pair configuration. `tick_size`/`lot_size`/`min_qty` are
    /// parsed as canonical decimal literals and rescaled to the given
    /// scales.
    pub fn new(
        pair: impl Into<String>,
        tick_size: &str,
        lot_size: &str,
        min_qty: &str,
        price_scale: u8,
        qty_scale: u8,
    ) -> Result<Self, crate::decimal::DecimalError> {
        Ok(Self {
            pair: pair.into(),
            tick_size: Decimal::parse_with_scale(tick_size, price_scale)?,
            lot_size: Decimal::parse_with_scale(lot_size, qty_scale)?,
            min_qty: Decimal::parse_with_scale(min_qty, qty_scale)?,
            price_scale,
            qty_scale,
        })
    }

    /// `true` if `price` is a non-negative exact multiple of `tick_size`.
    pub fn price_conforms(&self, price: &Decimal) -> bool {
        if self.tick_size.is_zero() {
            return true;
        }
        let price = price.rescale(self.price_scale).ok();
        match price {
            Some(p) if p.units() >= 0 => p.units() % self.tick_size.units() == 0,
            _ => false,
        }
    }

    /// `true` if `qty` is a positive exact multiple of `lot_size` and at
    /// least `min_qty`.
    pub fn qty_conforms(&self, qty: &Decimal) -> bool {
        if qty.units() <= 0 {
            return false;
        }
        let qty = match qty.rescale(self.qty_scale) {
            Ok(q) => q,
            Err(_) => return false,
        };
        if qty < self.min_qty {
            return false;
        }
        self.lot_size.is_zero() || qty.units() % self.lot_size.units() == 0
    }
}

/// How aggressively the journal flushes writes to durable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JournalSyncMode {
    /// Flush after every appended record.
    #[default]
    PerRecord,
    /// Buffer a bounded number of records between flushes.
    Batched {
        /// Number of records to buffer before an implicit flush.
        batch_size: usize,
    },
}

/// Engine-wide configuration, shared across all pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of price levels per side included in a book snapshot.
    pub snapshot_depth: usize,
    /// Hard cap on stop-trigger cascade iterations per command; exceeding
    /// it is an `InvariantViolation` that halts the pair.
    pub max_cascade_iterations: u32,
    /// Bounded command-queue capacity per pair.
    pub command_queue_capacity: usize,
    /// Journal durability mode.
    pub journal_sync_mode: JournalSyncMode,
    /// How often a pair's matcher task publishes an unsolicited
    /// [`crate::orderbook::BookSnapshot`] on the event bus, in
    /// milliseconds. `0` disables periodic snapshots; on-demand snapshots
    /// via [`crate::orderbook::snapshot::take`] are unaffected.
    pub snapshot_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            snapshot_depth: 20,
            max_cascade_iterations: 1024,
            command_queue_capacity: 4096,
            journal_sync_mode: JournalSyncMode::PerRecord,
            snapshot_interval_ms: 1000,
        }
    }
}
