//! Aggregator for the engine's focused unit-test modules, mirroring the
//! teacher's `tests/unit/mod.rs` layout (one file per concern, declared
//! here rather than discovered as separate test binaries).

mod decimal_invariants;
mod fifo_priority;
mod stop_cascade;
mod quantity_conservation;
