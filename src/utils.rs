//! Small process-wide helpers shared across modules.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as Unix epoch milliseconds.
///
/// Used to stamp journal records and emitted events; commands that carry
/// their own `now` (e.g. `Tick`) take precedence over this for
/// reproducibility in tests.
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
