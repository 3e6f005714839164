//! Engine error types.
//!
//! Hand-rolled `Display`/`Error` impls rather than a `thiserror` derive.

use crate::decimal::DecimalError;
use crate::orderbook::sequencer::JournalError;
use std::fmt;

/// Errors that can occur while processing a command against a `Book`.
#[derive(Debug)]
#[non_exhaustive]
pub enum EngineError {
    /// Malformed command: bad decimal literal, missing required field for
    /// the order's `kind`/`time_in_force`.
    Validation {
        /// Human-readable detail.
        detail: String,
    },

    /// Price/qty failed tick, lot, or min-qty validation for the pair.
    PolicyViolation {
        /// Human-readable detail.
        detail: String,
    },

    /// Unknown or disabled trading pair.
    UnknownPair {
        /// The pair symbol that was rejected.
        pair: String,
    },

    /// Cancel/Modify referenced an order that does not exist, or is
    /// already in a terminal state.
    NotFound {
        /// The order identifier that was not found.
        order_id: String,
    },

    /// Cancel/Modify referenced an order owned by a different user.
    Unauthorized {
        /// The order identifier.
        order_id: String,
    },

    /// FOK could not be filled in full; no state was mutated.
    FillOrKillRejected,

    /// The per-pair command queue is full.
    Backpressure {
        /// The pair whose queue is full.
        pair: String,
    },

    /// A decimal arithmetic operation overflowed. Fatal for the pair.
    ArithmeticOverflow(DecimalError),

    /// A book invariant was violated (e.g. the stop cascade exceeded
    /// `max_cascade_iterations`). Fatal for the pair.
    InvariantViolation {
        /// Human-readable detail.
        detail: String,
    },

    /// The journal failed to durably persist a command or event. Fatal for
    /// the pair.
    JournalWriteFailure(JournalError),

    /// The engine is shutting down; the pair is draining or has drained.
    Shutdown,
}

impl EngineError {
    /// `true` for the error kinds that are fatal and halt the owning pair
    /// (§7: `ArithmeticOverflow` / `InvariantViolation` / `JournalWriteFailure`).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::ArithmeticOverflow(_)
                | EngineError::InvariantViolation { .. }
                | EngineError::JournalWriteFailure(_)
        )
    }

    /// A stable, machine-readable reason code for reject events.
    pub fn reason_code(&self) -> &'static str {
        match self {
            EngineError::Validation { .. } => "VALIDATION_ERROR",
            EngineError::PolicyViolation { .. } => "POLICY_VIOLATION",
            EngineError::UnknownPair { .. } => "UNKNOWN_PAIR",
            EngineError::NotFound { .. } => "NOT_FOUND",
            EngineError::Unauthorized { .. } => "UNAUTHORIZED",
            EngineError::FillOrKillRejected => "FILL_OR_KILL_REJECTED",
            EngineError::Backpressure { .. } => "BACKPRESSURE",
            EngineError::ArithmeticOverflow(_) => "ARITHMETIC_OVERFLOW",
            EngineError::InvariantViolation { .. } => "INVARIANT_VIOLATION",
            EngineError::JournalWriteFailure(_) => "JOURNAL_WRITE_FAILURE",
            EngineError::Shutdown => "SHUTDOWN",
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Validation { detail } => write!(f, "validation error: {detail}"),
            EngineError::PolicyViolation { detail } => write!(f, "policy violation: {detail}"),
            EngineError::UnknownPair { pair } => write!(f, "unknown pair: {pair}"),
            EngineError::NotFound { order_id } => write!(f, "order not found: {order_id}"),
            EngineError::Unauthorized { order_id } => {
                write!(f, "not authorized for order: {order_id}")
            }
            EngineError::FillOrKillRejected => {
                write!(f, "fill-or-kill order could not be filled in full")
            }
            EngineError::Backpressure { pair } => write!(f, "command queue full for pair {pair}"),
            EngineError::ArithmeticOverflow(err) => write!(f, "arithmetic overflow: {err}"),
            EngineError::InvariantViolation { detail } => {
                write!(f, "invariant violation: {detail}")
            }
            EngineError::JournalWriteFailure(err) => write!(f, "journal write failure: {err}"),
            EngineError::Shutdown => write!(f, "engine is shutting down"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<DecimalError> for EngineError {
    fn from(err: DecimalError) -> Self {
        EngineError::ArithmeticOverflow(err)
    }
}

impl From<JournalError> for EngineError {
    fn from(err: JournalError) -> Self {
        EngineError::JournalWriteFailure(err)
    }
}
