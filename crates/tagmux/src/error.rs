//! Typed errors, one enum per layer.

use crate::port::Tag;

/// Construction-time validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("pool must have at least one slot")]
    ZeroSlots,

    #[error("pool supports at most {max} slots, got {got}")]
    TooManySlots { got: usize, max: usize },

    #[error("admit lanes must be in 1..={num_slots}, got {lanes}")]
    InvalidLanes { lanes: usize, num_slots: usize },
}

/// Contract violations surfaced by [`SlotPool::step`](crate::SlotPool::step).
///
/// Admission refusal and absence of progress are not errors; they are
/// handled inside the state machines by state retention.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// The engine broke the tag contract. With `fail_fast` disabled the
    /// offending completion is logged and dropped instead.
    #[error("tag violation on tag {tag}: {reason}")]
    TagViolation { tag: Tag, reason: TagViolationReason },

    /// Caller wired the wrong number of producer or consumer ports.
    #[error("port width mismatch: pool has {expected} slots, caller wired {got}")]
    PortWidth { expected: usize, got: usize },
}

/// Why a completion failed tag validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagViolationReason {
    /// Tag outside 0..N.
    UnknownTag,
    /// The slot has no request in flight.
    NoRequestInFlight,
    /// The slot's outstanding request was already completed.
    DuplicateCompletion,
}

impl std::fmt::Display for TagViolationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Self::UnknownTag => "no slot with this tag",
            Self::NoRequestInFlight => "no request in flight",
            Self::DuplicateCompletion => "request already completed",
        };
        f.write_str(reason)
    }
}

/// Failures on the byte-stream boundary to a remote engine.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("engine stream i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("engine stream closed")]
    Closed,
}
