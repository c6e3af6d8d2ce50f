//! Wire frames exchanged with a remote engine.
//!
//! The scheduler side sends `admit`, the engine side answers `complete`.
//! Tags cross the wire untouched; the engine-side handler must echo the tag
//! of every admit frame in exactly one complete frame.

use serde::{Deserialize, Serialize};

use crate::port::Tag;

/// One frame in either direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineFrame<T> {
    /// Scheduler to engine: one admitted request.
    Admit { tag: Tag, payload: T },

    /// Engine to scheduler: one finished completion.
    Complete { tag: Tag, payload: T },
}
