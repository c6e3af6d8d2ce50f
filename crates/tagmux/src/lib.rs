//! tagmux: a reservation-slot scheduler for a shared pipelined engine.
//!
//! N fixed slots each own one in-flight request, a producer port and a
//! consumer port, all bound to a static tag equal to the slot's index. A
//! priority arbiter offers one winner per step (or K with multiple admit
//! lanes) to the engine, completions fan back out by tag, and an admission
//! gate holds new work back while too many responses sit undelivered.
//!
//! The sync core ([`SlotPool`]) is a deterministic tick machine. The async
//! front ([`Runtime`]) wraps it in one owning task and exposes per-slot
//! call handles. The bridge runs the engine behind a byte stream.

pub mod arbiter;
pub mod bridge;
mod config;
mod engine;
mod error;
mod gate;
mod pool;
mod port;
pub mod runtime;
mod slot;

pub use arbiter::{Arbiter, Grant, MultiArbiter, MultiGrant};
pub use bridge::remote::{RemoteEngine, Stage, serve_engine};
pub use config::{MAX_SLOTS, PoolConfig, RuntimeConfig};
pub use engine::{Engine, PipelineEngine};
pub use error::{BridgeError, ConfigError, PoolError, TagViolationReason};
pub use pool::{PoolStats, SlotPool, StepReport};
pub use port::{Request, Response, Tag};
pub use runtime::{Runtime, RuntimeError, SlotHandle};
pub use slot::SlotState;
