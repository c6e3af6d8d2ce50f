//! Byte-stream bridge for running the engine in another process or thread.
//!
//! - **protocol**: the admit/complete frame types
//! - **codec**: length-delimited JSON framing
//! - **remote**: the client-side [`Engine`](crate::Engine) implementation
//!   and the engine-side serve loop

pub mod codec;
pub mod protocol;
pub mod remote;
