//! The boundary contract to the shared pipelined resource, plus an
//! in-process reference engine used by tests and demos.
//!
//! The engine is opaque to the scheduler. The only obligations it carries:
//! for every admitted `(tag, payload)` emit exactly one completion with the
//! same tag, and emit at most one completion per `poll_completion` call.
//! Completion order across different tags is unconstrained.

use std::collections::VecDeque;

use crate::port::{Request, Response};

/// Admission and completion interface of the shared engine.
///
/// Refusing an admission is a normal condition, not an error: the request is
/// handed back and the offering slot retries next step.
pub trait Engine<T> {
    /// Offer one request. `Err` returns the request untouched.
    fn try_admit(&mut self, request: Request<T>) -> Result<(), Request<T>>;

    /// Pull at most one finished completion.
    fn poll_completion(&mut self) -> Option<Response<T>>;

    /// Advance engine-internal time once per pool step. No-op for engines
    /// with no internal clock.
    fn tick(&mut self) {}
}

/// Reference engine: a depth-bounded pipeline with fixed completion latency
/// and a pluggable payload transform.
///
/// Completions come out head-of-line: a long-latency head entry holds back
/// later ones, which is within the engine contract since cross-tag order is
/// unconstrained. The canonical test engine is `identity(1)`.
pub struct PipelineEngine<T> {
    latency: u64,
    depth: usize,
    now: u64,
    queue: VecDeque<(u64, Request<T>)>,
    transform: Box<dyn FnMut(T) -> T + Send>,
}

impl<T> PipelineEngine<T> {
    /// Pass payloads through unchanged after `latency` steps.
    pub fn identity(latency: u64) -> Self {
        Self::with_transform(latency, |payload| payload)
    }

    pub fn with_transform(latency: u64, transform: impl FnMut(T) -> T + Send + 'static) -> Self {
        Self {
            latency,
            depth: usize::MAX,
            now: 0,
            queue: VecDeque::new(),
            transform: Box::new(transform),
        }
    }

    /// Bound the internal queue; admissions are refused while it is full.
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn in_flight(&self) -> usize {
        self.queue.len()
    }
}

impl<T> Engine<T> for PipelineEngine<T> {
    fn tick(&mut self) {
        self.now += 1;
    }

    fn try_admit(&mut self, request: Request<T>) -> Result<(), Request<T>> {
        if self.queue.len() >= self.depth {
            tracing::trace!(tag = %request.tag, depth = self.depth, "Pipeline full, refusing admission");
            return Err(request);
        }
        self.queue.push_back((self.now + self.latency, request));
        Ok(())
    }

    fn poll_completion(&mut self) -> Option<Response<T>> {
        let (ready_at, _) = self.queue.front()?;
        if *ready_at > self.now {
            return None;
        }
        let (_, request) = self.queue.pop_front()?;
        Some(Response {
            tag: request.tag,
            payload: (self.transform)(request.payload),
        })
    }
}
