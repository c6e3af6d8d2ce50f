//! Admission backpressure against the shared engine.
//!
//! One-buffer-per-tag flow control: admission is blocked once more than
//! N - K slots hold an undelivered response, which guarantees that any
//! completion the engine emits can be captured into some output buffer even
//! if the consumer side is momentarily not ready. For the default K = 1 this
//! is the classic rule of blocking only when every slot is parked in SendOn.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GateDecision {
    Open,
    Blocked,
}

pub(crate) struct AdmissionGate {
    num_slots: usize,
    lanes: usize,
}

impl AdmissionGate {
    pub(crate) fn new(num_slots: usize, lanes: usize) -> Self {
        Self { num_slots, lanes }
    }

    /// Decide from the wait flags committed last step.
    pub(crate) fn check(&self, waiting: usize) -> GateDecision {
        if waiting > self.num_slots - self.lanes {
            GateDecision::Blocked
        } else {
            GateDecision::Open
        }
    }
}
