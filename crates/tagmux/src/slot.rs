//! One reservation station: a four-state machine owning one in-flight
//! request, a one-deep input buffer and a one-deep output buffer, bound to a
//! single fixed tag.
//!
//! The transition function runs once per logical step, driven by the pool.
//! Inputs are resolved from the previous step's committed state; whatever a
//! slot cannot progress on this step it simply re-evaluates next step.
//!
//! Two bypass paths skip a buffering state when the receiving side happens
//! to be ready in the same step the data shows up: a fresh producer request
//! can go straight to the engine (Accepting to WaitOut), and a completion
//! can go straight to the consumer (WaitOut to Accepting). Both are pure
//! latency savings and deliver payloads identical to the buffered paths.

use crate::engine::Engine;
use crate::port::{Request, Response, Tag};

/// Where a slot sits in its request/response cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Ready for a producer request.
    Accepting,
    /// Holding a buffered request, waiting to win arbitration.
    Accepted,
    /// Request admitted, awaiting the matching completion.
    WaitOut,
    /// Holding a buffered response, waiting for the consumer to drain it.
    SendOn,
}

/// One step's resolved inputs for a single slot.
pub(crate) struct SlotInputs<T> {
    /// Producer payload, present only when the handshake fired this step.
    pub offer: Option<T>,
    /// Arbitration selected this slot and the admission gate is open.
    pub granted: bool,
    /// Completion payload routed to this slot's tag.
    pub completion: Option<T>,
    /// Consumer asserted ready this step.
    pub consumer_ready: bool,
}

/// What a slot did this step, for the pool's report and counters.
pub(crate) struct SlotEffects<T> {
    pub accepted_offer: bool,
    pub admitted: bool,
    pub refused: bool,
    pub buffered: bool,
    pub delivery: Option<Response<T>>,
}

impl<T> Default for SlotEffects<T> {
    fn default() -> Self {
        Self {
            accepted_offer: false,
            admitted: false,
            refused: false,
            buffered: false,
            delivery: None,
        }
    }
}

pub(crate) struct Slot<T> {
    tag: Tag,
    state: SlotState,
    reserved: bool,
    sent: bool,
    wait: bool,
    input_buffer: Option<T>,
    output_buffer: Option<T>,
}

impl<T> Slot<T> {
    pub(crate) fn new(tag: Tag) -> Self {
        Self {
            tag,
            state: SlotState::Accepting,
            reserved: false,
            sent: false,
            wait: false,
            input_buffer: None,
            output_buffer: None,
        }
    }

    pub(crate) fn tag(&self) -> Tag {
        self.tag
    }

    pub(crate) fn state(&self) -> SlotState {
        self.state
    }

    /// Producer handshake: ready exactly while Accepting.
    pub(crate) fn producer_ready(&self) -> bool {
        self.state == SlotState::Accepting && !self.reserved
    }

    /// Candidate for arbitration: holds a request not yet sent.
    pub(crate) fn has_pending_request(&self) -> bool {
        self.reserved && !self.sent
    }

    /// Holds an undelivered response (counts toward the admission gate).
    pub(crate) fn is_waiting(&self) -> bool {
        self.wait
    }

    fn send<E: Engine<T>>(
        &mut self,
        payload: T,
        engine: &mut E,
        effects: &mut SlotEffects<T>,
    ) {
        match engine.try_admit(Request {
            tag: self.tag,
            payload,
        }) {
            Ok(()) => {
                self.sent = true;
                self.state = SlotState::WaitOut;
                effects.admitted = true;
                tracing::trace!(tag = %self.tag, "Request admitted");
            }
            Err(request) => {
                // Engine refused. The request is ours now (the handshake
                // completed), so it parks in the input buffer for a retry.
                self.input_buffer = Some(request.payload);
                self.state = SlotState::Accepted;
                effects.refused = true;
                tracing::trace!(tag = %self.tag, "Admission refused, holding request");
            }
        }
    }

    fn deliver(&mut self, payload: T, effects: &mut SlotEffects<T>) {
        self.reserved = false;
        self.sent = false;
        self.wait = false;
        self.state = SlotState::Accepting;
        effects.delivery = Some(Response {
            tag: self.tag,
            payload,
        });
        tracing::trace!(tag = %self.tag, "Response delivered");
    }

    /// Run one step of the state machine.
    pub(crate) fn step<E: Engine<T>>(
        &mut self,
        inputs: SlotInputs<T>,
        engine: &mut E,
    ) -> SlotEffects<T> {
        let mut effects = SlotEffects::default();

        match self.state {
            SlotState::Accepting => {
                if let Some(payload) = inputs.offer {
                    self.reserved = true;
                    effects.accepted_offer = true;
                    if inputs.granted {
                        // Bypass: straight to the engine, no buffering step.
                        self.send(payload, engine, &mut effects);
                    } else {
                        self.input_buffer = Some(payload);
                        self.state = SlotState::Accepted;
                    }
                }
            }
            SlotState::Accepted => {
                if inputs.granted
                    && let Some(payload) = self.input_buffer.take()
                {
                    self.send(payload, engine, &mut effects);
                }
            }
            SlotState::WaitOut => {
                if let Some(payload) = inputs.completion {
                    if inputs.consumer_ready {
                        // Bypass: straight to the consumer.
                        self.deliver(payload, &mut effects);
                    } else {
                        self.output_buffer = Some(payload);
                        self.wait = true;
                        self.state = SlotState::SendOn;
                        effects.buffered = true;
                        tracing::trace!(tag = %self.tag, "Consumer not ready, buffering response");
                    }
                }
            }
            SlotState::SendOn => {
                if inputs.consumer_ready
                    && let Some(payload) = self.output_buffer.take()
                {
                    self.deliver(payload, &mut effects);
                }
            }
        }

        effects
    }
}
