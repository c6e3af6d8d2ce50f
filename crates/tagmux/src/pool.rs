//! Fixed-size pool of reservation slots sharing one engine.
//!
//! The pool is a deterministic tick machine. Each [`SlotPool::step`] runs one
//! lock-step evaluation of all N slots: engine time advances, the admission
//! gate is checked against the wait flags committed last step, completions
//! are polled and routed by tag, arbitration grants up to K winners, and
//! every slot runs its transition function once. No allocation happens per
//! request; slots cycle through their states in place for the life of the
//! pool.

use crate::arbiter::MultiArbiter;
use crate::config::PoolConfig;
use crate::engine::Engine;
use crate::error::{ConfigError, PoolError, TagViolationReason};
use crate::gate::{AdmissionGate, GateDecision};
use crate::port::{Response, Tag};
use crate::slot::{Slot, SlotInputs, SlotState};

/// What happened during one step.
#[derive(Debug)]
pub struct StepReport<T> {
    /// Tags whose producer handshake fired this step.
    pub accepted: Vec<Tag>,
    /// Tags admitted to the engine this step.
    pub admitted: Vec<Tag>,
    /// Tags that won arbitration but were refused by the engine.
    pub refused: Vec<Tag>,
    /// Tags whose completion had to park in the output buffer.
    pub buffered: Vec<Tag>,
    /// Responses delivered to ready consumers this step.
    pub deliveries: Vec<Response<T>>,
    /// The admission gate blocked this step.
    pub gate_blocked: bool,
}

/// Cumulative counters across the pool's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub steps: u64,
    pub accepted: u64,
    pub admitted: u64,
    pub refused: u64,
    pub buffered: u64,
    pub delivered: u64,
    pub gate_blocked_steps: u64,
    pub dropped_completions: u64,
}

pub struct SlotPool<T, E> {
    slots: Vec<Slot<T>>,
    arbiter: MultiArbiter,
    gate: AdmissionGate,
    engine: E,
    fail_fast: bool,
    stats: PoolStats,
}

impl<T, E: Engine<T>> SlotPool<T, E> {
    pub fn new(config: PoolConfig, engine: E) -> Result<Self, ConfigError> {
        config.validate()?;
        let num_slots = config.num_slots();
        let lanes = config.admit_lanes();
        tracing::debug!(num_slots, admit_lanes = lanes, "Slot pool created");
        Ok(Self {
            slots: (0..num_slots).map(|i| Slot::new(Tag::new(i))).collect(),
            arbiter: MultiArbiter::new(lanes),
            gate: AdmissionGate::new(num_slots, lanes),
            engine,
            fail_fast: config.fail_fast(),
            stats: PoolStats::default(),
        })
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn admit_lanes(&self) -> usize {
        self.arbiter.lanes()
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Tear down the pool and hand the engine back.
    pub fn into_engine(self) -> E {
        self.engine
    }

    /// State of the slot bound to `tag`, if the tag is in range.
    pub fn slot_state(&self, tag: Tag) -> Option<SlotState> {
        self.slots.get(tag.index()).map(Slot::state)
    }

    /// Number of slots holding an undelivered response.
    pub fn waiting(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_waiting()).count()
    }

    /// True when every slot is back in Accepting with nothing in flight.
    pub fn is_idle(&self) -> bool {
        self.slots
            .iter()
            .all(|slot| slot.state() == SlotState::Accepting)
    }

    /// Execute one logical step.
    ///
    /// `offers` is one producer port per slot: an offer is taken exactly
    /// when its slot is ready (the handshake), otherwise it stays with the
    /// caller for a retry. `consumer_ready` is one consumer port per slot.
    ///
    /// Fails only on a broken caller wiring or, with `fail_fast` on, a tag
    /// violation at the completion boundary. After a tag violation the
    /// pool's state is unspecified; callers are expected to tear it down.
    pub fn step(
        &mut self,
        offers: &mut [Option<T>],
        consumer_ready: &[bool],
    ) -> Result<StepReport<T>, PoolError> {
        let num_slots = self.slots.len();
        if offers.len() != num_slots {
            return Err(PoolError::PortWidth {
                expected: num_slots,
                got: offers.len(),
            });
        }
        if consumer_ready.len() != num_slots {
            return Err(PoolError::PortWidth {
                expected: num_slots,
                got: consumer_ready.len(),
            });
        }

        self.engine.tick();
        self.stats.steps += 1;

        // Gate decision from the wait flags committed last step.
        let waiting = self.waiting();
        let gate_blocked = self.gate.check(waiting) == GateDecision::Blocked;
        if gate_blocked {
            self.stats.gate_blocked_steps += 1;
            tracing::trace!(waiting, "Admission gate blocked");
        }

        let completions = self.route_completions()?;

        // Candidates: a buffered request, or a fresh offer landing this step.
        let mut candidates = 0u64;
        for (i, slot) in self.slots.iter().enumerate() {
            let fresh = offers[i].is_some() && slot.producer_ready();
            if slot.has_pending_request() || fresh {
                candidates |= 1 << i;
            }
        }
        let granted = if gate_blocked {
            0
        } else {
            self.arbiter.pick(candidates).granted()
        };

        let mut report = StepReport {
            accepted: Vec::new(),
            admitted: Vec::new(),
            refused: Vec::new(),
            buffered: Vec::new(),
            deliveries: Vec::new(),
            gate_blocked,
        };

        let Self {
            slots,
            engine,
            stats,
            ..
        } = self;

        for (i, (slot, completion)) in slots.iter_mut().zip(completions).enumerate() {
            let offer = if slot.producer_ready() {
                offers[i].take()
            } else {
                None
            };
            let effects = slot.step(
                SlotInputs {
                    offer,
                    granted: granted & (1 << i) != 0,
                    completion,
                    consumer_ready: consumer_ready[i],
                },
                engine,
            );

            let tag = slot.tag();
            if effects.accepted_offer {
                report.accepted.push(tag);
                stats.accepted += 1;
            }
            if effects.admitted {
                report.admitted.push(tag);
                stats.admitted += 1;
            }
            if effects.refused {
                report.refused.push(tag);
                stats.refused += 1;
            }
            if effects.buffered {
                report.buffered.push(tag);
                stats.buffered += 1;
            }
            if let Some(delivery) = effects.delivery {
                report.deliveries.push(delivery);
                stats.delivered += 1;
            }
        }

        Ok(report)
    }

    /// Poll up to K completions and route each by tag, validating the tag
    /// contract at the boundary.
    fn route_completions(&mut self) -> Result<Vec<Option<T>>, PoolError> {
        let num_slots = self.slots.len();
        let mut routed: Vec<Option<T>> =
            std::iter::repeat_with(|| None).take(num_slots).collect();

        for _ in 0..self.arbiter.lanes() {
            let Some(response) = self.engine.poll_completion() else {
                break;
            };
            let tag = response.tag;

            let violation = if tag.index() >= num_slots {
                Some(TagViolationReason::UnknownTag)
            } else if routed[tag.index()].is_some() {
                Some(TagViolationReason::DuplicateCompletion)
            } else {
                match self.slots[tag.index()].state() {
                    SlotState::WaitOut => None,
                    SlotState::SendOn => Some(TagViolationReason::DuplicateCompletion),
                    SlotState::Accepting | SlotState::Accepted => {
                        Some(TagViolationReason::NoRequestInFlight)
                    }
                }
            };

            match violation {
                None => routed[tag.index()] = Some(response.payload),
                Some(reason) => {
                    if self.fail_fast {
                        return Err(PoolError::TagViolation { tag, reason });
                    }
                    tracing::warn!(%tag, %reason, "Dropping completion with bad tag");
                    self.stats.dropped_completions += 1;
                }
            }
        }

        Ok(routed)
    }
}
