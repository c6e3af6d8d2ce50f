//! Priority arbitration over candidate slots.
//!
//! [`Arbiter`] grants the lowest-indexed member of a candidate set, one-hot.
//! [`MultiArbiter`] cascades K arbiters over one candidate set: each lane
//! masks out the grants of the lanes before it, so the K grants are mutually
//! exclusive and lane 0 always holds the highest-priority pick.
//!
//! Both are pure functions of the candidate mask, recomputed fresh every
//! step. Fixed ascending priority can starve high-index slots under
//! sustained low-index pressure; a winner self-removes from candidacy until
//! its response is delivered, which bounds the starvation window by that
//! slot's own round-trip latency.

/// One lane's grant: a one-hot mask plus an "any candidate existed" flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    pub mask: u64,
    pub any: bool,
}

impl Grant {
    /// Index of the granted slot, if any.
    pub fn index(&self) -> Option<usize> {
        self.any.then(|| self.mask.trailing_zeros() as usize)
    }
}

/// Stateless lowest-index-wins selector.
pub struct Arbiter;

impl Arbiter {
    /// Pick the lowest set bit of `candidates`.
    pub fn pick(candidates: u64) -> Grant {
        let mask = candidates & candidates.wrapping_neg();
        Grant {
            mask,
            any: mask != 0,
        }
    }
}

/// K cascaded arbiters producing up to K disjoint grants per step.
pub struct MultiArbiter {
    lanes: usize,
}

impl MultiArbiter {
    pub fn new(lanes: usize) -> Self {
        Self { lanes }
    }

    pub fn lanes(&self) -> usize {
        self.lanes
    }

    pub fn pick(&self, candidates: u64) -> MultiGrant {
        let mut lanes = Vec::with_capacity(self.lanes);
        let mut taken = 0u64;
        for _ in 0..self.lanes {
            let grant = Arbiter::pick(candidates & !taken);
            taken |= grant.mask;
            lanes.push(grant);
        }
        MultiGrant { lanes }
    }
}

/// The grants of all lanes for one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiGrant {
    lanes: Vec<Grant>,
}

impl MultiGrant {
    pub fn lanes(&self) -> &[Grant] {
        &self.lanes
    }

    /// Union of all lane grants.
    pub fn granted(&self) -> u64 {
        self.lanes.iter().fold(0, |mask, grant| mask | grant.mask)
    }

    /// Number of lanes that actually granted.
    pub fn count(&self) -> usize {
        self.lanes.iter().filter(|grant| grant.any).count()
    }
}
