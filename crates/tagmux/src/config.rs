//! Builder-style configuration for the pool and the async runtime front.

use std::time::Duration;

use crate::error::ConfigError;

/// Candidate sets are u64 bitmasks, so a pool holds at most 64 slots.
pub const MAX_SLOTS: usize = 64;

/// Configuration for a [`SlotPool`](crate::SlotPool).
#[derive(Debug, Clone)]
pub struct PoolConfig {
    num_slots: usize,
    admit_lanes: usize,
    fail_fast: bool,
}

impl PoolConfig {
    pub fn new(num_slots: usize) -> Self {
        Self {
            num_slots,
            admit_lanes: 1,
            fail_fast: true,
        }
    }

    /// Number of admissions the engine may accept per step, `1..=num_slots`.
    pub fn with_admit_lanes(mut self, lanes: usize) -> Self {
        self.admit_lanes = lanes;
        self
    }

    /// Whether a tag violation fails the step (default) or is logged and the
    /// offending completion dropped.
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    pub fn admit_lanes(&self) -> usize {
        self.admit_lanes
    }

    pub fn fail_fast(&self) -> bool {
        self.fail_fast
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.num_slots == 0 {
            return Err(ConfigError::ZeroSlots);
        }
        if self.num_slots > MAX_SLOTS {
            return Err(ConfigError::TooManySlots {
                got: self.num_slots,
                max: MAX_SLOTS,
            });
        }
        if self.admit_lanes == 0 || self.admit_lanes > self.num_slots {
            return Err(ConfigError::InvalidLanes {
                lanes: self.admit_lanes,
                num_slots: self.num_slots,
            });
        }
        Ok(())
    }
}

/// Configuration for [`Runtime::spawn`](crate::Runtime::spawn).
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    tick_interval: Duration,
}

impl RuntimeConfig {
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_single_lane_fail_fast() {
        let config = PoolConfig::new(4);
        assert_eq!(config.admit_lanes(), 1);
        assert!(config.fail_fast());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_slots_rejected() {
        assert_eq!(
            PoolConfig::new(0).validate(),
            Err(ConfigError::ZeroSlots)
        );
    }

    #[test]
    fn slot_count_bounded_by_mask_width() {
        assert!(PoolConfig::new(MAX_SLOTS).validate().is_ok());
        assert_eq!(
            PoolConfig::new(MAX_SLOTS + 1).validate(),
            Err(ConfigError::TooManySlots {
                got: MAX_SLOTS + 1,
                max: MAX_SLOTS
            })
        );
    }

    #[test]
    fn lanes_bounded_by_slot_count() {
        assert!(PoolConfig::new(4).with_admit_lanes(4).validate().is_ok());
        assert!(PoolConfig::new(4).with_admit_lanes(0).validate().is_err());
        assert!(PoolConfig::new(4).with_admit_lanes(5).validate().is_err());
    }
}
