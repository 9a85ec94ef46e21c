//! Multi-master bus arbitration
//!
//! On the shared parallel bus a node must observe the bus idle before
//! claiming it. When a collision is detected, the loser backs off for a
//! randomized, exponentially growing number of slots before retrying, which
//! keeps many simultaneously signaling nodes out of livelock. Point-to-point
//! fabrics do not need this; the in-process bus never constructs an arbiter.

use crate::error::{Result, TransportError};
use rand::{rngs::SmallRng, Rng, SeedableRng};

/// Arbitration tuning knobs
#[derive(Debug, Clone)]
pub struct ArbiterConfig {
    /// Consecutive idle slots that must be observed before claiming
    pub idle_window: u32,
    /// Backoff base in slots; attempt `n` waits up to `base << n` slots
    pub base_backoff: u32,
    /// Attempts before arbitration gives up
    pub max_attempts: u32,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            idle_window: 2,
            base_backoff: 4,
            max_attempts: 8,
        }
    }
}

impl ArbiterConfig {
    /// Create a validated configuration
    pub fn new(idle_window: u32, base_backoff: u32, max_attempts: u32) -> Result<Self> {
        // A zero base would make every backoff zero slots and reintroduce
        // the livelock the arbiter exists to break.
        if base_backoff == 0 {
            return Err(TransportError::invalid_parameter(
                "base_backoff",
                base_backoff.to_string(),
                "> 0",
            ));
        }
        if max_attempts == 0 {
            return Err(TransportError::invalid_parameter(
                "max_attempts",
                max_attempts.to_string(),
                "> 0",
            ));
        }
        Ok(Self {
            idle_window,
            base_backoff,
            max_attempts,
        })
    }
}

/// Per-node arbitration state
#[derive(Debug)]
pub struct BusArbiter {
    config: ArbiterConfig,
    attempt: u32,
    rng: SmallRng,
}

impl BusArbiter {
    /// Create an arbiter; the seed decorrelates backoff between nodes
    pub fn new(config: ArbiterConfig, seed: u64) -> Self {
        Self {
            config,
            attempt: 0,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Randomized backoff for the current attempt, in slots.
    ///
    /// Grows exponentially with each collision; fails with
    /// `ArbitrationTimeout` once the attempt cap is reached.
    pub fn backoff_slots(&mut self) -> Result<u32> {
        if self.attempt >= self.config.max_attempts {
            return Err(TransportError::ArbitrationTimeout {
                attempts: self.attempt,
            });
        }
        let ceiling = self
            .config
            .base_backoff
            .saturating_mul(1u32.checked_shl(self.attempt).unwrap_or(u32::MAX));
        self.attempt += 1;
        Ok(self.rng.gen_range(1..=ceiling.max(1)))
    }

    /// Forget collision history after a successful claim
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Attempt to claim the bus. `idle_probe` samples the bus state once per
    /// slot; the claim succeeds after `idle_window` consecutive idle slots.
    /// Returns the total slots spent waiting.
    pub fn acquire<F: FnMut() -> bool>(&mut self, mut idle_probe: F) -> Result<u32> {
        let mut waited = 0u32;
        loop {
            let mut idle_seen = 0;
            while idle_seen < self.config.idle_window {
                if idle_probe() {
                    idle_seen += 1;
                } else {
                    idle_seen = 0;
                    let slots = self.backoff_slots()?;
                    log::debug!("Bus busy, backing off {} slots (attempt {})", slots, self.attempt);
                    waited = waited.saturating_add(slots);
                    break;
                }
                waited = waited.saturating_add(1);
            }
            if idle_seen >= self.config.idle_window {
                self.reset();
                return Ok(waited);
            }
        }
    }
}
