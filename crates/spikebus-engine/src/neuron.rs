//! Leaky integrate-and-fire dynamics over cached neuron records
//!
//! The engine sweeps only neurons with pending input each tick (leak can
//! never push a potential *up* through threshold, so idle neurons cannot
//! fire). To keep the decay mathematically equivalent to a per-tick sweep,
//! each neuron tracks when it was last leaked and catches up on the skipped
//! ticks at its next visit.

use spikebus_wire::{LocalId, NeuronRecord, NEVER_SPIKED};
use std::collections::HashMap;

/// Per-neuron leak bookkeeping for the lazy-sweep optimization
#[derive(Debug)]
pub struct LeakClock {
    dt_ms: f32,
    last_leaked: HashMap<LocalId, u32>,
}

impl LeakClock {
    /// Create a clock for a simulation with `dt_ms` milliseconds per tick
    pub fn new(dt_ms: f32) -> Self {
        Self {
            dt_ms,
            last_leaked: HashMap::new(),
        }
    }

    /// Apply exponential leak to `record` for every tick elapsed since its
    /// last visit: `potential *= exp(-leak_rate * dt)` per tick. The
    /// potential is forced back to a finite value if the arithmetic ever
    /// degenerates, so no update can poison the record.
    pub fn advance(&mut self, id: LocalId, record: &mut NeuronRecord, now: u32) {
        let last = *self.last_leaked.get(&id).unwrap_or(&now);
        let elapsed = now.saturating_sub(last);
        if elapsed > 0 && record.potential != 0.0 {
            let decay = (-record.leak_rate * self.dt_ms * elapsed as f32).exp();
            record.potential *= decay;
        }
        if !record.potential.is_finite() {
            log::warn!("Non-finite potential on {}, resetting to 0", record.global_id);
            record.potential = 0.0;
        }
        self.last_leaked.insert(id, now);
    }

    /// Forget all bookkeeping (after a table load)
    pub fn clear(&mut self) {
        self.last_leaked.clear();
    }
}

/// Whether the neuron is still inside its refractory window at `now`
pub fn is_refractory(record: &NeuronRecord, now: u32) -> bool {
    if record.last_spike_tick == NEVER_SPIKED {
        return false;
    }
    now.saturating_sub(record.last_spike_tick) < record.refractory_ticks
}

/// Threshold check with refractory enforcement. On a fire the potential is
/// reset to zero and the spike tick recorded; returns whether it fired.
pub fn try_fire(record: &mut NeuronRecord, now: u32) -> bool {
    if record.potential >= record.threshold && !is_refractory(record, now) {
        record.potential = 0.0;
        record.last_spike_tick = now;
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spikebus_wire::{GlobalId, NodeId};

    fn record(threshold: f32, leak: f32, refractory: u32) -> NeuronRecord {
        NeuronRecord::new(
            GlobalId::new(NodeId::new(0), LocalId::new(0)),
            threshold,
            leak,
            refractory,
        )
    }

    #[test]
    fn test_leak_decays_potential() {
        let mut clock = LeakClock::new(1.0);
        let mut rec = record(1.0, 0.1, 0);
        rec.potential = 1.0;

        clock.advance(LocalId::new(0), &mut rec, 10);
        assert_eq!(rec.potential, 1.0); // first visit, no elapsed ticks

        clock.advance(LocalId::new(0), &mut rec, 15);
        let expected = (-0.1f32 * 5.0).exp();
        assert!((rec.potential - expected).abs() < 1e-6);
    }

    #[test]
    fn test_lazy_leak_matches_per_tick_sweep() {
        let mut lazy = LeakClock::new(1.0);
        let mut eager = LeakClock::new(1.0);
        let mut a = record(10.0, 0.2, 0);
        let mut b = a.clone();
        a.potential = 2.0;
        b.potential = 2.0;

        lazy.advance(LocalId::new(0), &mut a, 0);
        eager.advance(LocalId::new(0), &mut b, 0);
        // One catch-up visit against a visit every tick
        lazy.advance(LocalId::new(0), &mut a, 8);
        for t in 1..=8 {
            eager.advance(LocalId::new(0), &mut b, t);
        }
        assert!((a.potential - b.potential).abs() < 1e-5);
    }

    #[test]
    fn test_non_finite_potential_recovered() {
        let mut clock = LeakClock::new(1.0);
        let mut rec = record(1.0, 0.1, 0);
        rec.potential = f32::INFINITY;
        clock.advance(LocalId::new(0), &mut rec, 1);
        assert_eq!(rec.potential, 0.0);
    }

    #[test]
    fn test_fire_resets_and_stamps() {
        let mut rec = record(1.0, 0.1, 3);
        rec.potential = 1.5;
        assert!(try_fire(&mut rec, 7));
        assert_eq!(rec.potential, 0.0);
        assert_eq!(rec.last_spike_tick, 7);
    }

    #[test]
    fn test_refractory_blocks_refire() {
        let mut rec = record(1.0, 0.1, 3);
        rec.potential = 1.5;
        assert!(try_fire(&mut rec, 10));

        rec.potential = 1.5;
        assert!(!try_fire(&mut rec, 11));
        assert!(!try_fire(&mut rec, 12));
        // Window elapsed
        assert!(try_fire(&mut rec, 13));
    }

    #[test]
    fn test_never_spiked_not_refractory() {
        let rec = record(1.0, 0.1, 100);
        assert!(!is_refractory(&rec, 0));
    }
}
