//! Aggregate per-node counters
//!
//! The only interface the core exposes upward: the management layer queries
//! these by value. No serialization concepts live here.

use spikebus_store::CacheStats;

/// Counters describing one node's activity since its last table load
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EngineStats {
    /// Neurons deployed into the backing store
    pub neurons_loaded: u32,
    /// Timesteps executed
    pub steps_executed: u64,
    /// Spikes emitted by local neurons
    pub spikes_generated: u64,
    /// Spike messages accepted off the bus
    pub spikes_received: u64,
    /// Spikes dropped (unreachable peers, invalid targets)
    pub spikes_dropped: u64,
    /// Multi-frame transfers discarded (corrupt, stalled, out of sequence)
    pub transfers_discarded: u64,
    /// Cache behavior counters
    pub cache: CacheStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_zeroed() {
        let stats = EngineStats::default();
        assert_eq!(stats.spikes_generated, 0);
        assert_eq!(stats.cache.hits, 0);
    }
}
