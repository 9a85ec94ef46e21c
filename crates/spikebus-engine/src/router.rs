//! Spike routing: broadcast-and-filter
//!
//! The record format stores *incoming* synapses per neuron, so a firing
//! neuron does not know its fan-out. Every spike is therefore broadcast to
//! all nodes, and each node filters against its own neurons' source lists.
//! The filter side is served by an index built once at load time, mapping a
//! source address to the local neurons that listen to it; without it every
//! broadcast would force a full table scan through the cache.

use crate::{
    error::Result,
    neuron::LeakClock,
    stdp::StdpRule,
};
use spikebus_store::{BackingStore, NeuronCache};
use spikebus_transport::SpikeMessage;
use spikebus_wire::{GlobalId, LocalId, NodeId};
use std::collections::HashMap;

/// Routes spikes into a node's neuron partition
#[derive(Debug)]
pub struct SpikeRouter {
    node_id: NodeId,
    listeners: HashMap<GlobalId, Vec<LocalId>>,
}

impl SpikeRouter {
    /// Create a router for `node_id` with an empty index
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            listeners: HashMap::new(),
        }
    }

    /// The node this router serves
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Rebuild the source index by scanning the freshly loaded table.
    ///
    /// Runs directly against the store: this is a one-time full scan and
    /// must not flush the working set out of the cache.
    pub fn rebuild<S: BackingStore>(&mut self, store: &mut S) -> Result<()> {
        self.listeners.clear();
        for i in 0..store.len() {
            let local = LocalId::new(i as u16);
            let record = store.read(local)?;
            for synapse in record.synapses() {
                self.listeners.entry(synapse.source).or_default().push(local);
            }
        }
        log::debug!(
            "Rebuilt spike index on {}: {} distinct sources",
            self.node_id,
            self.listeners.len()
        );
        Ok(())
    }

    /// Local neurons with an incoming synapse from `source`
    pub fn listeners(&self, source: GlobalId) -> &[LocalId] {
        self.listeners.get(&source).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Apply one spike to every listening neuron: catch up leak, apply
    /// anti-causal STDP depression, then add the synapse weight to the
    /// cached potential. Returns the listeners touched; neurons without a
    /// matching synapse are never read, let alone written.
    pub fn apply_spike<S: BackingStore>(
        &self,
        cache: &mut NeuronCache<S>,
        stdp: &StdpRule,
        leak: &mut LeakClock,
        msg: &SpikeMessage,
        now: u32,
    ) -> Result<Vec<LocalId>> {
        let mut touched = Vec::new();
        for &local in self.listeners(msg.neuron) {
            let record = cache.get(local)?;
            leak.advance(local, record, now);
            stdp.on_pre_spike(record, msg.neuron, msg.tick);

            let weight: f32 = record
                .synapses()
                .iter()
                .filter(|s| s.source == msg.neuron)
                .map(|s| s.weight)
                .sum();
            record.potential += weight;
            if !record.potential.is_finite() {
                record.potential = 0.0;
            }
            cache.mark_dirty(local);
            touched.push(local);
        }
        Ok(touched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stdp::StdpParams;
    use proptest::prelude::*;
    use spikebus_store::MemoryBackingStore;
    use spikebus_wire::{NeuronRecord, SynapseEntry};

    fn gid(node: u8, local: u16) -> GlobalId {
        GlobalId::new(NodeId::new(node), LocalId::new(local))
    }

    /// Node 0 partition where neuron i listens to the sources in `edges[i]`
    fn build_cache(edges: &[Vec<(GlobalId, f32)>]) -> NeuronCache<MemoryBackingStore> {
        let mut bytes = Vec::new();
        for (i, sources) in edges.iter().enumerate() {
            let mut record = NeuronRecord::new(gid(0, i as u16), 1.0, 0.1, 2);
            for &(source, weight) in sources {
                record.add_synapse(SynapseEntry::quantized(source, weight)).unwrap();
            }
            bytes.extend_from_slice(&record.encode());
        }
        let mut cache =
            NeuronCache::new(MemoryBackingStore::new(edges.len() as u32), 8).unwrap();
        cache.bulk_load(&bytes, edges.len() as u32).unwrap();
        cache
    }

    fn fixture() -> (SpikeRouter, NeuronCache<MemoryBackingStore>, StdpRule, LeakClock) {
        let remote = gid(1, 5);
        let edges = vec![
            vec![(remote, 0.5)],           // neuron 0 listens to N1:L5
            vec![(gid(1, 6), 0.25)],       // neuron 1 listens to something else
            vec![],                        // neuron 2 listens to nothing
        ];
        let mut cache = build_cache(&edges);
        let mut router = SpikeRouter::new(NodeId::new(0));
        router.rebuild(cache.store_mut()).unwrap();
        let stdp = StdpRule::new(StdpParams::default(), 1.0).unwrap();
        (router, cache, stdp, LeakClock::new(1.0))
    }

    #[test]
    fn test_index_built_from_table() {
        let (router, _, _, _) = fixture();
        assert_eq!(router.listeners(gid(1, 5)), &[LocalId::new(0)]);
        assert_eq!(router.listeners(gid(1, 6)), &[LocalId::new(1)]);
        assert!(router.listeners(gid(9, 9)).is_empty());
    }

    #[test]
    fn test_spike_adds_weight_to_listener() {
        let (router, mut cache, stdp, mut leak) = fixture();
        let msg = SpikeMessage::new(gid(1, 5), 3, 0);

        let touched = router.apply_spike(&mut cache, &stdp, &mut leak, &msg, 3).unwrap();
        assert_eq!(touched, vec![LocalId::new(0)]);
        assert!((cache.get(LocalId::new(0)).unwrap().potential - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_spike_isolation() {
        let (router, mut cache, stdp, mut leak) = fixture();
        let msg = SpikeMessage::new(gid(1, 5), 3, 0);
        router.apply_spike(&mut cache, &stdp, &mut leak, &msg, 3).unwrap();

        // Non-listening neurons are untouched
        assert_eq!(cache.get(LocalId::new(1)).unwrap().potential, 0.0);
        assert_eq!(cache.get(LocalId::new(2)).unwrap().potential, 0.0);
    }

    #[test]
    fn test_unknown_source_touches_nothing() {
        let (router, mut cache, stdp, mut leak) = fixture();
        let msg = SpikeMessage::new(gid(7, 7), 3, 0);
        let touched = router.apply_spike(&mut cache, &stdp, &mut leak, &msg, 3).unwrap();
        assert!(touched.is_empty());
        assert_eq!(cache.stats().misses, 0);
    }

    proptest! {
        /// Over random topologies, a spike from source S only ever mutates
        /// neurons holding a synapse from S.
        #[test]
        fn prop_spike_isolation(
            topology in proptest::collection::vec(
                proptest::collection::vec((0u16..8, 0.1f32..1.0), 0..4),
                2..10,
            ),
            source_local in 0u16..8,
        ) {
            let edges: Vec<Vec<(GlobalId, f32)>> = topology
                .iter()
                .map(|sources| sources.iter().map(|&(l, w)| (gid(1, l), w)).collect())
                .collect();
            let mut cache = build_cache(&edges);
            let mut router = SpikeRouter::new(NodeId::new(0));
            router.rebuild(cache.store_mut()).unwrap();
            let stdp = StdpRule::new(StdpParams::default(), 1.0).unwrap();
            let mut leak = LeakClock::new(1.0);

            let source = gid(1, source_local);
            let msg = SpikeMessage::new(source, 1, 0);
            router.apply_spike(&mut cache, &stdp, &mut leak, &msg, 1).unwrap();

            for (i, sources) in edges.iter().enumerate() {
                let listens = sources.iter().any(|&(s, _)| s == source);
                let potential = cache.get(LocalId::new(i as u16)).unwrap().potential;
                if listens {
                    prop_assert!(potential > 0.0);
                } else {
                    prop_assert_eq!(potential, 0.0);
                }
            }
        }
    }
}
