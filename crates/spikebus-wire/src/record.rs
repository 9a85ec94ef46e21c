//! Fixed-size neuron record codec
//!
//! Layout (little-endian, 256 bytes total):
//!
//! ```text
//! offset  size  field
//!      0     4  global_id
//!      4     4  potential (f32)
//!      8     4  threshold (f32)
//!     12     4  leak_rate (f32)
//!     16     4  refractory_ticks
//!     20     4  last_spike_tick (NEVER_SPIKED if the neuron has not fired)
//!     24     4  synapse_count
//!     28     4  flags
//!     32   224  packed synapse entries (count used, rest zero)
//! ```

use crate::{
    error::{Result, WireError},
    ids::{GlobalId, LocalId},
    synapse::{SynapseEntry, SYNAPSE_SIZE},
};

/// Total size of one encoded neuron record in bytes
pub const RECORD_SIZE: usize = 256;

/// Size of the fixed-field header preceding the synapse list
pub const HEADER_SIZE: usize = 32;

/// Maximum synapses a record can embed. Derived from the record layout:
/// the 256-byte total is the hard constraint, capacity follows from it.
pub const SYNAPSE_CAPACITY: usize = (RECORD_SIZE - HEADER_SIZE) / SYNAPSE_SIZE;

/// Sentinel for a neuron that has never fired
pub const NEVER_SPIKED: u32 = u32::MAX;

/// Decoded neuron record: LIF dynamics fields plus the embedded list of
/// incoming synapses.
#[derive(Debug, Clone, PartialEq)]
pub struct NeuronRecord {
    /// Cluster-wide address of this neuron
    pub global_id: GlobalId,
    /// Membrane potential
    pub potential: f32,
    /// Firing threshold
    pub threshold: f32,
    /// Exponential leak coefficient (per-tick decay exponent)
    pub leak_rate: f32,
    /// Refractory duration in simulation ticks
    pub refractory_ticks: u32,
    /// Tick of the last emitted spike, or [`NEVER_SPIKED`]
    pub last_spike_tick: u32,
    /// Reserved flag bits
    pub flags: u32,
    synapses: Vec<SynapseEntry>,
}

impl NeuronRecord {
    /// Create a record at rest with no synapses
    pub fn new(global_id: GlobalId, threshold: f32, leak_rate: f32, refractory_ticks: u32) -> Self {
        Self {
            global_id,
            potential: 0.0,
            threshold,
            leak_rate,
            refractory_ticks,
            last_spike_tick: NEVER_SPIKED,
            flags: 0,
            synapses: Vec::new(),
        }
    }

    /// Local index of this neuron within its owning node
    pub fn local_id(&self) -> LocalId {
        self.global_id.local()
    }

    /// Incoming synapses
    pub fn synapses(&self) -> &[SynapseEntry] {
        &self.synapses
    }

    /// Mutable access to the incoming synapses (weights only change; the
    /// list shape is fixed at load time)
    pub fn synapses_mut(&mut self) -> &mut [SynapseEntry] {
        &mut self.synapses
    }

    /// Number of incoming synapses
    pub fn synapse_count(&self) -> u32 {
        self.synapses.len() as u32
    }

    /// Append an incoming synapse, enforcing the embedded capacity
    pub fn add_synapse(&mut self, entry: SynapseEntry) -> Result<()> {
        if self.synapses.len() >= SYNAPSE_CAPACITY {
            return Err(WireError::SynapseOverflow {
                count: self.synapses.len() as u32 + 1,
                capacity: SYNAPSE_CAPACITY as u32,
            });
        }
        self.synapses.push(entry);
        Ok(())
    }

    /// Encode into the fixed wire layout. Synapse weights are quantized to
    /// the 8-bit grid as part of packing.
    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut bytes = [0u8; RECORD_SIZE];
        bytes[0..4].copy_from_slice(&self.global_id.raw().to_le_bytes());
        bytes[4..8].copy_from_slice(&self.potential.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.threshold.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.leak_rate.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.refractory_ticks.to_le_bytes());
        bytes[20..24].copy_from_slice(&self.last_spike_tick.to_le_bytes());
        bytes[24..28].copy_from_slice(&self.synapse_count().to_le_bytes());
        bytes[28..32].copy_from_slice(&self.flags.to_le_bytes());

        for (i, synapse) in self.synapses.iter().enumerate() {
            let offset = HEADER_SIZE + i * SYNAPSE_SIZE;
            bytes[offset..offset + SYNAPSE_SIZE].copy_from_slice(&synapse.pack().to_le_bytes());
        }
        bytes
    }

    /// Decode from wire bytes, validating length, synapse count, and that
    /// every dynamics field is finite. Never partially applies.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < RECORD_SIZE {
            return Err(WireError::TruncatedRecord {
                needed: RECORD_SIZE,
                got: bytes.len(),
            });
        }

        let global_id = GlobalId::from_raw(read_u32(bytes, 0))?;
        let potential = f32::from_le_bytes(bytes[4..8].try_into().unwrap());
        let threshold = f32::from_le_bytes(bytes[8..12].try_into().unwrap());
        let leak_rate = f32::from_le_bytes(bytes[12..16].try_into().unwrap());
        let refractory_ticks = read_u32(bytes, 16);
        let last_spike_tick = read_u32(bytes, 20);
        let count = read_u32(bytes, 24);
        let flags = read_u32(bytes, 28);

        if count as usize > SYNAPSE_CAPACITY {
            return Err(WireError::SynapseOverflow {
                count,
                capacity: SYNAPSE_CAPACITY as u32,
            });
        }
        if !potential.is_finite() {
            return Err(WireError::NonFiniteField { field: "potential" });
        }
        if !threshold.is_finite() {
            return Err(WireError::NonFiniteField { field: "threshold" });
        }
        if !leak_rate.is_finite() {
            return Err(WireError::NonFiniteField { field: "leak_rate" });
        }

        let mut synapses = Vec::with_capacity(count as usize);
        for i in 0..count as usize {
            let offset = HEADER_SIZE + i * SYNAPSE_SIZE;
            let word = u32::from_le_bytes(bytes[offset..offset + SYNAPSE_SIZE].try_into().unwrap());
            synapses.push(SynapseEntry::unpack(word));
        }

        Ok(Self {
            global_id,
            potential,
            threshold,
            leak_rate,
            refractory_ticks,
            last_spike_tick,
            flags,
            synapses,
        })
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}
