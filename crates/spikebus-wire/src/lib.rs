//! Binary neuron/synapse wire format for the spikebus substrate
//!
//! This crate defines the fixed-size neuron record that nodes exchange with
//! their backing store and with deployment tooling, together with the packed
//! synapse entry and the cluster-wide neuron addressing scheme. Everything
//! here is pure encode/decode logic with no I/O.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod ids;
pub mod record;
pub mod synapse;

pub use error::{Result, WireError};
pub use ids::{GlobalId, LocalId, NodeId};
pub use record::{NeuronRecord, HEADER_SIZE, NEVER_SPIKED, RECORD_SIZE, SYNAPSE_CAPACITY};
pub use synapse::{decode_weight, encode_weight, SynapseEntry, SYNAPSE_SIZE, WEIGHT_LIMIT};

/// Wire format version for compatibility checking
pub const WIRE_VERSION: u32 = 1;
