//! Per-node SNN execution engine for the spikebus substrate
//!
//! One engine drives one node's partition of the network: it drains spikes
//! from the bus, runs leaky integrate-and-fire dynamics over the cached
//! neuron records, fans newly generated spikes back out (broadcast-and-
//! filter), and applies STDP weight learning along the way. The engine is
//! single-threaded over its own state; bus frames arrive asynchronously but
//! are only folded in at the start of a timestep.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod cluster;
pub mod engine;
pub mod error;
pub mod neuron;
pub mod router;
pub mod stats;
pub mod stdp;

pub use cluster::Cluster;
pub use engine::{EngineConfig, EngineState, NodeEngine};
pub use error::{EngineError, Result};
pub use neuron::LeakClock;
pub use router::SpikeRouter;
pub use stats::EngineStats;
pub use stdp::{StdpParams, StdpRule, MAX_SPIKE_HISTORY};
