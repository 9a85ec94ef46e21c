//! Backing store and neuron cache for the spikebus substrate
//!
//! The backing store models the node's large, slow neuron-table memory
//! (PSRAM on hardware, a byte array in emulation). The cache in front of it
//! holds a small working set of decoded records; every engine read and write
//! goes through the cache, and the store remains the sole durable owner of
//! record state between runs.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod error;
pub mod store;

pub use cache::{CacheStats, NeuronCache, DEFAULT_CACHE_CAPACITY};
pub use error::{Result, StoreError};
pub use store::{BackingStore, MemoryBackingStore};
