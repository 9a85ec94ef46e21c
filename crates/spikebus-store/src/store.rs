//! Backing store for the full neuron table
//!
//! Access latency here is assumed high relative to compute (external PSRAM
//! on the reference hardware). The in-memory model keeps that asymmetry
//! observable by counting raw accesses, which is what cache hit-rate tests
//! measure against.

use crate::error::{Result, StoreError};
use spikebus_wire::{LocalId, NeuronRecord, WireError, RECORD_SIZE};

/// Addressable storage for encoded neuron records.
///
/// There is exactly one implementation selected explicitly at construction
/// time; the engine never reaches around whatever store its cache wraps.
pub trait BackingStore {
    /// Read and decode the record at `id`
    fn read(&mut self, id: LocalId) -> Result<NeuronRecord>;

    /// Encode and write the record at `id`
    fn write(&mut self, id: LocalId, record: &NeuronRecord) -> Result<()>;

    /// Replace the table with `count` records parsed from `bytes`.
    ///
    /// The count is an explicit, mandatory argument of every load: it is
    /// never inferred from the buffer length or defaulted. The load is
    /// all-or-nothing; on any validation failure the previous table contents
    /// are untouched.
    fn bulk_load(&mut self, bytes: &[u8], count: u32) -> Result<()>;

    /// Configured maximum neuron count
    fn capacity(&self) -> u32;

    /// Number of records currently loaded
    fn len(&self) -> u32;

    /// Whether no records are loaded
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw store accesses so far (reads + writes), the cost the cache exists
    /// to avoid
    fn accesses(&self) -> u64;
}

/// In-memory backing store emulating the node's PSRAM neuron table
#[derive(Debug)]
pub struct MemoryBackingStore {
    table: Vec<u8>,
    capacity: u32,
    loaded: u32,
    reads: u64,
    writes: u64,
}

impl MemoryBackingStore {
    /// Create an empty store with room for `capacity` records
    pub fn new(capacity: u32) -> Self {
        Self {
            table: vec![0u8; capacity as usize * RECORD_SIZE],
            capacity,
            loaded: 0,
            reads: 0,
            writes: 0,
        }
    }

    fn check_bounds(&self, id: LocalId) -> Result<usize> {
        let index = id.raw() as u32;
        if index >= self.loaded {
            return Err(StoreError::OutOfBounds {
                index,
                max: self.loaded,
            });
        }
        Ok(index as usize * RECORD_SIZE)
    }

    /// Raw bytes of the record at `id`, for integrity checks in tests and
    /// checkpoint export
    pub fn raw_record(&self, id: LocalId) -> Result<&[u8]> {
        let offset = self.check_bounds(id)?;
        Ok(&self.table[offset..offset + RECORD_SIZE])
    }
}

impl BackingStore for MemoryBackingStore {
    fn read(&mut self, id: LocalId) -> Result<NeuronRecord> {
        let offset = self.check_bounds(id)?;
        self.reads += 1;
        Ok(NeuronRecord::decode(&self.table[offset..offset + RECORD_SIZE])?)
    }

    fn write(&mut self, id: LocalId, record: &NeuronRecord) -> Result<()> {
        let offset = self.check_bounds(id)?;
        self.writes += 1;
        self.table[offset..offset + RECORD_SIZE].copy_from_slice(&record.encode());
        Ok(())
    }

    fn bulk_load(&mut self, bytes: &[u8], count: u32) -> Result<()> {
        if count > self.capacity {
            return Err(StoreError::CapacityExceeded {
                requested: count,
                capacity: self.capacity,
            });
        }
        let needed = count as usize * RECORD_SIZE;
        if bytes.len() < needed {
            return Err(StoreError::Wire {
                source: WireError::TruncatedRecord {
                    needed,
                    got: bytes.len(),
                },
            });
        }

        // Validate every record before applying any of them
        for i in 0..count as usize {
            NeuronRecord::decode(&bytes[i * RECORD_SIZE..(i + 1) * RECORD_SIZE])?;
        }

        self.table[..needed].copy_from_slice(&bytes[..needed]);
        self.loaded = count;
        log::info!("Loaded neuron table: {} records", count);
        Ok(())
    }

    fn capacity(&self) -> u32 {
        self.capacity
    }

    fn len(&self) -> u32 {
        self.loaded
    }

    fn accesses(&self) -> u64 {
        self.reads + self.writes
    }
}
