//! Fixed-capacity LRU cache over the backing store
//!
//! The working set may be orders of magnitude smaller than the neuron table
//! (16 cached against 1024 stored in the reference deployment). Correctness
//! does not depend on the ratio: any get/mark_dirty sequence must read back
//! the last value written, across arbitrarily many evictions.

use crate::{
    error::{Result, StoreError},
    store::BackingStore,
};
use spikebus_wire::{LocalId, NeuronRecord};

/// Default number of cache slots, matching the reference firmware
pub const DEFAULT_CACHE_CAPACITY: usize = 16;

/// Aggregate cache behavior counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from a resident slot
    pub hits: u64,
    /// Lookups that had to load from the backing store
    pub misses: u64,
    /// Slots recycled to make room
    pub evictions: u64,
    /// Dirty entries written back to the store
    pub writebacks: u64,
}

impl CacheStats {
    /// Fraction of lookups served without touching the store
    pub fn hit_rate(&self) -> f32 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f32 / total as f32
        }
    }
}

#[derive(Debug)]
struct CacheSlot {
    local_id: LocalId,
    record: NeuronRecord,
    dirty: bool,
    last_access: u64,
}

/// LRU cache of decoded neuron records fronting a backing store.
///
/// The cache owns the store: there is exactly one path to the neuron table,
/// so a given `LocalId` can never be resident in two slots at once.
#[derive(Debug)]
pub struct NeuronCache<S: BackingStore> {
    store: S,
    slots: Vec<CacheSlot>,
    capacity: usize,
    clock: u64,
    stats: CacheStats,
}

impl<S: BackingStore> NeuronCache<S> {
    /// Create a cache with `capacity` slots over `store`
    pub fn new(store: S, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(StoreError::invalid_parameter(
                "capacity",
                capacity.to_string(),
                "> 0",
            ));
        }
        Ok(Self {
            store,
            slots: Vec::with_capacity(capacity),
            capacity,
            clock: 0,
            stats: CacheStats::default(),
        })
    }

    /// Fetch the record for `id`, loading from the store on a miss.
    ///
    /// On a full cache the strictly least-recently-used slot is evicted,
    /// with write-back first if it is dirty.
    pub fn get(&mut self, id: LocalId) -> Result<&mut NeuronRecord> {
        self.clock += 1;
        let clock = self.clock;

        if let Some(pos) = self.slots.iter().position(|s| s.local_id == id) {
            self.stats.hits += 1;
            let slot = &mut self.slots[pos];
            slot.last_access = clock;
            return Ok(&mut slot.record);
        }

        self.stats.misses += 1;
        let record = self.store.read(id)?;

        let pos = if self.slots.len() < self.capacity {
            self.slots.push(CacheSlot {
                local_id: id,
                record,
                dirty: false,
                last_access: clock,
            });
            self.slots.len() - 1
        } else {
            let victim = self
                .slots
                .iter()
                .enumerate()
                .min_by_key(|(_, s)| s.last_access)
                .map(|(i, _)| i)
                .ok_or_else(|| {
                    StoreError::invalid_parameter("capacity", "0", "> 0")
                })?;
            self.evict(victim)?;
            self.slots[victim] = CacheSlot {
                local_id: id,
                record,
                dirty: false,
                last_access: clock,
            };
            victim
        };

        Ok(&mut self.slots[pos].record)
    }

    /// Mark the resident entry for `id` as modified. No-op if `id` is not
    /// resident (the entry was already written back).
    pub fn mark_dirty(&mut self, id: LocalId) {
        if let Some(slot) = self.slots.iter_mut().find(|s| s.local_id == id) {
            slot.dirty = true;
        }
    }

    /// Write every dirty entry back to the store. Idempotent; required
    /// before engine shutdown so no writes are lost.
    pub fn flush_all(&mut self) -> Result<()> {
        for i in 0..self.slots.len() {
            if self.slots[i].dirty {
                let id = self.slots[i].local_id;
                let record = self.slots[i].record.clone();
                self.store.write(id, &record)?;
                self.slots[i].dirty = false;
                self.stats.writebacks += 1;
            }
        }
        Ok(())
    }

    /// Replace the backing table and drop every resident entry.
    ///
    /// Resident slots would alias stale pre-load state otherwise.
    pub fn bulk_load(&mut self, bytes: &[u8], count: u32) -> Result<()> {
        self.store.bulk_load(bytes, count)?;
        self.slots.clear();
        Ok(())
    }

    /// Identity of the entry that would be evicted next, if the cache is full
    pub fn lru_candidate(&self) -> Option<LocalId> {
        if self.slots.len() < self.capacity {
            return None;
        }
        self.slots
            .iter()
            .min_by_key(|s| s.last_access)
            .map(|s| s.local_id)
    }

    /// Behavior counters
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Read-only access to the backing store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Mutable access to the backing store, for load-time scans that must
    /// not disturb cache recency
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    fn evict(&mut self, pos: usize) -> Result<()> {
        if self.slots[pos].dirty {
            let id = self.slots[pos].local_id;
            let record = self.slots[pos].record.clone();
            self.store.write(id, &record)?;
            self.stats.writebacks += 1;
        }
        self.stats.evictions += 1;
        Ok(())
    }
}
