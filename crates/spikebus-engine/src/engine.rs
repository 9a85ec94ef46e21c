//! SNN engine state machine and timestep loop
//!
//! One engine per node, single-threaded over its own cache and store. Bus
//! traffic lands in the endpoint mailbox asynchronously and is folded in at
//! the start of each timestep; nothing mutates engine state from the
//! delivery context.

use crate::{
    error::{EngineError, Result},
    neuron::{self, LeakClock},
    router::SpikeRouter,
    stats::EngineStats,
    stdp::{StdpParams, StdpRule},
};
use spikebus_store::{MemoryBackingStore, NeuronCache, DEFAULT_CACHE_CAPACITY};
use spikebus_transport::{
    split_into_frames, BusEndpoint, BusTarget, Command, Frame, FrameAssembler, FramePayload,
    SpikeMessage, DEFAULT_CHUNK_SIZE,
};
use spikebus_wire::{GlobalId, LocalId, NodeId};
use std::collections::{BTreeSet, VecDeque};
use std::fmt;

/// Engine lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No table deployed yet
    Uninitialized,
    /// Table deployed, ready to run
    Loaded,
    /// Timestep loop active
    Running,
    /// Halted with the cache flushed; may be restarted
    Stopped,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Loaded => "loaded",
            Self::Running => "running",
            Self::Stopped => "stopped",
        };
        write!(f, "{}", name)
    }
}

/// Per-node engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Identity of this node on the bus; read from board straps at boot on
    /// hardware, threaded explicitly here
    pub node_id: NodeId,
    /// Backing store capacity in neurons
    pub max_neurons: u32,
    /// Cache slots
    pub cache_capacity: usize,
    /// Milliseconds of simulated time per tick
    pub dt_ms: f32,
    /// Ticks between dirty-cache write-back passes
    pub flush_interval: u32,
    /// STDP parameters
    pub stdp: StdpParams,
}

impl EngineConfig {
    /// Create a validated configuration for `node_id`
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            max_neurons: 1024,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            dt_ms: 1.0,
            flush_interval: 16,
            stdp: StdpParams::default(),
        }
    }

    /// Override the store capacity
    pub fn with_max_neurons(mut self, max_neurons: u32) -> Self {
        self.max_neurons = max_neurons;
        self
    }

    /// Override the cache capacity
    pub fn with_cache_capacity(mut self, cache_capacity: usize) -> Self {
        self.cache_capacity = cache_capacity;
        self
    }

    /// Override the flush interval
    pub fn with_flush_interval(mut self, flush_interval: u32) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    /// Validate parameters
    pub fn validate(&self) -> Result<()> {
        if self.max_neurons == 0 {
            return Err(EngineError::invalid_parameter(
                "max_neurons",
                self.max_neurons.to_string(),
                "> 0",
            ));
        }
        if self.max_neurons > u16::MAX as u32 + 1 {
            return Err(EngineError::invalid_parameter(
                "max_neurons",
                self.max_neurons.to_string(),
                "<= 65536 (local index width)",
            ));
        }
        if self.cache_capacity == 0 {
            return Err(EngineError::invalid_parameter(
                "cache_capacity",
                self.cache_capacity.to_string(),
                "> 0",
            ));
        }
        if !(self.dt_ms > 0.0) {
            return Err(EngineError::invalid_parameter(
                "dt_ms",
                self.dt_ms.to_string(),
                "> 0.0",
            ));
        }
        if self.flush_interval == 0 {
            return Err(EngineError::invalid_parameter(
                "flush_interval",
                self.flush_interval.to_string(),
                "> 0",
            ));
        }
        self.stdp.validate()?;
        Ok(())
    }
}

/// One node's SNN execution engine
#[derive(Debug)]
pub struct NodeEngine {
    config: EngineConfig,
    state: EngineState,
    tick: u32,
    cache: NeuronCache<MemoryBackingStore>,
    router: SpikeRouter,
    stdp: StdpRule,
    leak: LeakClock,
    assembler: FrameAssembler,
    endpoint: Option<BusEndpoint>,
    queue: VecDeque<SpikeMessage>,
    pending: BTreeSet<u16>,
    poll_clock: u64,
    stop_requested: bool,
    stats: EngineStats,
}

impl NodeEngine {
    /// Create an engine with no bus attachment
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let cache = NeuronCache::new(
            MemoryBackingStore::new(config.max_neurons),
            config.cache_capacity,
        )?;
        let stdp = StdpRule::new(config.stdp.clone(), config.dt_ms)?;
        Ok(Self {
            router: SpikeRouter::new(config.node_id),
            leak: LeakClock::new(config.dt_ms),
            stdp,
            cache,
            state: EngineState::Uninitialized,
            tick: 0,
            assembler: FrameAssembler::default(),
            endpoint: None,
            queue: VecDeque::new(),
            pending: BTreeSet::new(),
            poll_clock: 0,
            stop_requested: false,
            config,
            stats: EngineStats::default(),
        })
    }

    /// Create an engine attached to a bus endpoint
    pub fn with_endpoint(config: EngineConfig, endpoint: BusEndpoint) -> Result<Self> {
        let mut engine = Self::new(config)?;
        engine.endpoint = Some(endpoint);
        Ok(engine)
    }

    /// Node identity
    pub fn node_id(&self) -> NodeId {
        self.config.node_id
    }

    /// Current lifecycle state
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Current simulation tick
    pub fn tick(&self) -> u32 {
        self.tick
    }

    /// Aggregate counters for the management layer
    pub fn stats(&self) -> EngineStats {
        let mut stats = self.stats;
        stats.cache = self.cache.stats();
        stats.transfers_discarded = self.assembler.discarded();
        stats
    }

    /// Deploy a neuron table. The record count is explicit and mandatory;
    /// it is never inferred from the buffer length.
    pub fn load_table(&mut self, bytes: &[u8], count: u32) -> Result<()> {
        if self.state == EngineState::Running {
            return Err(EngineError::InvalidState {
                operation: "load table",
                state: self.state,
            });
        }
        self.cache.bulk_load(bytes, count)?;
        self.router.rebuild(self.cache.store_mut())?;
        self.stdp.clear();
        self.leak.clear();
        self.queue.clear();
        self.pending.clear();
        self.stats = EngineStats {
            neurons_loaded: count,
            ..EngineStats::default()
        };
        self.state = EngineState::Loaded;
        log::info!("{}: table loaded, {} neurons", self.config.node_id, count);
        Ok(())
    }

    /// Enter the running state
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            EngineState::Loaded | EngineState::Stopped => {
                self.state = EngineState::Running;
                self.stop_requested = false;
                log::info!("{}: engine started at tick {}", self.config.node_id, self.tick);
                Ok(())
            }
            state => Err(EngineError::InvalidState {
                operation: "start",
                state,
            }),
        }
    }

    /// Halt the loop, flushing every dirty cache entry first so no write is
    /// lost. Idempotent once stopped.
    pub fn stop(&mut self) -> Result<()> {
        match self.state {
            EngineState::Running => {
                self.cache.flush_all()?;
                self.state = EngineState::Stopped;
                self.stop_requested = false;
                log::info!("{}: engine stopped at tick {}", self.config.node_id, self.tick);
                Ok(())
            }
            EngineState::Stopped => Ok(()),
            state => Err(EngineError::InvalidState {
                operation: "stop",
                state,
            }),
        }
    }

    /// Add external input to a local neuron's potential (test stimulus and
    /// management-layer injection path)
    pub fn inject(&mut self, local: LocalId, amount: f32) -> Result<()> {
        if self.state != EngineState::Loaded && self.state != EngineState::Running {
            return Err(EngineError::InvalidState {
                operation: "inject",
                state: self.state,
            });
        }
        let record = self.cache.get(local)?;
        record.potential += amount;
        if !record.potential.is_finite() {
            record.potential = 0.0;
        }
        self.cache.mark_dirty(local);
        self.pending.insert(local.raw());
        Ok(())
    }

    /// Drain and handle pending bus frames. Called automatically at the
    /// start of each timestep; call directly to service control traffic
    /// (deployments, start commands) while not running.
    pub fn poll_bus(&mut self) {
        // Transfers are timed against polls, not simulation ticks, so a
        // stalled deployment still expires while the engine sits idle.
        self.poll_clock += 1;
        let frames = match &self.endpoint {
            Some(endpoint) => endpoint.drain(),
            None => Vec::new(),
        };
        for frame in frames {
            self.handle_frame(frame);
        }
        if let Some(err) = self.assembler.expire(self.poll_clock) {
            log::warn!("{}: {}", self.config.node_id, err);
        }
    }

    /// Execute one timestep: fold in bus traffic, route queued spikes,
    /// sweep neurons with pending input, fire and learn, and write back
    /// dirty cache entries on the flush interval.
    pub fn step(&mut self) -> Result<()> {
        if self.state != EngineState::Running {
            return Err(EngineError::InvalidState {
                operation: "step",
                state: self.state,
            });
        }
        self.tick += 1;

        // (1) Synchronization point for asynchronous bus arrivals
        self.poll_bus();

        // (2) Route queued spikes into the local partition
        while let Some(msg) = self.queue.pop_front() {
            // Local fires are already recorded at emission; recording them
            // again here would double-count history entries
            if msg.neuron.node() != self.config.node_id {
                self.stdp.record_spike(msg.neuron, msg.tick);
            }
            match self
                .router
                .apply_spike(&mut self.cache, &self.stdp, &mut self.leak, &msg, self.tick)
            {
                Ok(touched) => {
                    for local in touched {
                        self.pending.insert(local.raw());
                    }
                }
                Err(err) => {
                    self.stats.spikes_dropped += 1;
                    log::warn!("{}: dropped spike from {}: {}", self.config.node_id, msg.neuron, err);
                }
            }
        }

        // (3) Sweep neurons with pending input: leak, threshold, refractory
        let pending: Vec<u16> = std::mem::take(&mut self.pending).into_iter().collect();
        for raw in pending {
            let local = LocalId::new(raw);
            let (fired, armed) = {
                let record = self.cache.get(local)?;
                self.leak.advance(local, record, self.tick);
                if neuron::try_fire(record, self.tick) {
                    // (4) Causal STDP on the freshly fired neuron
                    self.stdp.on_post_fire(record, self.tick);
                    (Some(record.global_id), false)
                } else {
                    // Still above threshold inside the refractory window;
                    // keep it scheduled so the fire lands when the window
                    // elapses
                    (None, record.potential >= record.threshold)
                }
            };
            self.cache.mark_dirty(local);
            if armed {
                self.pending.insert(raw);
            }
            if let Some(global_id) = fired {
                self.emit_spike(global_id);
            }
        }

        // (5) Bounded-interval write-back
        if self.tick % self.config.flush_interval == 0 {
            self.cache.flush_all()?;
        }

        self.stats.steps_executed += 1;

        if self.stop_requested {
            self.stop()?;
        }
        Ok(())
    }

    /// Run `n` consecutive timesteps
    pub fn run_steps(&mut self, n: u32) -> Result<()> {
        for _ in 0..n {
            if self.state != EngineState::Running {
                break;
            }
            self.step()?;
        }
        Ok(())
    }

    /// Read-only view of a neuron, bypassing dynamics (management queries
    /// and tests). Goes through the cache like every other access.
    pub fn peek(&mut self, local: LocalId) -> Result<spikebus_wire::NeuronRecord> {
        Ok(self.cache.get(local)?.clone())
    }

    /// Direct store access for integrity checks
    pub fn store(&self) -> &MemoryBackingStore {
        self.cache.store()
    }

    fn emit_spike(&mut self, global_id: GlobalId) {
        self.stats.spikes_generated += 1;
        self.stdp.record_spike(global_id, self.tick);
        let msg = SpikeMessage::new(global_id, self.tick, 0);

        // A node hears its own spikes without a bus round-trip
        self.queue.push_back(msg);

        if let Some(endpoint) = &self.endpoint {
            let sent = split_into_frames(
                self.config.node_id,
                BusTarget::Broadcast,
                Command::Spike,
                &msg.encode(),
                DEFAULT_CHUNK_SIZE,
            )
            .and_then(|frames| endpoint.send_all(frames));
            match sent {
                Ok(delivered) => {
                    log::trace!(
                        "{}: spike {} broadcast to {} peers",
                        self.config.node_id,
                        global_id,
                        delivered
                    );
                }
                Err(err) => {
                    self.stats.spikes_dropped += 1;
                    log::warn!("{}: spike {} dropped: {}", self.config.node_id, global_id, err);
                }
            }
        }
    }

    fn handle_frame(&mut self, frame: Frame) {
        match &frame.payload {
            FramePayload::Command { op, arg } => self.handle_command(*op, *arg, frame.source),
            _ => match self.assembler.accept(&frame, self.poll_clock) {
                Ok(Some((op, source, payload))) => self.handle_payload(op, source, &payload),
                Ok(None) => {}
                Err(err) => {
                    log::warn!("{}: transfer from {} discarded: {}", self.config.node_id, frame.source, err);
                }
            },
        }
    }

    fn handle_command(&mut self, op: Command, arg: Option<u8>, source: NodeId) {
        match op {
            Command::Start => {
                if let Err(err) = self.start() {
                    log::warn!("{}: start from {} refused: {}", self.config.node_id, source, err);
                }
            }
            Command::Stop => {
                if self.state == EngineState::Running {
                    // Honored once the current timestep completes
                    self.stop_requested = true;
                } else {
                    log::debug!("{}: stop from {} while {}", self.config.node_id, source, self.state);
                }
            }
            Command::Ping => {
                if let Some(endpoint) = &self.endpoint {
                    let echo = FramePayload::Command {
                        op: Command::Ping,
                        arg,
                    };
                    if endpoint.send(BusTarget::Node(source), echo).is_err() {
                        log::warn!("{}: ping reply to {} undeliverable", self.config.node_id, source);
                    }
                }
            }
            other => {
                log::warn!(
                    "{}: command {:?} from {} is not a single-frame operation",
                    self.config.node_id,
                    other,
                    source
                );
            }
        }
    }

    fn handle_payload(&mut self, op: Command, source: NodeId, payload: &[u8]) {
        match op {
            Command::Spike => match SpikeMessage::decode(payload) {
                Ok(msg) => {
                    self.queue.push_back(msg);
                    self.stats.spikes_received += 1;
                }
                Err(err) => {
                    self.stats.spikes_dropped += 1;
                    log::warn!("{}: bad spike payload from {}: {}", self.config.node_id, source, err);
                }
            },
            Command::LoadTable => {
                // Payload layout: explicit record count (4B LE), then records
                if payload.len() < 4 {
                    log::warn!("{}: load from {} missing record count", self.config.node_id, source);
                    return;
                }
                let count = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
                if let Err(err) = self.load_table(&payload[4..], count) {
                    log::error!("{}: deployment from {} failed: {}", self.config.node_id, source, err);
                }
            }
            other => {
                log::warn!(
                    "{}: unexpected multi-frame payload {:?} from {}",
                    self.config.node_id,
                    other,
                    source
                );
            }
        }
    }
}
