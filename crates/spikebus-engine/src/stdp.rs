//! Spike-timing-dependent plasticity
//!
//! Weight updates are driven by the relative timing of pre- and
//! post-synaptic spikes: a pre spike shortly before a post fire potentiates
//! the synapse, a pre spike shortly after depresses it. Spike-time history
//! is bounded per neuron; the lookup never grows with simulation length.

use crate::error::{EngineError, Result};
use spikebus_wire::{GlobalId, NeuronRecord, NEVER_SPIKED};
use std::collections::{HashMap, VecDeque};

/// Spike timestamps retained per pre-synaptic neuron
pub const MAX_SPIKE_HISTORY: usize = 32;

/// Parameters for the STDP rule
#[derive(Debug, Clone, PartialEq)]
pub struct StdpParams {
    /// Learning rate for potentiation (weight increase)
    pub a_plus: f32,
    /// Learning rate for depression (weight decrease)
    pub a_minus: f32,
    /// Time constant for potentiation (ms)
    pub tau_plus: f32,
    /// Time constant for depression (ms)
    pub tau_minus: f32,
    /// Maximum weight value
    pub w_max: f32,
    /// Minimum weight value
    pub w_min: f32,
    /// Maximum pre/post pairing window (ms)
    pub max_window: f32,
}

impl Default for StdpParams {
    fn default() -> Self {
        Self {
            a_plus: 0.01,
            a_minus: 0.012,
            tau_plus: 20.0,
            tau_minus: 20.0,
            w_max: 1.0,
            w_min: 0.0,
            max_window: 100.0,
        }
    }
}

impl StdpParams {
    /// Create new STDP parameters with validation
    pub fn new(
        a_plus: f32,
        a_minus: f32,
        tau_plus: f32,
        tau_minus: f32,
        w_max: f32,
        w_min: f32,
        max_window: f32,
    ) -> Result<Self> {
        if a_plus <= 0.0 {
            return Err(EngineError::invalid_parameter("a_plus", a_plus.to_string(), "> 0.0"));
        }
        if a_minus <= 0.0 {
            return Err(EngineError::invalid_parameter("a_minus", a_minus.to_string(), "> 0.0"));
        }
        if tau_plus <= 0.0 {
            return Err(EngineError::invalid_parameter("tau_plus", tau_plus.to_string(), "> 0.0"));
        }
        if tau_minus <= 0.0 {
            return Err(EngineError::invalid_parameter("tau_minus", tau_minus.to_string(), "> 0.0"));
        }
        if w_max <= w_min {
            return Err(EngineError::invalid_parameter(
                "w_max",
                format!("{} (with w_min={})", w_max, w_min),
                "> w_min",
            ));
        }
        if max_window <= 0.0 {
            return Err(EngineError::invalid_parameter(
                "max_window",
                max_window.to_string(),
                "> 0.0",
            ));
        }

        Ok(Self {
            a_plus,
            a_minus,
            tau_plus,
            tau_minus,
            w_max,
            w_min,
            max_window,
        })
    }

    /// Validate parameters
    pub fn validate(&self) -> Result<()> {
        Self::new(
            self.a_plus,
            self.a_minus,
            self.tau_plus,
            self.tau_minus,
            self.w_max,
            self.w_min,
            self.max_window,
        )?;
        Ok(())
    }
}

/// STDP rule with bounded spike-time history.
///
/// History is keyed by global address: pre-synaptic neurons are usually
/// remote, and their spikes are observed as broadcast bus traffic.
#[derive(Debug)]
pub struct StdpRule {
    params: StdpParams,
    dt_ms: f32,
    history: HashMap<GlobalId, VecDeque<u32>>,
}

impl StdpRule {
    /// Create a rule for a simulation with `dt_ms` milliseconds per tick
    pub fn new(params: StdpParams, dt_ms: f32) -> Result<Self> {
        params.validate()?;
        if dt_ms <= 0.0 {
            return Err(EngineError::invalid_parameter("dt_ms", dt_ms.to_string(), "> 0.0"));
        }
        Ok(Self {
            params,
            dt_ms,
            history: HashMap::new(),
        })
    }

    /// Rule parameters
    pub fn params(&self) -> &StdpParams {
        &self.params
    }

    /// Record an observed spike for later pairing. History per neuron is
    /// capped at [`MAX_SPIKE_HISTORY`] and pruned past the pairing window.
    pub fn record_spike(&mut self, neuron: GlobalId, tick: u32) {
        let window_ticks = self.window_ticks();
        let times = self.history.entry(neuron).or_default();
        times.push_back(tick);
        while times.len() > MAX_SPIKE_HISTORY {
            times.pop_front();
        }
        while let Some(&front) = times.front() {
            if tick.saturating_sub(front) > window_ticks {
                times.pop_front();
            } else {
                break;
            }
        }
    }

    /// Most recent recorded spike of `neuron` strictly before `tick` and
    /// within the pairing window
    pub fn last_spike_before(&self, neuron: GlobalId, tick: u32) -> Option<u32> {
        let window_ticks = self.window_ticks();
        self.history.get(&neuron).and_then(|times| {
            times
                .iter()
                .rev()
                .copied()
                .find(|&t| t < tick && tick - t <= window_ticks)
        })
    }

    /// Potentiate on a post-synaptic fire: every incoming synapse whose
    /// source spiked within the window before `post_tick` strengthens.
    /// Returns the number of weights changed.
    pub fn on_post_fire(&self, record: &mut NeuronRecord, post_tick: u32) -> u32 {
        let mut updated = 0;
        let (w_min, w_max) = (self.params.w_min, self.params.w_max);
        let mut changes: Vec<(usize, f32)> = Vec::new();

        for (i, synapse) in record.synapses().iter().enumerate() {
            if let Some(pre_tick) = self.last_spike_before(synapse.source, post_tick) {
                let dt = (post_tick - pre_tick) as f32 * self.dt_ms;
                let delta = self.params.a_plus * (-dt / self.params.tau_plus).exp();
                let new_weight = (synapse.weight + delta).clamp(w_min, w_max);
                if new_weight != synapse.weight {
                    changes.push((i, new_weight));
                }
            }
        }
        for (i, weight) in changes {
            record.synapses_mut()[i].weight = weight;
            updated += 1;
        }
        updated
    }

    /// Depress on a pre-synaptic spike that follows a recent post fire:
    /// synapses of `record` sourced at `pre` weaken when the neuron itself
    /// fired within the window before `pre_tick`. Returns weights changed.
    pub fn on_pre_spike(&self, record: &mut NeuronRecord, pre: GlobalId, pre_tick: u32) -> u32 {
        if record.last_spike_tick == NEVER_SPIKED || record.last_spike_tick >= pre_tick {
            return 0;
        }
        let elapsed = pre_tick - record.last_spike_tick;
        if elapsed > self.window_ticks() {
            return 0;
        }

        let dt = elapsed as f32 * self.dt_ms;
        let delta = -self.params.a_minus * (-dt / self.params.tau_minus).exp();
        let (w_min, w_max) = (self.params.w_min, self.params.w_max);
        let mut updated = 0;
        for synapse in record.synapses_mut() {
            if synapse.source == pre {
                let new_weight = (synapse.weight + delta).clamp(w_min, w_max);
                if new_weight != synapse.weight {
                    synapse.weight = new_weight;
                    updated += 1;
                }
            }
        }
        updated
    }

    /// Drop all recorded history (after a table load)
    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Recorded spike count for a neuron
    pub fn history_len(&self, neuron: GlobalId) -> usize {
        self.history.get(&neuron).map(|t| t.len()).unwrap_or(0)
    }

    fn window_ticks(&self) -> u32 {
        (self.params.max_window / self.dt_ms).ceil() as u32
    }
}
