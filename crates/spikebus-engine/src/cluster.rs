//! Multi-node cluster harness
//!
//! Wires several engines onto one in-process bus fabric and steps them in
//! lockstep. A spike broadcast during node A's step sits in node B's mailbox
//! until B's next synchronization point, which is exactly how the hardware
//! behaves with engines free-running on separate boards.

use crate::{
    engine::{EngineConfig, EngineState, NodeEngine},
    error::{EngineError, Result},
};
use spikebus_transport::InProcBus;
use spikebus_wire::NodeId;
use std::collections::BTreeMap;

/// A set of node engines sharing one bus
#[derive(Debug, Default)]
pub struct Cluster {
    bus: InProcBus,
    engines: BTreeMap<NodeId, NodeEngine>,
}

impl Cluster {
    /// Create an empty cluster
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared bus fabric. Management tooling registers its own endpoint
    /// here to speak to the nodes.
    pub fn bus(&self) -> &InProcBus {
        &self.bus
    }

    /// Bring up a node from `config` and attach it to the bus. Re-adding a
    /// node id is refused; deployments address nodes by identity.
    pub fn add_node(&mut self, config: EngineConfig) -> Result<()> {
        let node = config.node_id;
        if self.engines.contains_key(&node) {
            return Err(EngineError::invalid_parameter(
                "node_id",
                node.to_string(),
                "not already present in the cluster",
            ));
        }
        let endpoint = self.bus.register(node);
        let engine = NodeEngine::with_endpoint(config, endpoint)?;
        self.engines.insert(node, engine);
        Ok(())
    }

    /// Nodes currently in the cluster, in id order
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.engines.keys().copied()
    }

    /// Shared view of one node's engine
    pub fn engine(&self, node: NodeId) -> Option<&NodeEngine> {
        self.engines.get(&node)
    }

    /// Mutable view of one node's engine
    pub fn engine_mut(&mut self, node: NodeId) -> Option<&mut NodeEngine> {
        self.engines.get_mut(&node)
    }

    fn require_mut(&mut self, node: NodeId) -> Result<&mut NodeEngine> {
        self.engines.get_mut(&node).ok_or_else(|| {
            EngineError::invalid_parameter("node_id", node.to_string(), "a cluster member")
        })
    }

    /// Deploy a neuron table directly into one node
    pub fn load_table(&mut self, node: NodeId, bytes: &[u8], count: u32) -> Result<()> {
        self.require_mut(node)?.load_table(bytes, count)
    }

    /// Start every node
    pub fn start_all(&mut self) -> Result<()> {
        for engine in self.engines.values_mut() {
            engine.start()?;
        }
        Ok(())
    }

    /// Stop every node, flushing caches
    pub fn stop_all(&mut self) -> Result<()> {
        for engine in self.engines.values_mut() {
            if engine.state() == EngineState::Running {
                engine.stop()?;
            }
        }
        Ok(())
    }

    /// Step every running node once, in node-id order. Spikes broadcast
    /// this tick land on peers at their next step.
    pub fn step_all(&mut self) -> Result<()> {
        for engine in self.engines.values_mut() {
            if engine.state() == EngineState::Running {
                engine.step()?;
            }
        }
        Ok(())
    }

    /// Step the whole cluster `n` times
    pub fn run_steps(&mut self, n: u32) -> Result<()> {
        for _ in 0..n {
            self.step_all()?;
        }
        Ok(())
    }

    /// Service bus traffic on every idle node (deployments and start
    /// commands arrive while the timestep loop is not running)
    pub fn poll_all(&mut self) {
        for engine in self.engines.values_mut() {
            engine.poll_bus();
        }
    }
}
