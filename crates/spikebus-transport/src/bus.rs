//! In-process bus fabric
//!
//! Stands in for the physical parallel bus when nodes run emulated in one
//! process. Frames cross the fabric in their encoded wire form and mailboxes
//! carry bytes, so the codec the hardware bus would exercise runs here too.
//! Frames are handed to the engine only when it drains the mailbox at its
//! own synchronization point, never by mutating engine state from the
//! delivery context. Delivery is at-least-once and unordered across senders,
//! matching the guarantees the hardware bus gives.

use crate::{
    error::{Result, TransportError},
    frame::{BusTarget, Frame},
};
use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use spikebus_wire::NodeId;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Fabric {
    mailboxes: HashMap<NodeId, Sender<Vec<u8>>>,
}

/// Shared bus fabric that endpoints hang off
#[derive(Debug, Clone, Default)]
pub struct InProcBus {
    fabric: Arc<Mutex<Fabric>>,
}

impl InProcBus {
    /// Create an empty fabric
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a node, returning its endpoint. Re-registering a node id
    /// replaces the previous mailbox.
    pub fn register(&self, node: NodeId) -> BusEndpoint {
        let (tx, rx) = unbounded();
        self.fabric.lock().mailboxes.insert(node, tx);
        BusEndpoint {
            node,
            bus: self.clone(),
            rx,
        }
    }

    /// Detach a node; frames addressed to it afterwards fail `Unreachable`
    pub fn deregister(&self, node: NodeId) {
        self.fabric.lock().mailboxes.remove(&node);
    }

    /// Nodes currently attached
    pub fn node_count(&self) -> usize {
        self.fabric.lock().mailboxes.len()
    }

    fn deliver(&self, frame: Frame) -> Result<usize> {
        // Encode once; every mailbox receives the same wire bytes
        let bytes = frame.encode();
        let fabric = self.fabric.lock();
        match frame.target {
            BusTarget::Node(node) => {
                let tx = fabric
                    .mailboxes
                    .get(&node)
                    .ok_or(TransportError::Unreachable { node })?;
                tx.send(bytes)
                    .map_err(|_| TransportError::Unreachable { node })?;
                Ok(1)
            }
            BusTarget::Broadcast => {
                let mut delivered = 0;
                for (&node, tx) in fabric.mailboxes.iter() {
                    if node == frame.source {
                        continue;
                    }
                    if tx.send(bytes.clone()).is_ok() {
                        delivered += 1;
                    } else {
                        log::warn!("Broadcast to {} failed: mailbox gone", node);
                    }
                }
                Ok(delivered)
            }
        }
    }
}

/// One node's attachment to the fabric: a send path onto the bus and the
/// receive mailbox the engine drains at the start of its timestep.
#[derive(Debug)]
pub struct BusEndpoint {
    node: NodeId,
    bus: InProcBus,
    rx: Receiver<Vec<u8>>,
}

impl BusEndpoint {
    /// This endpoint's node identity
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Send one frame. Point-to-point delivery to a missing node fails
    /// `Unreachable`; broadcast reports how many mailboxes accepted it.
    pub fn send(&self, target: BusTarget, payload: crate::frame::FramePayload) -> Result<usize> {
        self.bus.deliver(Frame {
            source: self.node,
            target,
            payload,
        })
    }

    /// Send a prebuilt sequence of frames, e.g. a multi-frame transfer
    pub fn send_all(&self, frames: Vec<Frame>) -> Result<usize> {
        let mut delivered = 0;
        for frame in frames {
            delivered += self.bus.deliver(frame)?;
        }
        Ok(delivered)
    }

    /// Pull one pending frame without blocking. Bytes that fail to decode
    /// are logged and dropped, as a hardware receiver would drop them.
    pub fn try_recv(&self) -> Option<Frame> {
        loop {
            let bytes = self.rx.try_recv().ok()?;
            match Frame::decode(&bytes) {
                Ok(frame) => return Some(frame),
                Err(err) => {
                    log::warn!("{}: dropping malformed frame: {}", self.node, err);
                }
            }
        }
    }

    /// Drain every pending frame
    pub fn drain(&self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(frame) = self.try_recv() {
            frames.push(frame);
        }
        frames
    }
}
