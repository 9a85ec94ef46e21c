//! Neuron addressing for the spikebus cluster
//!
//! A neuron is identified cluster-wide by a composite global address
//! `(node_id << 16) | local_id`. Local indices alone are never valid outside
//! a single node's internal processing.

use crate::error::{Result, WireError};
use core::fmt;

/// Identifier of a compute node on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u8);

impl NodeId {
    /// Create a new node ID
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub const fn raw(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

/// Index of a neuron within one node's backing store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalId(pub u16);

impl LocalId {
    /// Create a new local index
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    /// Get the raw index value
    pub const fn raw(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Cluster-wide neuron address: `(node_id << 16) | local_id`
///
/// Fits in 24 bits, which is what the packed synapse entry relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GlobalId(pub u32);

impl GlobalId {
    /// Largest encodable raw address (24 bits)
    pub const MAX_RAW: u32 = 0x00FF_FFFF;

    /// Compose a global address from its parts
    pub const fn new(node: NodeId, local: LocalId) -> Self {
        Self(((node.0 as u32) << 16) | local.0 as u32)
    }

    /// Reconstruct from a raw value, rejecting addresses outside 24 bits
    pub fn from_raw(raw: u32) -> Result<Self> {
        if raw > Self::MAX_RAW {
            return Err(WireError::InvalidAddress { raw });
        }
        Ok(Self(raw))
    }

    /// Get the raw address value
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// Node that owns this neuron
    pub const fn node(&self) -> NodeId {
        NodeId(((self.0 >> 16) & 0xFF) as u8)
    }

    /// Index within the owning node's table
    pub const fn local(&self) -> LocalId {
        LocalId((self.0 & 0xFFFF) as u16)
    }
}

impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node(), self.local())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_id_composition() {
        let gid = GlobalId::new(NodeId::new(3), LocalId::new(517));
        assert_eq!(gid.raw(), (3 << 16) | 517);
        assert_eq!(gid.node(), NodeId::new(3));
        assert_eq!(gid.local(), LocalId::new(517));
    }

    #[test]
    fn test_global_id_lossless_decomposition() {
        for node in [0u8, 1, 7, 255] {
            for local in [0u16, 1, 1023, u16::MAX] {
                let gid = GlobalId::new(NodeId::new(node), LocalId::new(local));
                assert_eq!(gid.node().raw(), node);
                assert_eq!(gid.local().raw(), local);
                assert_eq!(GlobalId::from_raw(gid.raw()).unwrap(), gid);
            }
        }
    }

    #[test]
    fn test_global_id_rejects_out_of_range() {
        assert!(GlobalId::from_raw(GlobalId::MAX_RAW).is_ok());
        let err = GlobalId::from_raw(GlobalId::MAX_RAW + 1).unwrap_err();
        assert!(matches!(err, WireError::InvalidAddress { .. }));
    }

    #[test]
    fn test_display() {
        let gid = GlobalId::new(NodeId::new(2), LocalId::new(9));
        assert_eq!(format!("{}", gid), "N2:L9");
    }
}
