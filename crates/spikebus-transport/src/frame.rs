//! Bus frames and the spike message payload

use crate::{
    command::Command,
    error::{Result, TransportError},
};
use spikebus_wire::{GlobalId, NodeId};

/// Delivery target of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusTarget {
    /// One specific node
    Node(NodeId),
    /// Every node on the bus except the sender
    Broadcast,
}

/// Frame body: either a single-byte command or one leg of a multi-frame
/// transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePayload {
    /// Single command frame: one command byte plus at most one data byte
    Command {
        /// The command
        op: Command,
        /// Optional single argument byte
        arg: Option<u8>,
    },
    /// Opens a transfer for `op` with a declared total length
    FrameStart {
        /// Command the completed payload will be delivered under
        op: Command,
        /// Total payload length in bytes
        total_len: u16,
    },
    /// One chunk of transfer data
    FrameData {
        /// Zero-based chunk sequence number
        seq: u16,
        /// Chunk bytes
        chunk: Vec<u8>,
    },
    /// Closes a transfer with the checksum over the whole payload
    FrameEnd {
        /// CRC32 over the reassembled payload
        checksum: u32,
    },
}

/// One frame on the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Sending node
    pub source: NodeId,
    /// Addressed node or broadcast
    pub target: BusTarget,
    /// Frame body
    pub payload: FramePayload,
}

/// Bytes preceding the payload body: source, target kind, target node, and
/// the leading command byte
pub const FRAME_HEADER_SIZE: usize = 4;

impl Frame {
    /// Build a single command frame
    pub fn command(source: NodeId, target: BusTarget, op: Command, arg: Option<u8>) -> Self {
        Self {
            source,
            target,
            payload: FramePayload::Command { op, arg },
        }
    }

    /// Serialize to wire bytes. The leading command byte after the header
    /// selects the payload form: framing bytes (0x30..0x32) carry transfer
    /// legs, any other command byte carries a single command frame.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(FRAME_HEADER_SIZE + 8);
        bytes.push(self.source.raw());
        match self.target {
            BusTarget::Node(node) => {
                bytes.push(0);
                bytes.push(node.raw());
            }
            BusTarget::Broadcast => {
                bytes.push(1);
                bytes.push(0);
            }
        }
        match &self.payload {
            FramePayload::Command { op, arg } => {
                bytes.push(op.byte());
                match arg {
                    Some(arg) => {
                        bytes.push(1);
                        bytes.push(*arg);
                    }
                    None => bytes.push(0),
                }
            }
            FramePayload::FrameStart { op, total_len } => {
                bytes.push(Command::FrameStart.byte());
                bytes.push(op.byte());
                bytes.extend_from_slice(&total_len.to_le_bytes());
            }
            FramePayload::FrameData { seq, chunk } => {
                bytes.push(Command::FrameData.byte());
                bytes.extend_from_slice(&seq.to_le_bytes());
                bytes.extend_from_slice(chunk);
            }
            FramePayload::FrameEnd { checksum } => {
                bytes.push(Command::FrameEnd.byte());
                bytes.extend_from_slice(&checksum.to_le_bytes());
            }
        }
        bytes
    }

    /// Decode wire bytes back into a frame
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < FRAME_HEADER_SIZE {
            return Err(TransportError::MalformedPayload {
                what: "frame header",
                expected: FRAME_HEADER_SIZE,
                got: bytes.len(),
            });
        }
        let source = NodeId::new(bytes[0]);
        let target = match bytes[1] {
            0 => BusTarget::Node(NodeId::new(bytes[2])),
            1 => BusTarget::Broadcast,
            value => {
                return Err(TransportError::InvalidFrame {
                    field: "target kind",
                    value,
                })
            }
        };
        let op = Command::from_byte(bytes[3])?;
        let body = &bytes[FRAME_HEADER_SIZE..];
        let payload = match op {
            Command::FrameStart => {
                if body.len() != 3 {
                    return Err(TransportError::MalformedPayload {
                        what: "FRAME_START",
                        expected: 3,
                        got: body.len(),
                    });
                }
                FramePayload::FrameStart {
                    op: Command::from_byte(body[0])?,
                    total_len: u16::from_le_bytes([body[1], body[2]]),
                }
            }
            Command::FrameData => {
                if body.len() < 2 {
                    return Err(TransportError::MalformedPayload {
                        what: "FRAME_DATA",
                        expected: 2,
                        got: body.len(),
                    });
                }
                FramePayload::FrameData {
                    seq: u16::from_le_bytes([body[0], body[1]]),
                    chunk: body[2..].to_vec(),
                }
            }
            Command::FrameEnd => {
                if body.len() != 4 {
                    return Err(TransportError::MalformedPayload {
                        what: "FRAME_END",
                        expected: 4,
                        got: body.len(),
                    });
                }
                FramePayload::FrameEnd {
                    checksum: u32::from_le_bytes([body[0], body[1], body[2], body[3]]),
                }
            }
            op => {
                if body.is_empty() {
                    return Err(TransportError::MalformedPayload {
                        what: "command frame",
                        expected: 1,
                        got: 0,
                    });
                }
                let arg = if body[0] == 0 {
                    None
                } else {
                    if body.len() < 2 {
                        return Err(TransportError::MalformedPayload {
                            what: "command frame",
                            expected: 2,
                            got: body.len(),
                        });
                    }
                    Some(body[1])
                };
                FramePayload::Command { op, arg }
            }
        };
        Ok(Self {
            source,
            target,
            payload,
        })
    }
}

/// Encoded size of a spike message on the wire
pub const SPIKE_MESSAGE_SIZE: usize = 9;

/// A spike in flight: the firing neuron's global address, the tick it fired,
/// and a flags byte.
///
/// Delivery is broadcast-and-filter: the message names the *source* neuron,
/// and each receiving node scans its own incoming-synapse lists for matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpikeMessage {
    /// Global address of the neuron that fired
    pub neuron: GlobalId,
    /// Simulation tick of the firing
    pub tick: u32,
    /// Magnitude/flags byte
    pub flags: u8,
}

impl SpikeMessage {
    /// Create a spike message
    pub fn new(neuron: GlobalId, tick: u32, flags: u8) -> Self {
        Self { neuron, tick, flags }
    }

    /// Encode to the 9-byte wire form: global id (4B LE), tick (4B LE), flags
    pub fn encode(&self) -> [u8; SPIKE_MESSAGE_SIZE] {
        let mut bytes = [0u8; SPIKE_MESSAGE_SIZE];
        bytes[0..4].copy_from_slice(&self.neuron.raw().to_le_bytes());
        bytes[4..8].copy_from_slice(&self.tick.to_le_bytes());
        bytes[8] = self.flags;
        bytes
    }

    /// Decode from wire bytes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SPIKE_MESSAGE_SIZE {
            return Err(TransportError::MalformedPayload {
                what: "spike",
                expected: SPIKE_MESSAGE_SIZE,
                got: bytes.len(),
            });
        }
        let raw = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let neuron = GlobalId::from_raw(raw)?;
        let tick = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        Ok(Self {
            neuron,
            tick,
            flags: bytes[8],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spikebus_wire::LocalId;

    fn round_trip(frame: Frame) {
        assert_eq!(Frame::decode(&frame.encode()).unwrap(), frame);
    }

    #[test]
    fn test_frame_codec_round_trip() {
        round_trip(Frame::command(
            NodeId::new(2),
            BusTarget::Node(NodeId::new(5)),
            Command::Ping,
            Some(0xA5),
        ));
        round_trip(Frame::command(
            NodeId::new(0),
            BusTarget::Broadcast,
            Command::Start,
            None,
        ));
        round_trip(Frame {
            source: NodeId::new(1),
            target: BusTarget::Node(NodeId::new(3)),
            payload: FramePayload::FrameStart {
                op: Command::LoadTable,
                total_len: 0x1234,
            },
        });
        round_trip(Frame {
            source: NodeId::new(1),
            target: BusTarget::Broadcast,
            payload: FramePayload::FrameData {
                seq: 7,
                chunk: vec![0xDE, 0xAD, 0xBE, 0xEF],
            },
        });
        round_trip(Frame {
            source: NodeId::new(4),
            target: BusTarget::Node(NodeId::new(0)),
            payload: FramePayload::FrameEnd {
                checksum: 0xCAFE_F00D,
            },
        });
    }

    #[test]
    fn test_frame_decode_truncated_header() {
        let err = Frame::decode(&[0, 0]).unwrap_err();
        assert!(matches!(
            err,
            TransportError::MalformedPayload { what: "frame header", .. }
        ));
    }

    #[test]
    fn test_frame_decode_unknown_command() {
        let err = Frame::decode(&[0, 0, 1, 0xFF]).unwrap_err();
        assert_eq!(err, TransportError::UnknownCommand { byte: 0xFF });
    }

    #[test]
    fn test_frame_decode_bad_target_kind() {
        let err = Frame::decode(&[0, 9, 1, Command::Ping.byte(), 0]).unwrap_err();
        assert_eq!(
            err,
            TransportError::InvalidFrame {
                field: "target kind",
                value: 9,
            }
        );
    }

    #[test]
    fn test_frame_decode_short_body() {
        // FRAME_END needs a 4-byte checksum
        let err = Frame::decode(&[0, 1, 0, Command::FrameEnd.byte(), 1, 2]).unwrap_err();
        assert!(matches!(
            err,
            TransportError::MalformedPayload { what: "FRAME_END", .. }
        ));
    }

    #[test]
    fn test_spike_message_round_trip() {
        let msg = SpikeMessage::new(GlobalId::new(NodeId::new(3), LocalId::new(1023)), 4242, 0x01);
        assert_eq!(SpikeMessage::decode(&msg.encode()).unwrap(), msg);
    }

    #[test]
    fn test_spike_message_wrong_length() {
        let err = SpikeMessage::decode(&[0u8; 5]).unwrap_err();
        assert!(matches!(err, TransportError::MalformedPayload { what: "spike", .. }));
    }

    #[test]
    fn test_spike_message_invalid_address() {
        let mut bytes = [0u8; SPIKE_MESSAGE_SIZE];
        bytes[0..4].copy_from_slice(&0xFF00_0000u32.to_le_bytes());
        assert!(matches!(
            SpikeMessage::decode(&bytes),
            Err(TransportError::Wire { .. })
        ));
    }
}
