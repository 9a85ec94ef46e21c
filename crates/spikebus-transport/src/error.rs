//! Error types for the bus transport layer

use spikebus_wire::NodeId;
use thiserror::Error;

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors that can occur on the bus
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// CRC over the reassembled payload did not match the trailer
    #[error("Checksum verification failed: expected {expected:08x}, computed {computed:08x}")]
    ChecksumMismatch {
        /// Checksum carried by the FRAME_END trailer
        expected: u32,
        /// Checksum computed over the accumulated buffer
        computed: u32,
    },

    /// Data frame arrived out of sequence
    #[error("Sequence gap: expected frame {expected}, found {found}")]
    SequenceGap {
        /// Next sequence number the assembler was waiting for
        expected: u16,
        /// Sequence number actually received
        found: u16,
    },

    /// Transfer ended with fewer bytes than FRAME_START declared
    #[error("Incomplete transfer: declared {expected} bytes, accumulated {got}")]
    TransferIncomplete {
        /// Byte count declared at FRAME_START
        expected: usize,
        /// Bytes accumulated when FRAME_END arrived
        got: usize,
    },

    /// Transfer stalled past the assembly timeout
    #[error("Transfer timed out after {ticks} ticks")]
    TransferTimeout {
        /// Ticks the transfer sat without completing
        ticks: u64,
    },

    /// Data chunks exceeded the declared payload length
    #[error("Payload overrun: declared {declared} bytes, received {received}")]
    PayloadOverrun {
        /// Byte count declared at FRAME_START
        declared: usize,
        /// Bytes received including the overrunning chunk
        received: usize,
    },

    /// Payload larger than one transfer's length field can declare
    #[error("Payload of {size} bytes exceeds the {max}-byte transfer limit")]
    PayloadTooLarge {
        /// Requested payload size
        size: usize,
        /// Largest size a transfer can carry
        max: usize,
    },

    /// FRAME_DATA or FRAME_END with no transfer in progress
    #[error("Unexpected {frame} frame with no transfer in progress")]
    UnexpectedFrame {
        /// Kind of the offending frame
        frame: &'static str,
    },

    /// Malformed payload delivered by a completed transfer
    #[error("Malformed {what} payload: expected {expected} bytes, got {got}")]
    MalformedPayload {
        /// What the payload was supposed to be
        what: &'static str,
        /// Expected byte count
        expected: usize,
        /// Actual byte count
        got: usize,
    },

    /// Frame header field with an out-of-range value
    #[error("Invalid frame {field} byte {value:#04x}")]
    InvalidFrame {
        /// Header field that failed to decode
        field: &'static str,
        /// The offending byte
        value: u8,
    },

    /// Unknown command byte on the wire
    #[error("Unknown command byte {byte:#04x}")]
    UnknownCommand {
        /// The unrecognized byte
        byte: u8,
    },

    /// Target node has no live mailbox on the fabric
    #[error("Node {node} unreachable")]
    Unreachable {
        /// The unreachable node
        node: NodeId,
    },

    /// Arbitration gave up after the configured attempt cap
    #[error("Bus arbitration timed out after {attempts} attempts")]
    ArbitrationTimeout {
        /// Backoff attempts made before giving up
        attempts: u32,
    },

    /// Invalid configuration value
    #[error("Invalid parameter {parameter}: {value} (expected {constraint})")]
    InvalidParameter {
        /// Parameter name
        parameter: String,
        /// Invalid value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// Wire codec error inside a delivered payload
    #[error("Wire format error: {source}")]
    Wire {
        #[from]
        /// Source codec error
        source: spikebus_wire::WireError,
    },
}

impl TransportError {
    /// Create an invalid parameter error
    pub fn invalid_parameter(
        parameter: impl Into<String>,
        value: impl Into<String>,
        constraint: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
            constraint: constraint.into(),
        }
    }
}
