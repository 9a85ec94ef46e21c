//! Error types for the wire format codec

use thiserror::Error;

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, WireError>;

/// Errors that can occur while encoding or decoding wire data
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Input buffer shorter than the fixed record size
    #[error("Truncated record: need {needed} bytes, got {got}")]
    TruncatedRecord {
        /// Bytes required by the format
        needed: usize,
        /// Bytes actually supplied
        got: usize,
    },

    /// Declared synapse count exceeds the record's embedded capacity
    #[error("Synapse overflow: declared {count}, capacity {capacity}")]
    SynapseOverflow {
        /// Declared synapse count
        count: u32,
        /// Maximum synapses a record can embed
        capacity: u32,
    },

    /// A floating-point field decoded to NaN or infinity
    #[error("Non-finite value in field {field}")]
    NonFiniteField {
        /// Name of the offending field
        field: &'static str,
    },

    /// A global neuron address with bits outside the 24-bit encoding
    #[error("Invalid global address: {raw:#010x}")]
    InvalidAddress {
        /// Raw address value
        raw: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WireError::TruncatedRecord { needed: 256, got: 10 };
        let msg = format!("{}", err);
        assert!(msg.contains("256"));
        assert!(msg.contains("10"));

        let err = WireError::SynapseOverflow { count: 99, capacity: 56 };
        assert!(format!("{}", err).contains("Synapse overflow"));
    }
}
