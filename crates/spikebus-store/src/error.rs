//! Error types for the storage layer

use thiserror::Error;

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in the backing store or cache
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Neuron index outside the loaded table
    #[error("Index {index} out of bounds (max: {max})")]
    OutOfBounds {
        /// Index that was out of bounds
        index: u32,
        /// Number of addressable records
        max: u32,
    },

    /// Deployment larger than the configured table capacity
    #[error("Capacity exceeded: requested {requested} neurons, capacity {capacity}")]
    CapacityExceeded {
        /// Requested neuron count
        requested: u32,
        /// Configured table capacity
        capacity: u32,
    },

    /// Wire codec error while decoding or validating records
    #[error("Wire format error: {source}")]
    Wire {
        #[from]
        /// Source codec error
        source: spikebus_wire::WireError,
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
}

impl StoreError {
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
