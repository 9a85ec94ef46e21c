//! Error types for the SNN engine

use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while driving a node's simulation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Storage layer error
    #[error("Storage error: {source}")]
    Store {
        #[from]
        /// Source storage error
        source: spikebus_store::StoreError,
    },

    /// Bus transport error
    #[error("Transport error: {source}")]
    Transport {
        #[from]
        /// Source transport error
        source: spikebus_transport::TransportError,
    },

    /// Wire codec error
    #[error("Wire format error: {source}")]
    Wire {
        #[from]
        /// Source codec error
        source: spikebus_wire::WireError,
    },

    /// Operation not permitted in the engine's current state
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        /// Operation that was attempted
        operation: &'static str,
        /// State the engine was in
        state: crate::engine::EngineState,
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

impl EngineError {
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
