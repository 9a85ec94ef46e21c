//! Bus transport for the spikebus substrate
//!
//! Two layers ride the shared bus: single command frames (one command byte
//! plus at most one argument byte) and a chunked multi-frame protocol for
//! payloads that do not fit a frame, validated end-to-end with a CRC over
//! the reassembled buffer. Multi-master arbitration is modeled logically:
//! observe the bus idle before claiming it, randomized exponential backoff
//! on collision.
//!
//! The in-process fabric in [`bus`] stands in for the physical parallel bus
//! when the substrate runs emulated; delivery is at-least-once and may
//! reorder, which consumers must tolerate.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod arbiter;
pub mod assembler;
pub mod bus;
pub mod command;
pub mod error;
pub mod frame;

pub use arbiter::{ArbiterConfig, BusArbiter};
pub use assembler::{
    split_into_frames, FrameAssembler, DEFAULT_CHUNK_SIZE, DEFAULT_TIMEOUT_TICKS,
    MAX_TRANSFER_SIZE,
};
pub use bus::{BusEndpoint, InProcBus};
pub use command::Command;
pub use error::{Result, TransportError};
pub use frame::{BusTarget, Frame, FramePayload, SpikeMessage, FRAME_HEADER_SIZE, SPIKE_MESSAGE_SIZE};
