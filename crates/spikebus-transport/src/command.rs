//! Bus command set
//!
//! One byte per command; the values are collision-free within a deployment
//! and grouped by function (control, spike traffic, multi-frame framing).

use crate::error::{Result, TransportError};

/// Command byte carried by every bus frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Deploy a neuron table (multi-frame payload: count + records)
    LoadTable = 0x10,
    /// Start the engine's simulation loop
    Start = 0x11,
    /// Stop the loop, flushing the cache
    Stop = 0x12,
    /// Liveness probe
    Ping = 0x13,

    /// Spike event (multi-frame payload: global id, timestamp, flags)
    Spike = 0x20,

    /// Open a multi-frame transfer, declaring total payload length
    FrameStart = 0x30,
    /// One chunk of a multi-frame transfer
    FrameData = 0x31,
    /// Close a transfer, carrying the payload checksum
    FrameEnd = 0x32,
}

impl Command {
    /// Decode a command byte
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0x10 => Ok(Self::LoadTable),
            0x11 => Ok(Self::Start),
            0x12 => Ok(Self::Stop),
            0x13 => Ok(Self::Ping),
            0x20 => Ok(Self::Spike),
            0x30 => Ok(Self::FrameStart),
            0x31 => Ok(Self::FrameData),
            0x32 => Ok(Self::FrameEnd),
            byte => Err(TransportError::UnknownCommand { byte }),
        }
    }

    /// The wire byte for this command
    pub const fn byte(self) -> u8 {
        self as u8
    }
}
