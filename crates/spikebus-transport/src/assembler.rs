//! Multi-frame transfer assembly
//!
//! A transfer is `FRAME_START{op, total_len}`, data chunks in sequence, and
//! `FRAME_END{checksum}`. The assembler buffers chunks and only yields the
//! payload after the CRC over the whole buffer checks out; a transfer that
//! fails for any reason is discarded in full, never partially delivered.

use crate::{
    command::Command,
    error::{Result, TransportError},
    frame::{BusTarget, Frame, FramePayload},
};
use spikebus_wire::NodeId;

/// Default bytes per FRAME_DATA chunk
pub const DEFAULT_CHUNK_SIZE: usize = 32;

/// Default assembly timeout in bus ticks
pub const DEFAULT_TIMEOUT_TICKS: u64 = 1024;

#[derive(Debug)]
struct Transfer {
    op: Command,
    source: NodeId,
    total_len: usize,
    buffer: Vec<u8>,
    next_seq: u16,
    started_at: u64,
}

/// Reassembles one multi-frame transfer at a time per sender.
///
/// The reference bus serializes transfers, so a new FRAME_START while one is
/// open means the previous sender stalled; the stale transfer is discarded
/// and counted.
#[derive(Debug)]
pub struct FrameAssembler {
    active: Option<Transfer>,
    timeout_ticks: u64,
    discarded: u64,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT_TICKS)
    }
}

impl FrameAssembler {
    /// Create an assembler that discards transfers stalled past
    /// `timeout_ticks`
    pub fn new(timeout_ticks: u64) -> Self {
        Self {
            active: None,
            timeout_ticks,
            discarded: 0,
        }
    }

    /// Feed one frame. Returns the completed `(op, payload)` when a transfer
    /// finishes; `None` while one is still accumulating or for non-transfer
    /// frames.
    pub fn accept(&mut self, frame: &Frame, now: u64) -> Result<Option<(Command, NodeId, Vec<u8>)>> {
        match &frame.payload {
            FramePayload::FrameStart { op, total_len } => {
                if let Some(stale) = self.active.take() {
                    log::warn!(
                        "Discarding stalled transfer from {} ({} of {} bytes)",
                        stale.source,
                        stale.buffer.len(),
                        stale.total_len
                    );
                    self.discarded += 1;
                }
                self.active = Some(Transfer {
                    op: *op,
                    source: frame.source,
                    total_len: *total_len as usize,
                    buffer: Vec::with_capacity(*total_len as usize),
                    next_seq: 0,
                    started_at: now,
                });
                Ok(None)
            }
            FramePayload::FrameData { seq, chunk } => {
                let transfer = match self.active.as_mut() {
                    Some(t) => t,
                    None => {
                        self.discarded += 1;
                        return Err(TransportError::UnexpectedFrame { frame: "FRAME_DATA" });
                    }
                };
                if *seq != transfer.next_seq {
                    let expected = transfer.next_seq;
                    self.abort();
                    return Err(TransportError::SequenceGap {
                        expected,
                        found: *seq,
                    });
                }
                if transfer.buffer.len() + chunk.len() > transfer.total_len {
                    let declared = transfer.total_len;
                    let received = transfer.buffer.len() + chunk.len();
                    self.abort();
                    return Err(TransportError::PayloadOverrun { declared, received });
                }
                transfer.buffer.extend_from_slice(chunk);
                transfer.next_seq += 1;
                Ok(None)
            }
            FramePayload::FrameEnd { checksum } => {
                let transfer = match self.active.take() {
                    Some(t) => t,
                    None => {
                        self.discarded += 1;
                        return Err(TransportError::UnexpectedFrame { frame: "FRAME_END" });
                    }
                };
                if transfer.buffer.len() != transfer.total_len {
                    self.discarded += 1;
                    return Err(TransportError::TransferIncomplete {
                        expected: transfer.total_len,
                        got: transfer.buffer.len(),
                    });
                }
                let computed = crc32fast::hash(&transfer.buffer);
                if computed != *checksum {
                    self.discarded += 1;
                    return Err(TransportError::ChecksumMismatch {
                        expected: *checksum,
                        computed,
                    });
                }
                Ok(Some((transfer.op, transfer.source, transfer.buffer)))
            }
            FramePayload::Command { .. } => Ok(None),
        }
    }

    /// Discard the active transfer if it has sat longer than the timeout.
    /// Returns the error to report, if any.
    pub fn expire(&mut self, now: u64) -> Option<TransportError> {
        let stalled = self
            .active
            .as_ref()
            .map(|t| now.saturating_sub(t.started_at) > self.timeout_ticks)
            .unwrap_or(false);
        if !stalled {
            return None;
        }
        let transfer = self.active.take()?;
        self.discarded += 1;
        log::warn!(
            "Transfer from {} timed out with {} of {} bytes",
            transfer.source,
            transfer.buffer.len(),
            transfer.total_len
        );
        Some(TransportError::TransferTimeout {
            ticks: now.saturating_sub(transfer.started_at),
        })
    }

    /// Whether a transfer is currently accumulating
    pub fn in_progress(&self) -> bool {
        self.active.is_some()
    }

    /// Transfers discarded so far (stale, malformed, corrupt, or timed out)
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    fn abort(&mut self) {
        self.active = None;
        self.discarded += 1;
    }
}

/// Largest payload one transfer can carry, bounded by the 2-byte length
/// field of FRAME_START.
pub const MAX_TRANSFER_SIZE: usize = u16::MAX as usize;

/// Split a payload into the frame sequence that carries it: FRAME_START,
/// data chunks of `chunk_size`, FRAME_END with the payload CRC.
///
/// Payloads larger than [`MAX_TRANSFER_SIZE`] fail `PayloadTooLarge` at the
/// sender; the length field cannot declare them and a silently truncated
/// declaration would only be discovered as corruption at the receiver.
pub fn split_into_frames(
    source: NodeId,
    target: BusTarget,
    op: Command,
    payload: &[u8],
    chunk_size: usize,
) -> Result<Vec<Frame>> {
    if payload.len() > MAX_TRANSFER_SIZE {
        return Err(TransportError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_TRANSFER_SIZE,
        });
    }
    let mut frames = Vec::with_capacity(payload.len() / chunk_size.max(1) + 2);
    frames.push(Frame {
        source,
        target,
        payload: FramePayload::FrameStart {
            op,
            total_len: payload.len() as u16,
        },
    });
    for (seq, chunk) in payload.chunks(chunk_size.max(1)).enumerate() {
        frames.push(Frame {
            source,
            target,
            payload: FramePayload::FrameData {
                seq: seq as u16,
                chunk: chunk.to_vec(),
            },
        });
    }
    frames.push(Frame {
        source,
        target,
        payload: FramePayload::FrameEnd {
            checksum: crc32fast::hash(payload),
        },
    });
    Ok(frames)
}
