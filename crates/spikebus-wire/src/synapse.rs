//! Packed synapse entries
//!
//! Each synapse occupies a single 32-bit word: a 24-bit encoded source
//! address (the pre-synaptic neuron's global id) and an 8-bit quantized
//! weight. The record format stores *incoming* synapses per neuron, so the
//! source here is always the neuron whose spike feeds this one.

use crate::ids::GlobalId;

/// Size of one packed synapse entry in bytes
pub const SYNAPSE_SIZE: usize = 4;

/// Quantization scale of the 8-bit weight encoding: 1/64 per step
const WEIGHT_SCALE: f32 = 64.0;

/// Largest representable weight magnitude
pub const WEIGHT_LIMIT: f32 = 127.0 / WEIGHT_SCALE;

/// Encode a weight into the offset-128 byte representation.
///
/// Bytes 0-127 carry non-negative magnitudes, 128-255 carry negative ones.
/// Values outside the representable range saturate; non-finite input encodes
/// as zero.
pub fn encode_weight(weight: f32) -> u8 {
    if !weight.is_finite() {
        return 0;
    }
    let clamped = weight.clamp(-WEIGHT_LIMIT, WEIGHT_LIMIT);
    let magnitude = (clamped.abs() * WEIGHT_SCALE).round() as u8;
    if clamped.is_sign_negative() {
        128 + magnitude.min(127)
    } else {
        magnitude.min(127)
    }
}

/// Decode an offset-128 weight byte back to a float.
///
/// Exact inverse of [`encode_weight`] over all 256 byte values:
/// `encode_weight(decode_weight(b)) == b`.
pub fn decode_weight(byte: u8) -> f32 {
    if byte < 128 {
        byte as f32 / WEIGHT_SCALE
    } else {
        -((byte - 128) as f32) / WEIGHT_SCALE
    }
}

/// One incoming synapse of a neuron record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynapseEntry {
    /// Global address of the pre-synaptic neuron
    pub source: GlobalId,
    /// Synaptic weight, bounded to the codec's representable range
    pub weight: f32,
}

impl SynapseEntry {
    /// Create a new synapse entry
    pub fn new(source: GlobalId, weight: f32) -> Self {
        Self { source, weight }
    }

    /// Create an entry with the weight snapped to the wire quantization grid.
    ///
    /// Records built from quantized entries survive encode/decode without
    /// change, which is what the round-trip law is stated over.
    pub fn quantized(source: GlobalId, weight: f32) -> Self {
        Self {
            source,
            weight: decode_weight(encode_weight(weight)),
        }
    }

    /// Pack into a single wire word: weight byte in the top 8 bits, 24-bit
    /// source address in the low bits.
    pub fn pack(&self) -> u32 {
        ((encode_weight(self.weight) as u32) << 24) | (self.source.raw() & GlobalId::MAX_RAW)
    }

    /// Unpack from a wire word
    pub fn unpack(word: u32) -> Self {
        Self {
            // Masked to 24 bits by construction, cannot be out of range
            source: GlobalId(word & GlobalId::MAX_RAW),
            weight: decode_weight((word >> 24) as u8),
        }
    }
}
