//! # Frame
//!
//! The wire unit of the protocol: a one-byte opcode tag, a four-byte signed
//! big-endian payload length, and the payload itself.
//!
//! The opcode routes a frame to its registered handlers; the core attaches no
//! meaning to it beyond routing. Payloads are opaque bytes.

use bytes::Bytes;

/// Size of the frame header: opcode byte plus length field.
pub const HEADER_LEN: usize = 5;

/// A single `(opcode, payload)` unit as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// One-byte routing tag (0-255).
    pub opcode: u8,
    /// Opaque payload bytes. May be empty.
    pub payload: Bytes,
}

impl Frame {
    /// Build a frame from an opcode and payload bytes.
    pub fn new(opcode: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            opcode,
            payload: payload.into(),
        }
    }

    /// Total encoded size of this frame including the header.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }
}
