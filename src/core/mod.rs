//! # Core Protocol Components
//!
//! Low-level frame handling, codecs, and fixed-width binary encoding.
//!
//! This module provides the foundation for the protocol, handling frame
//! framing, encoding/decoding, and wire format.
//!
//! ## Components
//! - **Wire**: stateless big-endian integer/float encode and decode helpers
//! - **Frame**: the `(opcode, payload)` wire unit
//! - **Codec**: Tokio codec for framing over byte streams
//!
//! ## Wire Format
//! ```text
//! [Opcode(1)] [Length(4, signed BE)] [Payload(N)]
//! ```
//!
//! ## Security
//! - Maximum payload size: 16MB (prevents memory exhaustion)
//! - Length validation before allocation
//! - Negative declared lengths rejected as malformed

pub mod codec;
pub mod frame;
pub mod wire;
