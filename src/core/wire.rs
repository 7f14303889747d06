//! # Wire Encoding Helpers
//!
//! Stateless fixed-width big-endian encode/decode functions for the integer
//! and float types the protocol carries inside payloads.
//!
//! Floats travel as their IEEE-754 bit pattern. Decoders accept slices longer
//! than the required width and read the leading bytes; shorter slices fail
//! with [`ProtocolError::InvalidLength`] before any decoding happens.

use crate::error::{ProtocolError, Result};

/// Encode a signed 16-bit integer, big-endian.
#[inline]
pub fn encode_i16(value: i16) -> [u8; 2] {
    value.to_be_bytes()
}

/// Encode a signed 32-bit integer, big-endian.
#[inline]
pub fn encode_i32(value: i32) -> [u8; 4] {
    value.to_be_bytes()
}

/// Encode a signed 64-bit integer, big-endian.
#[inline]
pub fn encode_i64(value: i64) -> [u8; 8] {
    value.to_be_bytes()
}

/// Encode a 32-bit float via its bit pattern, big-endian.
#[inline]
pub fn encode_f32(value: f32) -> [u8; 4] {
    value.to_bits().to_be_bytes()
}

/// Encode a 64-bit float via its bit pattern, big-endian.
#[inline]
pub fn encode_f64(value: f64) -> [u8; 8] {
    value.to_bits().to_be_bytes()
}

/// Decode a signed 16-bit integer from the leading bytes of `bytes`.
pub fn decode_i16(bytes: &[u8]) -> Result<i16> {
    let head = take::<2>(bytes)?;
    Ok(i16::from_be_bytes(head))
}

/// Decode a signed 32-bit integer from the leading bytes of `bytes`.
pub fn decode_i32(bytes: &[u8]) -> Result<i32> {
    let head = take::<4>(bytes)?;
    Ok(i32::from_be_bytes(head))
}

/// Decode a signed 64-bit integer from the leading bytes of `bytes`.
pub fn decode_i64(bytes: &[u8]) -> Result<i64> {
    let head = take::<8>(bytes)?;
    Ok(i64::from_be_bytes(head))
}

/// Decode a 32-bit float from its bit pattern in the leading bytes of `bytes`.
pub fn decode_f32(bytes: &[u8]) -> Result<f32> {
    let head = take::<4>(bytes)?;
    Ok(f32::from_bits(u32::from_be_bytes(head)))
}

/// Decode a 64-bit float from its bit pattern in the leading bytes of `bytes`.
pub fn decode_f64(bytes: &[u8]) -> Result<f64> {
    let head = take::<8>(bytes)?;
    Ok(f64::from_bits(u64::from_be_bytes(head)))
}

#[inline]
fn take<const N: usize>(bytes: &[u8]) -> Result<[u8; N]> {
    if bytes.len() < N {
        return Err(ProtocolError::InvalidLength {
            needed: N,
            got: bytes.len(),
        });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    Ok(out)
}
