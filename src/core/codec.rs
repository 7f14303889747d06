//! # Frame Codec
//!
//! Tokio codec that turns a raw byte stream into [`Frame`]s and back.
//!
//! The decoder accumulates a residual buffer across reads, so a header or
//! payload split over any number of partial reads is reassembled rather than
//! dropped. A stream that ends with a partial frame still buffered fails with
//! [`ProtocolError::PrematureClose`].
//!
//! ## Validation
//! - Declared lengths must be non-negative; negative lengths are malformed
//! - Declared lengths above the configured maximum are rejected before any
//!   payload allocation

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::config::MAX_PAYLOAD_SIZE;
use crate::core::frame::{Frame, HEADER_LEN};
use crate::core::wire;
use crate::error::ProtocolError;

/// Codec for the `[opcode(1)] [length(4, signed BE)] [payload]` wire format.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_payload: usize,
}

impl FrameCodec {
    /// Codec with an explicit payload size cap.
    pub fn with_max_payload(max_payload: usize) -> Self {
        Self { max_payload }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::with_max_payload(MAX_PAYLOAD_SIZE)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, Self::Error> {
        if src.len() < HEADER_LEN {
            // Header incomplete, wait for more bytes
            return Ok(None);
        }

        let opcode = src[0];
        let declared = wire::decode_i32(&src[1..HEADER_LEN])?;
        if declared < 0 {
            return Err(ProtocolError::InvalidHeader);
        }

        let len = declared as usize;
        if len > self.max_payload {
            return Err(ProtocolError::Oversized(len));
        }

        if src.len() < HEADER_LEN + len {
            src.reserve(HEADER_LEN + len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        let payload = src.split_to(len).freeze();
        Ok(Some(Frame { opcode, payload }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(ProtocolError::PrematureClose),
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let len = frame.payload.len();
        if len > self.max_payload || len > i32::MAX as usize {
            return Err(ProtocolError::Oversized(len));
        }

        dst.reserve(HEADER_LEN + len);
        dst.put_u8(frame.opcode);
        dst.put_slice(&wire::encode_i32(len as i32));
        dst.put_slice(&frame.payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_frame(opcode: u8, payload: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        FrameCodec::default()
            .encode(Frame::new(opcode, payload.to_vec()), &mut buf)
            .unwrap();
        buf
    }

    #[test]
    fn test_roundtrip() {
        let mut buf = encode_frame(7, b"hello");
        let frame = FrameCodec::default().decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.opcode, 7);
        assert_eq!(&frame.payload[..], b"hello");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_zero_length_payload_is_valid() {
        let mut buf = encode_frame(1, &[]);
        assert_eq!(&buf[..], &[1, 0, 0, 0, 0]);
        let frame = FrameCodec::default().decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.opcode, 1);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_partial_header_waits() {
        let full = encode_frame(3, b"abc");
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        for &b in full.iter().take(4) {
            buf.put_u8(b);
            assert!(codec.decode(&mut buf).unwrap().is_none());
        }
        buf.put_slice(&full[4..]);
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&frame.payload[..], b"abc");
    }

    #[test]
    fn test_partial_payload_waits() {
        let full = encode_frame(9, &[0xAA; 32]);
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        buf.put_slice(&full[..HEADER_LEN + 10]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.put_slice(&full[HEADER_LEN + 10..]);
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.payload.len(), 32);
    }

    #[test]
    fn test_two_frames_in_one_buffer() {
        let mut buf = encode_frame(1, b"one");
        buf.put_slice(&encode_frame(2, b"two"));
        let mut codec = FrameCodec::default();
        let a = codec.decode(&mut buf).unwrap().unwrap();
        let b = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!((a.opcode, &a.payload[..]), (1, &b"one"[..]));
        assert_eq!((b.opcode, &b.payload[..]), (2, &b"two"[..]));
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_negative_length_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u8(5);
        buf.put_slice(&wire::encode_i32(-1));
        let err = FrameCodec::default().decode(&mut buf).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidHeader));
    }

    #[test]
    fn test_oversized_length_rejected_before_allocation() {
        let mut buf = BytesMut::new();
        buf.put_u8(5);
        buf.put_slice(&wire::encode_i32(20_000_000));
        let err = FrameCodec::default().decode(&mut buf).unwrap_err();
        assert!(matches!(err, ProtocolError::Oversized(20_000_000)));
    }

    #[test]
    fn test_eof_mid_frame_is_premature_close() {
        let full = encode_frame(4, b"payload");
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::from(&full[..HEADER_LEN + 3]);
        let err = codec.decode_eof(&mut buf).unwrap_err();
        assert!(matches!(err, ProtocolError::PrematureClose));
    }

    #[test]
    fn test_eof_clean_boundary_is_end_of_stream() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_encode_over_cap_rejected() {
        let mut codec = FrameCodec::with_max_payload(8);
        let mut buf = BytesMut::new();
        let err = codec
            .encode(Frame::new(1, vec![0u8; 9]), &mut buf)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Oversized(9)));
    }
}
