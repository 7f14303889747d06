//! # Error Types
//!
//! Comprehensive error handling for the connection core.
//!
//! This module defines all error variants that can occur during protocol
//! operations, from low-level I/O errors to frame-level violations.
//!
//! ## Error Categories
//! - **I/O Errors**: Network and file system failures
//! - **Frame Errors**: Malformed headers, oversized or truncated payloads
//! - **Connection Errors**: Write failures, closed connections, dial failures
//! - **TLS Errors**: Certificate and handshake issues
//! - **Pool Errors**: Out-of-range writes, unwired replication paths
//!
//! All errors implement `std::error::Error` for interoperability.
//!
//! ## Example Usage
//! ```rust
//! use framelink::error::{ProtocolError, Result};
//! use framelink::core::wire;
//!
//! fn parse_offset(tail: &[u8]) -> Result<i32> {
//!     wire::decode_i32(tail)
//! }
//!
//! fn main() {
//!     match parse_offset(&[0x00, 0x01]) {
//!         Ok(v) => println!("offset {v}"),
//!         Err(ProtocolError::InvalidLength { needed, got }) => {
//!             eprintln!("short input: needed {needed}, got {got}")
//!         }
//!         Err(e) => eprintln!("error: {e}"),
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
/// Static strings are borrowed, avoiding heap allocations for common error cases.
pub mod constants {
    /// Connection errors
    pub const ERR_READ_LOOP_TAKEN: &str = "Read loop already started for this connection";

    /// Listener errors
    pub const ERR_ALREADY_LISTENING: &str = "Listener is already running";

    /// Pool errors
    pub const ERR_POOL_SIZE: &str = "Pool size must be at least 1";
    pub const ERR_LEAF_UNWIRED: &str = "Leaf pool has no upstream send path wired";
}

// ProtocolError is the primary error type for all core operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Peer closed the stream mid-frame")]
    PrematureClose,

    #[error("Invalid frame header")]
    InvalidHeader,

    #[error("Frame too large: {0} bytes")]
    Oversized(usize),

    #[error("Input too short: needed {needed} bytes, got {got}")]
    InvalidLength { needed: usize, got: usize },

    #[error("Write out of range: offset {offset} + len {len} exceeds capacity {capacity}")]
    OutOfRange {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("Connect failed: {0}")]
    Connect(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
