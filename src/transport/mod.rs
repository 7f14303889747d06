//! # Transport Layer
//!
//! TLS configuration for secure connections.
//!
//! The core itself is transport-agnostic (any `AsyncRead + AsyncWrite`
//! works, which is how the tests drive it over in-memory pipes); this module
//! supplies the production transport.

pub mod tls;
