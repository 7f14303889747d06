//! # framelink
//!
//! TLS-based, message-oriented connection core for Rust services.
//!
//! The crate frames a byte stream into `(opcode, payload)` messages, routes
//! each message to the handlers registered for its opcode, manages the
//! server-side connection lifecycle (accept, register, blacklist, broadcast,
//! close), and builds a replicated shared byte buffer on top of the framing.
//!
//! ## Wire Format
//! ```text
//! [Opcode(1)] [Length(4, signed BE)] [Payload(N)]
//! ```
//! No version field, no checksum, no compression. Opcode `0x81` is reserved
//! for replicated-buffer synchronization.
//!
//! ## Layers
//! - [`core`]: wire helpers, the frame type, and the stream codec
//! - [`protocol`]: connections, handler dispatch, permissions, the registry
//! - [`service`]: the TLS listener and the outbound connector
//! - [`transport`]: TLS configuration (rustls)
//! - [`pool`]: the replicated buffer in hub and leaf roles
//! - [`utils`]: the bounded task pool and logging setup
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use framelink::protocol::handler::MessageHandler;
//! use framelink::protocol::permission::Permission;
//! use framelink::protocol::registry::ConnectionRegistry;
//! use framelink::service::listener::Listener;
//! use framelink::transport::tls::TlsServerConfig;
//! use framelink::utils::task_pool::TaskPool;
//!
//! # async fn demo() -> framelink::error::Result<()> {
//! let registry = Arc::new(ConnectionRegistry::new(
//!     Permission::Read,
//!     TaskPool::bounded(64),
//! ));
//!
//! registry.add_connect_subscriber(framelink::protocol::handler::ConnectSubscriber::new(
//!     |conn| {
//!         conn.add_handler(
//!             0x01,
//!             MessageHandler::inline(|conn, payload| async move {
//!                 conn.send(0x02, payload).await
//!             }),
//!         );
//!     },
//! ));
//!
//! let tls = TlsServerConfig::new("server-cert.pem", "server-key.pem");
//! let listener = Listener::new("0.0.0.0:9000", tls, registry);
//! listener.start().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency Model
//! One task per connection drives its read loop. Inline handlers run on that
//! task in strict arrival order; heavy handlers are offloaded to an
//! explicitly injected, semaphore-bounded [`utils::task_pool::TaskPool`] and
//! may complete out of order. No ordering exists across connections.

pub mod config;
pub mod core;
pub mod error;
pub mod pool;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use error::{ProtocolError, Result};

pub use crate::core::codec::FrameCodec;
pub use crate::core::frame::Frame;

pub use protocol::connection::{Connection, ConnectionState};
pub use protocol::handler::{ConnectSubscriber, HandlerId, MessageHandler, SubscriberId};
pub use protocol::permission::Permission;
pub use protocol::registry::{ConnectionRegistry, DuplicatePolicy};

pub use service::connector::Connector;
pub use service::listener::{Listener, ListenerState};

pub use pool::{HubPool, LeafPool, UpdateSubscriber, POOL_OPCODE};

pub use utils::task_pool::TaskPool;
