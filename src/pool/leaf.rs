//! # Leaf Pool
//!
//! Client-side replicated buffer: remote writes from the upstream peer are
//! applied locally, and local writes would be forwarded to that single
//! upstream connection.
//!
//! No upstream send path is wired yet. Local writes still apply and notify
//! subscribers, but the replication step fails with `NotImplemented` until
//! a concrete upstream transport exists. The receive side is available via
//! [`LeafPool::remote_handler`], which an application registers on its
//! upstream connection under [`POOL_OPCODE`].

use std::sync::Arc;

use crate::error::{constants, ProtocolError, Result};
use crate::pool::{PoolCore, UpdateSubscriber};
use crate::protocol::handler::{MessageHandler, SubscriberId};

/// Replicated buffer in the leaf role.
pub struct LeafPool {
    core: Arc<PoolCore>,
}

impl LeafPool {
    /// Buffer of `size` bytes. Fails when `size` is zero.
    pub fn new(size: usize) -> Result<Self> {
        Ok(Self {
            core: Arc::new(PoolCore::new(size)?),
        })
    }

    /// Apply a local write, notify subscribers, then forward it upstream.
    ///
    /// The forwarding step fails with `NotImplemented` until an upstream
    /// send path is wired; the local application has already happened by
    /// then, matching the hub-role ordering.
    pub fn write(&self, offset: usize, bytes: &[u8]) -> Result<()> {
        self.core.apply(offset, bytes)?;
        Err(ProtocolError::NotImplemented(constants::ERR_LEAF_UNWIRED))
    }

    /// Apply a replication message received from upstream. Never forwards.
    pub fn apply_remote(&self, payload: &[u8]) -> Result<()> {
        self.core.apply_remote(payload)
    }

    /// Handler that applies upstream replication messages to this buffer.
    /// Register it on the upstream connection under [`POOL_OPCODE`].
    pub fn remote_handler(&self) -> MessageHandler {
        let core = Arc::clone(&self.core);
        MessageHandler::inline(move |_conn, payload| {
            let core = Arc::clone(&core);
            async move { core.apply_remote(&payload) }
        })
    }

    /// Copy of the current buffer contents.
    pub fn snapshot(&self) -> Vec<u8> {
        self.core.snapshot()
    }

    /// Fixed buffer size.
    pub fn capacity(&self) -> usize {
        self.core.capacity()
    }

    /// Subscribe to buffer updates. Returns the id used for removal.
    pub fn add_update_subscriber(&self, subscriber: UpdateSubscriber) -> SubscriberId {
        self.core.add_subscriber(subscriber)
    }

    /// Remove an update subscriber. Returns whether one was found.
    pub fn remove_update_subscriber(&self, id: SubscriberId) -> bool {
        self.core.remove_subscriber(id)
    }
}

impl std::fmt::Debug for LeafPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeafPool")
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}
