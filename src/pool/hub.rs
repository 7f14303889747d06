//! # Hub Pool
//!
//! Server-side replicated buffer: local writes broadcast to every registry
//! member, and every member's reserved-opcode messages are applied locally.
//!
//! Construction wires the receive side onto all current registry members
//! and, through a connect subscriber, onto every member registered later.

use std::sync::Arc;

use bytes::Bytes;

use crate::error::Result;
use crate::pool::{replication_payload, PoolCore, UpdateSubscriber, POOL_OPCODE};
use crate::protocol::handler::{ConnectSubscriber, MessageHandler, SubscriberId};
use crate::protocol::registry::ConnectionRegistry;

/// Replicated buffer in the hub role.
pub struct HubPool {
    core: Arc<PoolCore>,
    registry: Arc<ConnectionRegistry>,
}

impl HubPool {
    /// Buffer of `size` bytes replicated to every member of `registry`.
    ///
    /// Fails when `size` is zero.
    pub fn new(size: usize, registry: Arc<ConnectionRegistry>) -> Result<Self> {
        let core = Arc::new(PoolCore::new(size)?);

        for conn in registry.connections() {
            conn.add_handler(POOL_OPCODE, remote_handler(&core));
        }

        // The subscriber captures the core, not the pool, so dropping the
        // pool cannot leave a reference cycle through the registry.
        let wired = Arc::clone(&core);
        registry.add_connect_subscriber(ConnectSubscriber::new(move |conn| {
            conn.add_handler(POOL_OPCODE, remote_handler(&wired));
        }));

        Ok(Self { core, registry })
    }

    /// Apply a local write and broadcast it to every registry member.
    ///
    /// Fails with `OutOfRange` before any mutation when the write exceeds
    /// capacity. Per-member delivery failures are logged by the broadcast
    /// and do not fail the write.
    pub async fn write(&self, offset: usize, bytes: &[u8]) -> Result<()> {
        let payload = replication_payload(offset, bytes)?;
        self.core.apply(offset, bytes)?;
        self.registry
            .broadcast(POOL_OPCODE, Bytes::from(payload))
            .await;
        Ok(())
    }

    /// Apply a replication message received from a peer. Never re-broadcasts.
    pub fn apply_remote(&self, payload: &[u8]) -> Result<()> {
        self.core.apply_remote(payload)
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

fn remote_handler(core: &Arc<PoolCore>) -> MessageHandler {
    let core = Arc::clone(core);
    MessageHandler::inline(move |_conn, payload| {
        let core = Arc::clone(&core);
        async move { core.apply_remote(&payload) }
    })
}

impl std::fmt::Debug for HubPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubPool")
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}
