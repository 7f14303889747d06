//! # Connection Registry
//!
//! The set of live server-side connections plus the group operations over
//! them: broadcast, blacklist, connect notification, bulk shutdown.
//!
//! Every collection here can be mutated from the accept loop while read
//! loops and application code iterate it, so iteration always happens over a
//! snapshot taken under the lock.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::config::DEFAULT_READ_BUFFER_SIZE;
use crate::protocol::connection::Connection;
use crate::protocol::handler::{ConnectSubscriber, SubscriberId};
use crate::protocol::permission::Permission;
use crate::utils::task_pool::TaskPool;

/// Policy applied when a peer identity is already present in the live set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Register every accepted peer, duplicates included.
    #[default]
    AcceptAll,
    /// Reject registration when the identity is already live.
    RejectSameIdentity,
}

/// Tracks all live server-side connections.
pub struct ConnectionRegistry {
    connections: RwLock<Vec<Arc<Connection>>>,
    blacklist: RwLock<HashSet<String>>,
    subscribers: RwLock<Vec<ConnectSubscriber>>,
    default_permission: Permission,
    duplicate_policy: DuplicatePolicy,
    read_buffer_size: usize,
    tasks: TaskPool,
}

impl ConnectionRegistry {
    /// Registry assigning `default_permission` to every new connection and
    /// handing `tasks` to each of them for heavy-handler offload.
    pub fn new(default_permission: Permission, tasks: TaskPool) -> Self {
        Self {
            connections: RwLock::new(Vec::new()),
            blacklist: RwLock::new(HashSet::new()),
            subscribers: RwLock::new(Vec::new()),
            default_permission,
            duplicate_policy: DuplicatePolicy::default(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            tasks,
        }
    }

    /// Set the duplicate-identity policy.
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Set the initial receive-buffer capacity for new connections.
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Wrap a raw transport into a [`Connection`], add it to the live set,
    /// and notify every connect subscriber in order.
    ///
    /// Returns `None` without registering when the duplicate policy rejects
    /// the identity; the transport is dropped, which closes it.
    pub fn register<T>(&self, io: T, identity: impl Into<String>) -> Option<Arc<Connection>>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let identity = identity.into();

        if self.duplicate_policy == DuplicatePolicy::RejectSameIdentity
            && self.lookup(&identity).is_some()
        {
            debug!(peer = %identity, "Rejected duplicate connection");
            return None;
        }

        let conn = Connection::new(
            io,
            identity.clone(),
            self.default_permission,
            self.read_buffer_size,
            self.tasks.clone(),
        );

        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&conn));

        let subscribers = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for subscriber in subscribers {
            subscriber.invoke(&conn);
        }

        info!(peer = %identity, "Connection registered");
        Some(conn)
    }

    /// Send `(opcode, payload)` to every live connection. A failure on one
    /// connection is logged and does not abort delivery to the rest.
    pub async fn broadcast(&self, opcode: u8, payload: impl Into<Bytes>) {
        let payload = payload.into();
        for conn in self.connections() {
            if let Err(e) = conn.send(opcode, payload.clone()).await {
                warn!(peer = %conn.peer(), opcode, error = %e, "Broadcast delivery failed");
            }
        }
    }

    /// Find a live connection by peer identity.
    pub fn lookup(&self, identity: &str) -> Option<Arc<Connection>> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|c| c.peer() == identity)
            .cloned()
    }

    /// Close a single connection by identity and remove it from the live
    /// set. Returns whether one was found.
    pub async fn close_by_identity(&self, identity: &str) -> bool {
        let Some(conn) = self.lookup(identity) else {
            return false;
        };

        conn.close().await;
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|c| !Arc::ptr_eq(c, &conn));
        true
    }

    /// Whether an identity is blacklisted.
    pub fn is_blocked(&self, identity: &str) -> bool {
        self.blacklist
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(identity)
    }

    /// Add an identity to the blacklist. Does not close a connection that is
    /// already live under that identity.
    pub fn block(&self, identity: impl Into<String>) {
        self.blacklist
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identity.into());
    }

    /// Remove an identity from the blacklist.
    pub fn unblock(&self, identity: &str) {
        self.blacklist
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(identity);
    }

    /// Close every live connection. The list itself is left as-is; callers
    /// that want an empty registry remove entries separately.
    pub async fn close_all(&self) {
        for conn in self.connections() {
            conn.close().await;
        }
    }

    /// Subscribe to connect events. Returns the id used for removal.
    pub fn add_connect_subscriber(&self, subscriber: ConnectSubscriber) -> SubscriberId {
        let id = subscriber.id();
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subscriber);
        id
    }

    /// Remove a connect subscriber. Returns whether one was found.
    pub fn remove_connect_subscriber(&self, id: SubscriberId) -> bool {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|s| s.id() != id);
        subscribers.len() != before
    }

    /// Snapshot of the live connection list.
    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of connections currently in the live list.
    pub fn len(&self) -> usize {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the live list is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The task pool handed to each registered connection.
    pub fn task_pool(&self) -> &TaskPool {
        &self.tasks
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("connections", &self.len())
            .field("duplicate_policy", &self.duplicate_policy)
            .field("default_permission", &self.default_permission)
            .finish_non_exhaustive()
    }
}
