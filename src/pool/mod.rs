//! # Replicated Buffer
//!
//! A fixed-size shared byte buffer kept consistent across peers by sending
//! writes as protocol messages on the reserved opcode.
//!
//! Every participant holds a buffer of the same size (the protocol does not
//! negotiate it). A local write is applied immediately, update subscribers
//! are notified, and the write is replicated as `bytes ++ offset(4, BE)`.
//! A remote write arrives through the same reserved opcode and is applied
//! via the identical validated path, but is never re-replicated, so writes
//! cannot echo between peers.
//!
//! There is no versioning: concurrent writes to overlapping ranges resolve
//! by arrival order at each replica, and replicas may diverge if writes
//! race. This is accepted, not corrected.
//!
//! ## Roles
//! - [`HubPool`]: replication broadcasts to every registry member
//! - [`LeafPool`]: replication targets a single upstream connection

pub mod hub;
pub mod leaf;

pub use hub::HubPool;
pub use leaf::LeafPool;

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::core::wire;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::handler::SubscriberId;

/// Reserved opcode for replicated-buffer synchronization messages.
pub const POOL_OPCODE: u8 = 0x81;

type UpdateFn = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Callback invoked with a buffer snapshot after every applied write,
/// whether it originated locally or remotely.
#[derive(Clone)]
pub struct UpdateSubscriber {
    id: SubscriberId,
    callback: UpdateFn,
}

impl UpdateSubscriber {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        Self {
            id: SubscriberId::next(),
            callback: Arc::new(callback),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }
}

impl std::fmt::Debug for UpdateSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateSubscriber")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Buffer state and application logic shared by both roles.
pub(crate) struct PoolCore {
    buffer: Mutex<Vec<u8>>,
    subscribers: RwLock<Vec<UpdateSubscriber>>,
}

impl PoolCore {
    pub(crate) fn new(size: usize) -> Result<Self> {
        if size < 1 {
            return Err(ProtocolError::Config(constants::ERR_POOL_SIZE.into()));
        }
        Ok(Self {
            buffer: Mutex::new(vec![0u8; size]),
            subscribers: RwLock::new(Vec::new()),
        })
    }

    pub(crate) fn capacity(&self) -> usize {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub(crate) fn snapshot(&self) -> Vec<u8> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Validate and apply a write, then notify subscribers with a snapshot.
    /// The buffer is untouched when validation fails.
    pub(crate) fn apply(&self, offset: usize, bytes: &[u8]) -> Result<()> {
        let snapshot = {
            let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
            let capacity = buffer.len();
            if offset + bytes.len() > capacity {
                return Err(ProtocolError::OutOfRange {
                    offset,
                    len: bytes.len(),
                    capacity,
                });
            }
            buffer[offset..offset + bytes.len()].copy_from_slice(bytes);
            buffer.clone()
        };

        let subscribers = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for subscriber in subscribers {
            (subscriber.callback)(&snapshot);
        }
        Ok(())
    }

    /// Apply a replication message: the trailing four bytes are the offset,
    /// everything before them is the data. Never re-replicates.
    pub(crate) fn apply_remote(&self, payload: &[u8]) -> Result<()> {
        if payload.len() < 4 {
            return Err(ProtocolError::InvalidLength {
                needed: 4,
                got: payload.len(),
            });
        }

        let (bytes, tail) = payload.split_at(payload.len() - 4);
        let offset = wire::decode_i32(tail)?;
        if offset < 0 {
            return Err(ProtocolError::InvalidHeader);
        }

        self.apply(offset as usize, bytes)
    }

    pub(crate) fn add_subscriber(&self, subscriber: UpdateSubscriber) -> SubscriberId {
        let id = subscriber.id();
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subscriber);
        id
    }

    pub(crate) fn remove_subscriber(&self, id: SubscriberId) -> bool {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|s| s.id() != id);
        subscribers.len() != before
    }
}

/// Encode a write as its replication payload: `bytes ++ offset(4, BE)`.
pub(crate) fn replication_payload(offset: usize, bytes: &[u8]) -> Result<Vec<u8>> {
    let offset = i32::try_from(offset).map_err(|_| ProtocolError::OutOfRange {
        offset,
        len: bytes.len(),
        capacity: i32::MAX as usize,
    })?;

    let mut payload = Vec::with_capacity(bytes.len() + 4);
    payload.extend_from_slice(bytes);
    payload.extend_from_slice(&wire::encode_i32(offset));
    Ok(payload)
}
