//! # Handler Descriptors
//!
//! Tagged callback descriptors for frame dispatch and connect notification.
//!
//! A [`MessageHandler`] is a plain `{heavy, callback}` pair: the `heavy` tag
//! decides whether the callback runs inline on the read loop or is offloaded
//! to the background task pool. Registration hands back an id token used for
//! removal, since closures have no usable identity of their own.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;

use crate::error::Result;
use crate::protocol::connection::Connection;

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

/// Token identifying a registered message handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Token identifying a registered subscriber (connect or buffer update).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub(crate) fn next() -> Self {
        Self(NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

type HandlerFn = Arc<dyn Fn(Arc<Connection>, Bytes) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// A message handler registered for one opcode.
#[derive(Clone)]
pub struct MessageHandler {
    id: HandlerId,
    heavy: bool,
    callback: HandlerFn,
}

impl MessageHandler {
    /// Handler that runs on the read loop. A slow inline handler stalls
    /// further reads on its connection.
    pub fn inline<F, Fut>(callback: F) -> Self
    where
        F: Fn(Arc<Connection>, Bytes) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        Self::build(false, callback)
    }

    /// Handler offloaded to the background task pool, one task per
    /// invocation. Errors are logged and swallowed at the task boundary.
    pub fn heavy<F, Fut>(callback: F) -> Self
    where
        F: Fn(Arc<Connection>, Bytes) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        Self::build(true, callback)
    }

    fn build<F, Fut>(heavy: bool, callback: F) -> Self
    where
        F: Fn(Arc<Connection>, Bytes) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            id: HandlerId(NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed)),
            heavy,
            callback: Arc::new(move |conn, payload| Box::pin(callback(conn, payload))),
        }
    }

    /// The id handed back by registration.
    pub fn id(&self) -> HandlerId {
        self.id
    }

    /// Whether this handler is offloaded to the task pool.
    pub fn is_heavy(&self) -> bool {
        self.heavy
    }

    pub(crate) fn invoke(
        &self,
        conn: Arc<Connection>,
        payload: Bytes,
    ) -> BoxFuture<'static, Result<()>> {
        (self.callback)(conn, payload)
    }
}

impl fmt::Debug for MessageHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageHandler")
            .field("id", &self.id)
            .field("heavy", &self.heavy)
            .finish_non_exhaustive()
    }
}

type ConnectFn = Arc<dyn Fn(&Arc<Connection>) + Send + Sync>;

/// Callback invoked for every newly registered server-side connection.
#[derive(Clone)]
pub struct ConnectSubscriber {
    id: SubscriberId,
    callback: ConnectFn,
}

impl ConnectSubscriber {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&Arc<Connection>) + Send + Sync + 'static,
    {
        Self {
            id: SubscriberId::next(),
            callback: Arc::new(callback),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub(crate) fn invoke(&self, conn: &Arc<Connection>) {
        (self.callback)(conn);
    }
}

impl fmt::Debug for ConnectSubscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectSubscriber")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
