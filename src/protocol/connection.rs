//! # Connection
//!
//! One transport endpoint, framed and opcode-routed.
//!
//! A `Connection` turns a raw byte stream into discrete `(opcode, payload)`
//! events and back. The read loop decodes frames off the transport and hands
//! each one to the handlers registered for its opcode: heavy handlers go to
//! the background task pool, everything else runs inline in arrival order.
//!
//! ## Lifecycle
//! ```text
//! Active -> (EOF | I/O error | explicit close) -> Closing -> Closed
//! ```
//!
//! There is no reconnect; a new `Connection` is constructed for a new
//! attempt. `close` is idempotent and safe to call from any task, including
//! concurrently with the read loop.

use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError, RwLock};

use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::DEFAULT_READ_BUFFER_SIZE;
use crate::core::codec::FrameCodec;
use crate::core::frame::Frame;
use crate::error::{ProtocolError, Result};
use crate::protocol::handler::{HandlerId, MessageHandler};
use crate::protocol::permission::Permission;
use crate::utils::task_pool::TaskPool;

type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame>> + Send>>;
type FrameSink = Pin<Box<dyn Sink<Frame, Error = ProtocolError> + Send>>;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Read loop may run; sends are accepted.
    Active,
    /// Close has begun; the socket is being torn down.
    Closing,
    /// Socket closed. The connection is unusable and should be dropped.
    Closed,
}

const STATE_ACTIVE: u8 = 0;
const STATE_CLOSING: u8 = 1;
const STATE_CLOSED: u8 = 2;

fn state_from(raw: u8) -> ConnectionState {
    match raw {
        STATE_ACTIVE => ConnectionState::Active,
        STATE_CLOSING => ConnectionState::Closing,
        _ => ConnectionState::Closed,
    }
}

/// A framed, opcode-routed connection over one transport.
pub struct Connection {
    peer: String,
    state: AtomicU8,
    shutdown: CancellationToken,
    handlers: RwLock<HashMap<u8, Vec<MessageHandler>>>,
    reader: StdMutex<Option<FrameStream>>,
    writer: Mutex<Option<FrameSink>>,
    permission: RwLock<Permission>,
    tasks: TaskPool,
}

impl Connection {
    /// Wrap a transport. `peer` is the identity used by the registry and in
    /// logs, typically the peer's IP address.
    pub fn new<T>(
        io: T,
        peer: impl Into<String>,
        permission: Permission,
        read_buffer_size: usize,
        tasks: TaskPool,
    ) -> Arc<Self>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(io);
        let capacity = read_buffer_size.clamp(1, crate::config::MAX_PAYLOAD_SIZE);
        let frames = FramedRead::with_capacity(read_half, FrameCodec::default(), capacity);
        let sink = FramedWrite::new(write_half, FrameCodec::default());

        Arc::new(Self {
            peer: peer.into(),
            state: AtomicU8::new(STATE_ACTIVE),
            shutdown: CancellationToken::new(),
            handlers: RwLock::new(HashMap::new()),
            reader: StdMutex::new(Some(Box::pin(frames))),
            writer: Mutex::new(Some(Box::pin(sink))),
            permission: RwLock::new(permission),
            tasks,
        })
    }

    /// Wrap a transport with the default receive-buffer capacity.
    pub fn with_defaults<T>(io: T, peer: impl Into<String>, tasks: TaskPool) -> Arc<Self>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::new(io, peer, Permission::None, DEFAULT_READ_BUFFER_SIZE, tasks)
    }

    /// Peer identity this connection was registered under.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        state_from(self.state.load(Ordering::Acquire))
    }

    /// Whether the connection still accepts sends.
    pub fn is_active(&self) -> bool {
        self.state() == ConnectionState::Active
    }

    /// Advisory permission tag.
    pub fn permission(&self) -> Permission {
        *self
            .permission
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the advisory permission tag.
    pub fn set_permission(&self, permission: Permission) {
        *self
            .permission
            .write()
            .unwrap_or_else(PoisonError::into_inner) = permission;
    }

    /// Register a handler for an opcode. Handlers for the same opcode are
    /// invoked in registration order; multiple handlers per opcode are
    /// allowed. Registration may race freely with dispatch.
    pub fn add_handler(&self, opcode: u8, handler: MessageHandler) -> HandlerId {
        let id = handler.id();
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(opcode)
            .or_default()
            .push(handler);
        id
    }

    /// Remove a previously registered handler. Returns whether one was found.
    pub fn remove_handler(&self, opcode: u8, id: HandlerId) -> bool {
        let mut map = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match map.get_mut(&opcode) {
            Some(list) => {
                let before = list.len();
                list.retain(|h| h.id() != id);
                list.len() != before
            }
            None => false,
        }
    }

    /// Frame and write `opcode + length + payload`, flushing before return.
    ///
    /// Write failures surface as `Transport` and are not retried; the caller
    /// decides. Fails with `ConnectionClosed` once close has begun.
    pub async fn send(&self, opcode: u8, payload: impl Into<Bytes>) -> Result<()> {
        if !self.is_active() {
            return Err(ProtocolError::ConnectionClosed);
        }

        let frame = Frame::new(opcode, payload.into());
        let mut guard = self.writer.lock().await;
        let sink = guard.as_mut().ok_or(ProtocolError::ConnectionClosed)?;
        sink.send(frame).await.map_err(|e| match e {
            ProtocolError::Io(io) => ProtocolError::Transport(io.to_string()),
            other => other,
        })
    }

    /// Drive the read loop until EOF, an I/O failure, or close. The
    /// connection is closed before this returns, whatever the exit path.
    ///
    /// The frame stream is taken exactly once; a second call fails without
    /// touching the transport.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let mut frames = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| {
                ProtocolError::Custom(crate::error::constants::ERR_READ_LOOP_TAKEN.into())
            })?;

        debug!(peer = %self.peer, "Read loop started");

        let result = loop {
            if !self.is_active() {
                break Ok(());
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => break Ok(()),
                next = frames.next() => match next {
                    Some(Ok(frame)) => Self::dispatch(&self, frame).await,
                    Some(Err(e)) => {
                        warn!(peer = %self.peer, error = %e, "Read loop terminating on error");
                        break Err(e);
                    }
                    None => {
                        debug!(peer = %self.peer, "Peer closed the stream");
                        break Ok(());
                    }
                },
            }
        };

        self.close().await;
        result
    }

    /// Invoke every handler registered for the frame's opcode, in
    /// registration order. Heavy handlers are offloaded; inline handlers run
    /// here and stall further reads while they execute.
    async fn dispatch(conn: &Arc<Self>, frame: Frame) {
        let snapshot = conn
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&frame.opcode)
            .cloned();

        let Some(list) = snapshot else {
            trace!(peer = %conn.peer, opcode = frame.opcode, "No handlers for opcode");
            return;
        };

        for handler in list {
            if handler.is_heavy() {
                let task_conn = Arc::clone(conn);
                let payload = frame.payload.clone();
                conn.tasks.spawn(async move {
                    let peer = task_conn.peer.clone();
                    if let Err(e) = handler.invoke(task_conn, payload).await {
                        warn!(peer = %peer, error = %e, "Heavy handler failed");
                    }
                });
            } else if let Err(e) = handler
                .invoke(Arc::clone(conn), frame.payload.clone())
                .await
            {
                warn!(peer = %conn.peer, opcode = frame.opcode, error = %e, "Inline handler failed");
            }
        }
    }

    /// Close the connection. Idempotent; safe to call from any task. Cancels
    /// the read loop and closes the underlying transport.
    pub async fn close(&self) {
        if self
            .state
            .compare_exchange(
                STATE_ACTIVE,
                STATE_CLOSING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return;
        }

        self.shutdown.cancel();

        let mut guard = self.writer.lock().await;
        if let Some(mut sink) = guard.take() {
            if let Err(e) = sink.close().await {
                debug!(peer = %self.peer, error = %e, "Error closing transport");
            }
        }
        drop(guard);

        self.state.store(STATE_CLOSED, Ordering::Release);
        info!(peer = %self.peer, "Connection closed");
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("state", &self.state())
            .field("permission", &self.permission())
            .finish_non_exhaustive()
    }
}
