//! # Listener
//!
//! TLS accept loop feeding a [`ConnectionRegistry`].
//!
//! ## Lifecycle
//! ```text
//! Stopped -> Listening -> Stopping -> Stopped
//! ```
//!
//! For each accepted socket: a blacklisted peer is dropped before the TLS
//! handshake; everything else gets its own task that performs the handshake,
//! registers with the registry, and drives the new connection's read loop.
//! Accept-level I/O errors are fatal and shut the listener down, closing
//! every registered connection.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::error::{ProtocolError, Result};
use crate::protocol::registry::ConnectionRegistry;
use crate::transport::tls::TlsServerConfig;

/// Listener lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Not bound; `start` may be called.
    Stopped,
    /// Accept loop running.
    Listening,
    /// Shutdown in progress; registry connections are being closed.
    Stopping,
}

const STATE_STOPPED: u8 = 0;
const STATE_LISTENING: u8 = 1;
const STATE_STOPPING: u8 = 2;

/// Accepts inbound TLS connections and registers them.
pub struct Listener {
    address: String,
    tls: TlsServerConfig,
    registry: Arc<ConnectionRegistry>,
    state: Arc<AtomicU8>,
    shutdown: StdMutex<CancellationToken>,
    local_addr: StdMutex<Option<SocketAddr>>,
    accept_task: StdMutex<Option<JoinHandle<()>>>,
}

impl Listener {
    /// Listener bound later by `start`. `address` is a `host:port` string;
    /// port 0 picks an ephemeral port, readable via `local_addr` once
    /// listening.
    pub fn new(
        address: impl Into<String>,
        tls: TlsServerConfig,
        registry: Arc<ConnectionRegistry>,
    ) -> Self {
        Self {
            address: address.into(),
            tls,
            registry,
            state: Arc::new(AtomicU8::new(STATE_STOPPED)),
            shutdown: StdMutex::new(CancellationToken::new()),
            local_addr: StdMutex::new(None),
            accept_task: StdMutex::new(None),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ListenerState {
        match self.state.load(Ordering::Acquire) {
            STATE_LISTENING => ListenerState::Listening,
            STATE_STOPPING => ListenerState::Stopping,
            _ => ListenerState::Stopped,
        }
    }

    /// The registry this listener feeds.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// The bound address, once listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self
            .local_addr
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind the socket and spawn the accept loop. Fails if TLS material
    /// cannot be loaded, the bind fails, or the listener is already running.
    #[instrument(skip(self), fields(address = %self.address))]
    pub async fn start(&self) -> Result<()> {
        if self
            .state
            .compare_exchange(
                STATE_STOPPED,
                STATE_LISTENING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return Err(ProtocolError::Custom(
                crate::error::constants::ERR_ALREADY_LISTENING.into(),
            ));
        }

        let startup = self.bind_and_spawn().await;
        if startup.is_err() {
            self.state.store(STATE_STOPPED, Ordering::Release);
        }
        startup
    }

    async fn bind_and_spawn(&self) -> Result<()> {
        let tls_config = self.tls.load_server_config()?;
        let acceptor = TlsAcceptor::from(Arc::new(tls_config));

        let listener = TcpListener::bind(&self.address).await?;
        let bound = listener.local_addr()?;
        *self
            .local_addr
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(bound);

        // Fresh token per start so a stopped listener can be started again
        let token = CancellationToken::new();
        *self.shutdown.lock().unwrap_or_else(PoisonError::into_inner) = token.clone();

        info!(address = %bound, "TLS listener started");

        let handle = tokio::spawn(accept_loop(
            listener,
            acceptor,
            token,
            Arc::clone(&self.registry),
            Arc::clone(&self.state),
        ));
        *self
            .accept_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);

        Ok(())
    }

    /// Stop accepting, then close every registered connection. Waits for the
    /// accept loop to finish its shutdown before returning.
    pub async fn stop(&self) {
        if self.state.load(Ordering::Acquire) == STATE_STOPPED {
            return;
        }

        self.shutdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();

        let handle = self
            .accept_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    shutdown: CancellationToken,
    registry: Arc<ConnectionRegistry>,
    state: Arc<AtomicU8>,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => handle_accept(&registry, stream, peer, acceptor.clone()),
                Err(e) => {
                    error!(error = %e, "Accept failed, shutting down listener");
                    break;
                }
            },
        }
    }

    state.store(STATE_STOPPING, Ordering::Release);
    registry.close_all().await;
    state.store(STATE_STOPPED, Ordering::Release);
    info!("Listener stopped");
}

fn handle_accept(
    registry: &Arc<ConnectionRegistry>,
    stream: TcpStream,
    peer: SocketAddr,
    acceptor: TlsAcceptor,
) {
    let identity = peer.ip().to_string();

    if registry.is_blocked(&identity) {
        info!(peer = %identity, "Rejected blacklisted connection");
        drop(stream);
        return;
    }

    let registry = Arc::clone(registry);
    tokio::spawn(async move {
        match acceptor.accept(stream).await {
            Ok(tls_stream) => match registry.register(tls_stream, identity.clone()) {
                Some(conn) => {
                    if let Err(e) = conn.run().await {
                        debug!(peer = %identity, error = %e, "Read loop ended with error");
                    }
                }
                // Dropping the stream inside register closed the socket
                None => info!(peer = %identity, "Registration rejected"),
            },
            Err(e) => error!(peer = %identity, error = %e, "TLS handshake failed"),
        }
    });
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("address", &self.address)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
