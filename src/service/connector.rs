//! # Outbound Connector
//!
//! Client-side single-connection bootstrap: dial TLS, wrap the stream in a
//! [`Connection`], hand it back. No registry, no blacklist, no accept loop.
//! The caller runs the connection's read loop itself.

use std::sync::Arc;

use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{info, instrument};

use crate::config::DEFAULT_READ_BUFFER_SIZE;
use crate::error::{ProtocolError, Result};
use crate::protocol::connection::Connection;
use crate::protocol::permission::Permission;
use crate::transport::tls::TlsClientConfig;
use crate::utils::task_pool::TaskPool;

/// Dials TLS endpoints and yields connections.
pub struct Connector {
    config: TlsClientConfig,
    read_buffer_size: usize,
    tasks: TaskPool,
}

impl Connector {
    pub fn new(config: TlsClientConfig, tasks: TaskPool) -> Self {
        Self {
            config,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            tasks,
        }
    }

    /// Set the initial receive-buffer capacity for dialed connections.
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Dial `host:port` over TLS (1.3 or 1.2) and wrap the stream.
    ///
    /// The returned connection is not driven; the caller spawns or awaits
    /// its `run()`.
    #[instrument(skip(self))]
    pub async fn connect(&self, host: &str, port: u16) -> Result<Arc<Connection>> {
        let tls_config = self
            .config
            .load_client_config()
            .map_err(|e| ProtocolError::Connect(format!("TLS configuration failed: {e}")))?;
        let connector = TlsConnector::from(Arc::new(tls_config));

        let addr = format!("{host}:{port}");
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| ProtocolError::Connect(format!("Dial {addr} failed: {e}")))?;

        let domain = self
            .config
            .server_name()
            .map_err(|e| ProtocolError::Connect(e.to_string()))?;

        let tls_stream = connector
            .connect(domain, stream)
            .await
            .map_err(|e| ProtocolError::Connect(format!("TLS handshake with {addr} failed: {e}")))?;

        info!(address = %addr, "Connected");

        Ok(Connection::new(
            tls_stream,
            host,
            Permission::ReadWrite,
            self.read_buffer_size,
            self.tasks.clone(),
        ))
    }
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("read_buffer_size", &self.read_buffer_size)
            .finish_non_exhaustive()
    }
}
