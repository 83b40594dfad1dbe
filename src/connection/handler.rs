//! Connection Handler Module
//!
//! Each client gets its own handler task that runs in a loop, reading one
//! request per socket read and sending one reply.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Read (read deadline)    │ │──── EOF ────────────┐
//!    │  └───────────┬─────────────┘ │                     │
//!    │              ▼               │                     │
//!    │  ┌─────────────────────────┐ │                     │
//!    │  │ Deserialize request     │ │──── error reply ────┤
//!    │  └───────────┬─────────────┘ │                     │
//!    │              ▼               │                     │
//!    │  ┌─────────────────────────┐ │                     │
//!    │  │ Dispatch                │ │                     │
//!    │  └───────────┬─────────────┘ │                     │
//!    │              ▼               │                     │
//!    │  ┌─────────────────────────┐ │                     │
//!    │  │ Write (write deadline)  │ │──── failure ────────┤
//!    │  └───────────┬─────────────┘ │                     │
//!    │              ▼               │                     │
//!    │         [Loop back]          │                     │
//!    └──────────────────────────────┘                     │
//!                                                         ▼
//! 4. Handler task ends  <───────────────────────────── Closed
//! ```
//!
//! ## Buffer Management
//!
//! The read buffer is allocated once at `max_message_size` bytes. A request
//! must arrive whole in a single read; the bytes of one read are decoded as
//! exactly one value.

use crate::commands::{CommandHandler, RequestError};
use crate::protocol::{deserialize, ParseError, RespValue, SerializeError};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::time::timeout;
use tracing::{debug, info, info_span, trace, warn, Instrument};

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

/// A point-in-time copy of [`ConnectionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub connections_accepted: u64,
    pub active_connections: u64,
    pub commands_processed: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            commands_processed: self.commands_processed.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
        }
    }
}

/// Per-connection I/O bounds, taken from the server configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionLimits {
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub max_message_size: usize,
}

/// Handles a single client connection.
///
/// Generic over the stream so it can run on a `TcpStream` or on a scripted
/// mock in tests.
pub struct ConnectionHandler<S> {
    /// The client stream, buffered for writes
    stream: BufWriter<S>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Fixed-size buffer for one request
    buffer: BytesMut,

    /// The command handler (shared across connections)
    command_handler: CommandHandler,

    limits: ConnectionLimits,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new connection handler and counts the connection as open.
    pub fn new(
        stream: S,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
        limits: ConnectionLimits,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::zeroed(limits.max_message_size),
            command_handler,
            limits,
            stats,
        }
    }

    /// Runs the connection until the client disconnects or an error closes it.
    ///
    /// `Ok(())` means the client closed its end. Every error has already
    /// been answered with an error reply where one could still be written.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!("Client disconnected"),
            Err(ConnectionError::Io(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!("Connection reset by client")
            }
            Err(e) => warn!(error = %e, "Connection closed on error"),
        }

        self.stats.connection_closed();
        result
    }

    /// The read-dispatch-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            let n = self.read_request().await?;
            if n == 0 {
                return Ok(());
            }

            let request = match deserialize(&self.buffer[..n]) {
                Ok(request) => request,
                Err(e) => {
                    self.send_error(&format!("ERR protocol error: {}", e)).await?;
                    return Err(e.into());
                }
            };

            let response = match self.command_handler.execute(request) {
                Ok(response) => response,
                Err(e) => {
                    self.send_error(&format!("ERR {}", e)).await?;
                    return Err(e.into());
                }
            };
            self.stats.command_processed();

            let bytes = match response.serialize() {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.send_error("ERR internal server error").await?;
                    return Err(e.into());
                }
            };

            self.write_reply(&bytes).await?;
        }
    }

    /// Reads one request into the buffer. Returns 0 on EOF.
    async fn read_request(&mut self) -> Result<usize, ConnectionError> {
        let read = self.stream.get_mut().read(&mut self.buffer[..]);
        let n = match timeout(self.limits.read_timeout, read).await {
            Ok(result) => result?,
            Err(_) => return Err(ConnectionError::ReadTimeout(self.limits.read_timeout)),
        };

        if n > 0 {
            self.stats.bytes_read(n);
            trace!(bytes = n, "Read request");
        }
        Ok(n)
    }

    /// Sends a SimpleError reply. Line breaks in `message` become spaces.
    async fn send_error(&mut self, message: &str) -> Result<(), ConnectionError> {
        let message = message.replace(['\r', '\n'], " ");
        let bytes = RespValue::error(message).serialize()?;
        self.write_reply(&bytes).await
    }

    async fn write_reply(&mut self, bytes: &[u8]) -> Result<(), ConnectionError> {
        let stream = &mut self.stream;
        let write = async move {
            stream.write_all(bytes).await?;
            stream.flush().await
        };

        match timeout(self.limits.write_timeout, write).await {
            Ok(result) => result?,
            Err(_) => return Err(ConnectionError::WriteTimeout(self.limits.write_timeout)),
        }

        self.stats.bytes_written(bytes.len());
        trace!(bytes = bytes.len(), "Sent response");
        Ok(())
    }
}

/// Errors that close a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("read timed out after {0:?}")]
    ReadTimeout(Duration),

    #[error("write timed out after {0:?}")]
    WriteTimeout(Duration),

    /// The request bytes were not a single RESP value
    #[error("protocol error: {0}")]
    Protocol(#[from] ParseError),

    /// The request decoded but was not an array of strings
    #[error("malformed request: {0}")]
    Request(#[from] RequestError),

    #[error("failed to serialize reply: {0}")]
    Serialize(#[from] SerializeError),
}

/// Handles a client connection inside a `connection` span.
///
/// This is a convenience function that creates a ConnectionHandler
/// and runs it to completion. Errors are logged by the handler.
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
    limits: ConnectionLimits,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let span = info_span!("connection", client = %addr);
    let handler = ConnectionHandler::new(stream, addr, command_handler, stats, limits);
    let _ = handler.run().instrument(span).await;
}
