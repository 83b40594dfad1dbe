//! Server Module
//!
//! Owns the listener and the lifecycle of every connection task.
//!
//! ## Lifecycle
//!
//! ```text
//! Server::start ──> bind ──> spawn accept loop
//!                                 │
//!                                 │ accept()
//!                                 ▼
//!                     tracker.spawn(handle_connection)
//!
//! Server::shutdown ──> cancel accept loop (listener dropped)
//!                  ──> wait for tracked tasks, bounded by a timeout
//! ```
//!
//! Shutdown never aborts a connection task. If the timeout passes first the
//! tasks keep running and `shutdown` can be called again to keep waiting.

pub mod config;

pub use config::ServerConfig;

use crate::commands::CommandHandler;
use crate::connection::{handle_connection, ConnectionLimits, ConnectionStats};
use crate::storage::Store;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

/// Errors from starting or stopping the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Connections were still open when the shutdown timeout passed
    #[error("shutdown timed out after {timeout:?} with {active} connection(s) still open")]
    ShutdownTimeout { timeout: Duration, active: u64 },
}

/// A running server.
#[derive(Debug)]
pub struct Server {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    tracker: TaskTracker,
    stats: Arc<ConnectionStats>,
}

impl Server {
    /// Binds `config.address` and starts accepting connections.
    pub async fn start(config: ServerConfig, store: Arc<Store>) -> Result<Self, ServerError> {
        config.validate()?;

        let bind_error = |source| ServerError::Bind {
            address: config.address.clone(),
            source,
        };
        let listener = TcpListener::bind(&config.address).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();
        let stats = Arc::new(ConnectionStats::new());

        tracker.spawn(accept_loop(
            listener,
            CommandHandler::new(store),
            Arc::clone(&stats),
            config.connection_limits(),
            cancel.clone(),
            tracker.clone(),
        ));

        info!(address = %local_addr, "Listening");

        Ok(Self {
            local_addr,
            cancel,
            tracker,
            stats,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> &Arc<ConnectionStats> {
        &self.stats
    }

    /// Stops accepting and waits up to `timeout` for open connections to end.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), ServerError> {
        info!("Shutting down, no longer accepting connections");
        self.cancel.cancel();
        self.tracker.close();

        if tokio::time::timeout(timeout, self.tracker.wait()).await.is_err() {
            let active = self.stats.snapshot().active_connections;
            error!(active, ?timeout, "Shutdown timed out waiting for connections");
            return Err(ServerError::ShutdownTimeout { timeout, active });
        }

        let stats = self.stats.snapshot();
        info!(
            connections = stats.connections_accepted,
            commands = stats.commands_processed,
            bytes_read = stats.bytes_read,
            bytes_written = stats.bytes_written,
            "Server shutdown complete"
        );
        Ok(())
    }
}

/// Accepts connections until `cancel` fires. The listener is dropped on return.
async fn accept_loop(
    listener: TcpListener,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
    limits: ConnectionLimits,
    cancel: CancellationToken,
    tracker: TaskTracker,
) {
    loop {
        tokio::select! {
            result = listener.accept() => match result {
                Ok((stream, addr)) => {
                    tracker.spawn(handle_connection(
                        stream,
                        addr,
                        command_handler.clone(),
                        Arc::clone(&stats),
                        limits,
                    ));
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            },
            _ = cancel.cancelled() => break,
        }
    }
}
