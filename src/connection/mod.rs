//! Connection Handler Module
//!
//! Each client connection is handled by its own async task. A connection
//! reads one request per socket read, dispatches it, and writes the reply,
//! with both I/O steps bounded by deadlines.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                    (server module)                          │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ accept()
//!                        ▼
//!           ┌────────────────────────┐
//!           │   For each client...   │
//!           └────────────┬───────────┘
//!                        │
//!                        │ spawn tracked task
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ Read bytes  │───>│ Deserialize │───>│ Execute cmd │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │                                               │             │
//! │                                               ▼             │
//! │                                      ┌─────────────┐        │
//! │                                      │ Send resp   │        │
//! │                                      └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use lazykv::connection::{handle_connection, ConnectionStats};
//! use lazykv::commands::CommandHandler;
//! use lazykv::server::ServerConfig;
//! use lazykv::storage::Store;
//! use std::sync::Arc;
//!
//! let handler = CommandHandler::new(Arc::new(Store::new()));
//! let stats = Arc::new(ConnectionStats::new());
//! let limits = ServerConfig::default().connection_limits();
//!
//! let (stream, addr) = listener.accept().await?;
//! tokio::spawn(handle_connection(stream, addr, handler, stats, limits));
//! ```

pub mod handler;

pub use handler::{
    handle_connection, ConnectionError, ConnectionHandler, ConnectionLimits, ConnectionStats,
    StatsSnapshot,
};
