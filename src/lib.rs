//! # LazyKV - A Small Redis-Compatible Key-Value Server
//!
//! LazyKV speaks the RESP wire protocol and keeps strings and lists in a
//! single in-memory map. Keys may carry a TTL; an expired key is treated as
//! absent the moment it is read, without any background sweeping.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              LazyKV                                     │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │   Server    │───>│ Connection  │───>│  Command    │                  │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │                  │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘                  │
//! │                            │                  │                         │
//! │                            ▼                  ▼                         │
//! │                     ┌─────────────┐    ┌──────────────────────────┐     │
//! │                     │    RESP     │    │          Store           │     │
//! │                     │    Codec    │    │  RwLock<HashMap<..>>     │     │
//! │                     └─────────────┘    └──────────────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use lazykv::server::{Server, ServerConfig};
//! use lazykv::storage::Store;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::default();
//!     let shutdown_timeout = config.shutdown_timeout;
//!
//!     let server = Server::start(config, Arc::new(Store::new())).await?;
//!     tokio::signal::ctrl_c().await?;
//!     server.shutdown(shutdown_timeout).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `PING`, `ECHO [arg ...]`
//! - `COMMAND`, `HELLO` (handshake stubs)
//! - `SET key value [EX seconds | PX milliseconds | EXAT unix-seconds | PXAT unix-milliseconds]`
//! - `GET key`
//! - `EXISTS [key ...]`, `DEL [key ...]`
//! - `INCR key`, `DECR key`
//! - `LPUSH key value [value ...]`
//!
//! ## Module Overview
//!
//! - [`protocol`]: RESP value type, serializer and deserializer
//! - [`storage`]: The lock-guarded key space with lazy expiry
//! - [`commands`]: Command dispatch
//! - [`connection`]: Per-client request loop
//! - [`server`]: Listener, configuration and graceful shutdown

pub mod commands;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{CommandError, CommandHandler};
pub use connection::ConnectionStats;
pub use protocol::{deserialize, ParseError, RespValue};
pub use server::{Server, ServerConfig, ServerError};
pub use storage::{Store, StoreError};

/// Version of LazyKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
