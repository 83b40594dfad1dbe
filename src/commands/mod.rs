//! Command Handler Module
//!
//! Receives decoded requests, runs them against the store, and builds the
//! replies.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  RESP Parser    │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Unpack       │
//! │  - Dispatch     │
//! │  - Execute      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │     Store       │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use lazykv::commands::CommandHandler;
//! use lazykv::protocol::RespValue;
//! use lazykv::storage::Store;
//! use std::sync::Arc;
//!
//! let handler = CommandHandler::new(Arc::new(Store::new()));
//! let reply = handler.handle("INCR", &[RespValue::bulk_string("hits")]).unwrap();
//! assert_eq!(reply, RespValue::integer(1));
//! ```

pub mod error;
pub mod handler;

pub use error::{CommandError, RequestError};
pub use handler::CommandHandler;
