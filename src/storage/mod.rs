//! Storage Module
//!
//! The in-memory key space: a single lock-guarded map from keys to string or
//! list records, with per-key expiry resolved lazily on access.
//!
//! ## Example
//!
//! ```
//! use lazykv::storage::Store;
//! use bytes::Bytes;
//!
//! let store = Store::new();
//! store.left_push_list(Bytes::from("k"), vec![Bytes::from("a"), Bytes::from("b")]).unwrap();
//! assert_eq!(store.get_list(b"k"), Some(vec![Bytes::from("b"), Bytes::from("a")]));
//! ```

pub mod engine;

pub use engine::{unix_millis, Record, Store, StoreError, Value};
