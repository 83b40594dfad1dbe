//! RESP Protocol Implementation
//!
//! The wire codec: a closed [`RespValue`] enum, its serializer, and a
//! whole-buffer deserializer.
//!
//! ## Modules
//!
//! - `types`: Defines the `RespValue` enum and serialization
//! - `parser`: Recursive parser for incoming requests
//!
//! ## Example
//!
//! ```
//! use lazykv::protocol::{deserialize, RespValue};
//! use bytes::Bytes;
//!
//! let request = deserialize(b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n").unwrap();
//! assert_eq!(request.as_array().map(|a| a.len()), Some(2));
//!
//! let response = RespValue::bulk_string(Bytes::from("Ariz"));
//! assert_eq!(response.serialize().unwrap(), b"$4\r\nAriz\r\n");
//! ```

pub mod parser;
pub mod types;

pub use parser::{deserialize, ParseError, ParseResult, RespParser};
pub use types::{RespValue, SerializeError};
