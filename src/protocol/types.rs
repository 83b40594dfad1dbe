//! RESP Data Types
//!
//! This module defines the values exchanged on the wire and their
//! serialization.
//!
//! ## Protocol Format
//!
//! Each value starts with a type prefix byte:
//! - `+` Simple String
//! - `-` Error
//! - `:` Integer
//! - `$` Bulk String (`$-1` is Null)
//! - `*` Array
//! - `%` Map (serialize-only)
//!
//! All lines are terminated with CRLF (`\r\n`).
//!
//! ## Examples
//!
//! Simple String: `+OK\r\n`
//! Error: `-ERR unknown command: FOO\r\n`
//! Integer: `:1000\r\n`
//! Bulk String: `$5\r\nhello\r\n`
//! Array: `*2\r\n$3\r\nGET\r\n$4\r\nname\r\n`
//! Map: `%1\r\n$6\r\nserver\r\n$5\r\nredis\r\n`
//! Null: `$-1\r\n`

use bytes::Bytes;
use std::fmt;
use thiserror::Error;

/// The CRLF terminator used in RESP protocol
pub const CRLF: &[u8] = b"\r\n";

/// RESP protocol type prefixes
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
    pub const MAP: u8 = b'%';
}

/// Errors raised when a value cannot be written to the wire.
///
/// These indicate a reply that was built incorrectly; the value is never
/// coerced into something that would serialize.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SerializeError {
    /// A simple string or error payload contains CR or LF.
    #[error("{kind} payload contains CR or LF: {payload:?}")]
    LineBreakInSimpleValue { kind: &'static str, payload: String },

    /// The same key appears twice in a map.
    #[error("duplicate map key: {0}")]
    DuplicateMapKey(String),
}

/// A value in the RESP protocol.
///
/// Each variant carries exactly the payload its wire kind needs, so a
/// kind can never be paired with a payload of the wrong shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RespValue {
    /// Null bulk string.
    /// Format: `$-1\r\n`
    Null,

    /// Single-line text without CR or LF.
    /// Format: `+<string>\r\n`
    SimpleString(String),

    /// Length-prefixed, binary-safe string. The length is the byte length.
    /// Format: `$<length>\r\n<data>\r\n`
    BulkString(Bytes),

    /// 64-bit signed integer.
    /// Format: `:<integer>\r\n`
    Integer(i64),

    /// Ordered sequence of values, possibly nested.
    /// Format: `*<count>\r\n<element1><element2>...`
    Array(Vec<RespValue>),

    /// Key/value pairs in insertion order. Only produced as a reply.
    /// Format: `%<pairs>\r\n<key1><value1>...`
    Map(Vec<(RespValue, RespValue)>),

    /// Single-line error message.
    /// Format: `-<error message>\r\n`
    Error(String),
}

impl RespValue {
    /// Creates a new simple string.
    ///
    /// # Example
    /// ```
    /// use lazykv::protocol::types::RespValue;
    /// let ok = RespValue::simple_string("OK");
    /// ```
    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    /// Creates a new error reply.
    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    pub fn integer(n: i64) -> Self {
        RespValue::Integer(n)
    }

    /// Creates a new bulk string.
    ///
    /// # Example
    /// ```
    /// use lazykv::protocol::types::RespValue;
    /// use bytes::Bytes;
    /// let bulk = RespValue::bulk_string(Bytes::from("hello"));
    /// ```
    pub fn bulk_string(data: impl Into<Bytes>) -> Self {
        RespValue::BulkString(data.into())
    }

    pub fn null() -> Self {
        RespValue::Null
    }

    pub fn array(values: Vec<RespValue>) -> Self {
        RespValue::Array(values)
    }

    /// Creates a map from pairs. A repeated key keeps its first position
    /// and takes the last value.
    pub fn map(pairs: impl IntoIterator<Item = (RespValue, RespValue)>) -> Self {
        let mut entries: Vec<(RespValue, RespValue)> = Vec::new();
        for (key, value) in pairs {
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = value,
                None => entries.push((key, value)),
            }
        }
        RespValue::Map(entries)
    }

    /// Reply for a successful write, sent as a bulk string.
    pub fn ok() -> Self {
        RespValue::BulkString(Bytes::from_static(b"OK"))
    }

    pub fn pong() -> Self {
        RespValue::SimpleString("PONG".to_string())
    }

    /// Name of the wire kind, for logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            RespValue::Null => "Null",
            RespValue::SimpleString(_) => "SimpleString",
            RespValue::BulkString(_) => "BulkString",
            RespValue::Integer(_) => "Integer",
            RespValue::Array(_) => "Array",
            RespValue::Map(_) => "Map",
            RespValue::Error(_) => "SimpleError",
        }
    }

    /// Serializes the value to bytes for sending over the wire.
    pub fn serialize(&self) -> Result<Vec<u8>, SerializeError> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf)?;
        Ok(buf)
    }

    /// Serializes the value into an existing buffer.
    ///
    /// On error the buffer may hold a partial encoding and should be
    /// discarded.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) -> Result<(), SerializeError> {
        match self {
            RespValue::Null => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(b"-1");
                buf.extend_from_slice(CRLF);
            }
            RespValue::SimpleString(s) => {
                write_line(buf, prefix::SIMPLE_STRING, "SimpleString", s)?;
            }
            RespValue::Error(s) => {
                write_line(buf, prefix::ERROR, "SimpleError", s)?;
            }
            RespValue::Integer(n) => {
                buf.push(prefix::INTEGER);
                buf.extend_from_slice(n.to_string().as_bytes());
                buf.extend_from_slice(CRLF);
            }
            RespValue::BulkString(data) => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(data.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                buf.extend_from_slice(data);
                buf.extend_from_slice(CRLF);
            }
            RespValue::Array(values) => {
                buf.push(prefix::ARRAY);
                buf.extend_from_slice(values.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                for value in values {
                    value.serialize_into(buf)?;
                }
            }
            RespValue::Map(pairs) => {
                for (i, (key, _)) in pairs.iter().enumerate() {
                    if pairs[..i].iter().any(|(k, _)| k == key) {
                        return Err(SerializeError::DuplicateMapKey(key.to_string()));
                    }
                }
                buf.push(prefix::MAP);
                buf.extend_from_slice(pairs.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                for (key, value) in pairs {
                    key.serialize_into(buf)?;
                    value.serialize_into(buf)?;
                }
            }
        }
        Ok(())
    }

    /// Attempts to extract the inner string from SimpleString or BulkString.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RespValue::SimpleString(s) => Some(s),
            RespValue::BulkString(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Attempts to extract the payload of a SimpleString or BulkString as bytes.
    pub fn as_bytes(&self) -> Option<Bytes> {
        match self {
            RespValue::BulkString(b) => Some(b.clone()),
            RespValue::SimpleString(s) => Some(Bytes::copy_from_slice(s.as_bytes())),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[RespValue]> {
        match self {
            RespValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Consumes self and returns the inner array if this is an Array variant.
    pub fn into_array(self) -> Option<Vec<RespValue>> {
        match self {
            RespValue::Array(arr) => Some(arr),
            _ => None,
        }
    }
}

/// Writes a simple line value, refusing payloads that would break framing.
fn write_line(
    buf: &mut Vec<u8>,
    marker: u8,
    kind: &'static str,
    payload: &str,
) -> Result<(), SerializeError> {
    if payload.contains(['\r', '\n']) {
        return Err(SerializeError::LineBreakInSimpleValue {
            kind,
            payload: payload.to_string(),
        });
    }
    buf.push(marker);
    buf.extend_from_slice(payload.as_bytes());
    buf.extend_from_slice(CRLF);
    Ok(())
}

impl fmt::Display for RespValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespValue::SimpleString(s) => write!(f, "{}", s),
            RespValue::Error(s) => write!(f, "(error) {}", s),
            RespValue::Integer(n) => write!(f, "(integer) {}", n),
            RespValue::BulkString(data) => match std::str::from_utf8(data) {
                Ok(s) => write!(f, "\"{}\"", s),
                Err(_) => write!(f, "(binary data, {} bytes)", data.len()),
            },
            RespValue::Null => write!(f, "(nil)"),
            RespValue::Array(values) => {
                if values.is_empty() {
                    return write!(f, "(empty array)");
                }
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}) {}", i + 1, v)?;
                }
                Ok(())
            }
            RespValue::Map(pairs) => {
                if pairs.is_empty() {
                    return write!(f, "(empty map)");
                }
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}# {} => {}", i + 1, k, v)?;
                }
                Ok(())
            }
        }
    }
}
