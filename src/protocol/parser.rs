//! RESP Deserializer
//!
//! Turns one complete request buffer into a [`RespValue`].
//!
//! ## How the Parser Works
//!
//! The parser looks at the leading type marker and recursively consumes
//! exactly the bytes that belong to that value, returning the value together
//! with the number of bytes consumed. Unlike a streaming decoder it never
//! waits for more data: a value cut short by the end of the buffer is an
//! error. Each socket read is expected to carry exactly one request.
//!
//! [`deserialize`] is the public entry point. It is the only place that
//! rejects bytes left over after the top-level value.

use crate::protocol::types::{prefix, RespValue, CRLF};
use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur during RESP parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The input buffer is empty
    #[error("empty input")]
    EmptyInput,

    /// Unknown type prefix byte
    #[error("unknown type prefix: {0:#04x}")]
    UnknownPrefix(u8),

    /// A length prefix or integer payload is not a decimal integer
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Invalid UTF-8 in a line
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// Bulk string length is negative (but not -1 for null)
    #[error("invalid bulk string length: {0}")]
    InvalidBulkLength(i64),

    /// Array length is negative
    #[error("invalid array length: {0}")]
    InvalidArrayLength(i64),

    /// The buffer ends before the value is complete
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Bytes remain after the top-level value
    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),

    /// Framing violation (missing CRLF, stray CR or LF, etc.)
    #[error("malformed frame: {0}")]
    ProtocolError(String),

    /// The declared bulk length exceeds the allowed maximum
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum size for a single bulk string (512 MB, same as Redis)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum array nesting depth (prevent stack overflow)
pub const MAX_NESTING_DEPTH: usize = 32;

/// A recursive-descent RESP parser over a complete buffer.
///
/// # Example
///
/// ```
/// use lazykv::protocol::RespParser;
///
/// let mut parser = RespParser::new();
/// let (value, consumed) = parser.parse(b"+OK\r\n$-1\r\n").unwrap();
/// assert_eq!(value.as_str(), Some("OK"));
/// assert_eq!(consumed, 5);
/// ```
#[derive(Debug, Default)]
pub struct RespParser {
    /// Current nesting depth (for array parsing)
    depth: usize,
}

impl RespParser {
    /// Creates a new parser instance.
    pub fn new() -> Self {
        Self { depth: 0 }
    }

    /// Parses one value from the front of `buf`.
    ///
    /// Returns the value and the number of bytes it occupied. Bytes after
    /// the value are left untouched.
    pub fn parse(&mut self, buf: &[u8]) -> ParseResult<(RespValue, usize)> {
        if buf.is_empty() {
            return Err(ParseError::EmptyInput);
        }
        self.depth = 0;
        self.parse_value(buf)
    }

    fn parse_value(&mut self, buf: &[u8]) -> ParseResult<(RespValue, usize)> {
        let Some(&marker) = buf.first() else {
            return Err(ParseError::UnexpectedEof);
        };

        match marker {
            prefix::SIMPLE_STRING => self.parse_simple_string(buf),
            prefix::ERROR => self.parse_error(buf),
            prefix::INTEGER => self.parse_integer(buf),
            prefix::BULK_STRING => self.parse_bulk_string(buf),
            prefix::ARRAY => self.parse_array(buf),
            other => Err(ParseError::UnknownPrefix(other)),
        }
    }

    /// Parses a simple string: `+<string>\r\n`
    fn parse_simple_string(&mut self, buf: &[u8]) -> ParseResult<(RespValue, usize)> {
        let (line, consumed) = read_line(&buf[1..])?;
        let s = utf8(line)?;
        Ok((RespValue::SimpleString(s.to_string()), 1 + consumed))
    }

    /// Parses an error: `-<error message>\r\n`
    fn parse_error(&mut self, buf: &[u8]) -> ParseResult<(RespValue, usize)> {
        let (line, consumed) = read_line(&buf[1..])?;
        let s = utf8(line)?;
        Ok((RespValue::Error(s.to_string()), 1 + consumed))
    }

    /// Parses an integer: `:<[+|-]digits>\r\n`
    fn parse_integer(&mut self, buf: &[u8]) -> ParseResult<(RespValue, usize)> {
        let (line, consumed) = read_line(&buf[1..])?;
        let n = parse_i64(line)?;
        Ok((RespValue::Integer(n), 1 + consumed))
    }

    /// Parses a bulk string: `$<length>\r\n<data>\r\n`, or Null: `$-1\r\n`
    fn parse_bulk_string(&mut self, buf: &[u8]) -> ParseResult<(RespValue, usize)> {
        let (line, header) = read_line(&buf[1..])?;
        let length = parse_i64(line)?;
        let data_start = 1 + header;

        if length == -1 {
            return Ok((RespValue::Null, data_start));
        }
        if length < 0 {
            return Err(ParseError::InvalidBulkLength(length));
        }

        let length = usize::try_from(length).map_err(|_| ParseError::MessageTooLarge {
            size: usize::MAX,
            max: MAX_BULK_SIZE,
        })?;
        if length > MAX_BULK_SIZE {
            return Err(ParseError::MessageTooLarge {
                size: length,
                max: MAX_BULK_SIZE,
            });
        }

        let data_end = data_start + length;
        let total = data_end + CRLF.len();
        if buf.len() < total {
            return Err(ParseError::UnexpectedEof);
        }
        if &buf[data_end..total] != CRLF {
            return Err(ParseError::ProtocolError(format!(
                "bulk string of length {} not terminated by CRLF",
                length
            )));
        }

        let data = Bytes::copy_from_slice(&buf[data_start..data_end]);
        Ok((RespValue::BulkString(data), total))
    }

    /// Parses an array: `*<count>\r\n<elements...>`
    fn parse_array(&mut self, buf: &[u8]) -> ParseResult<(RespValue, usize)> {
        let (line, header) = read_line(&buf[1..])?;
        let count = parse_i64(line)?;
        if count < 0 {
            return Err(ParseError::InvalidArrayLength(count));
        }
        let count = usize::try_from(count).map_err(|_| ParseError::InvalidArrayLength(count))?;

        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ParseError::ProtocolError(format!(
                "maximum nesting depth exceeded: {}",
                MAX_NESTING_DEPTH
            )));
        }

        // Every element needs at least three bytes, so never reserve more
        // than the buffer could hold.
        let mut elements = Vec::with_capacity(count.min(buf.len() / 3));
        let mut consumed = 1 + header;

        self.depth += 1;
        for _ in 0..count {
            let (value, used) = self.parse_value(&buf[consumed..])?;
            elements.push(value);
            consumed += used;
        }
        self.depth -= 1;

        Ok((RespValue::Array(elements), consumed))
    }
}

/// Reads one CRLF-terminated line.
///
/// Returns the line content (without CRLF) and the number of bytes consumed
/// including the CRLF. The line ends at the first CR, which must be followed
/// by LF; a bare LF inside the line is rejected.
fn read_line(buf: &[u8]) -> ParseResult<(&[u8], usize)> {
    let cr = buf.iter().position(|&b| b == b'\r');
    let scan_end = cr.unwrap_or(buf.len());

    if buf[..scan_end].contains(&b'\n') {
        return Err(ParseError::ProtocolError(
            "line contains a bare LF".to_string(),
        ));
    }

    let Some(pos) = cr else {
        return Err(ParseError::UnexpectedEof);
    };
    match buf.get(pos + 1) {
        None => Err(ParseError::UnexpectedEof),
        Some(b'\n') => Ok((&buf[..pos], pos + 2)),
        Some(_) => Err(ParseError::ProtocolError(
            "line contains a bare CR".to_string(),
        )),
    }
}

fn utf8(line: &[u8]) -> ParseResult<&str> {
    std::str::from_utf8(line).map_err(|e| ParseError::InvalidUtf8(e.to_string()))
}

fn parse_i64(line: &[u8]) -> ParseResult<i64> {
    let s = utf8(line)?;
    s.parse::<i64>()
        .map_err(|_| ParseError::InvalidInteger(s.to_string()))
}

/// Deserializes exactly one value from `buf`.
///
/// Fails if the buffer holds anything beyond that value.
///
/// # Example
///
/// ```
/// use lazykv::protocol::{deserialize, RespValue};
///
/// assert_eq!(deserialize(b"$-1\r\n").unwrap(), RespValue::Null);
/// assert!(deserialize(b"+OK\r\nEXTRA").is_err());
/// ```
pub fn deserialize(buf: &[u8]) -> ParseResult<RespValue> {
    let (value, consumed) = RespParser::new().parse(buf)?;
    if consumed != buf.len() {
        return Err(ParseError::TrailingBytes(buf.len() - consumed));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_null() {
        assert_eq!(deserialize(b"$-1\r\n").unwrap(), RespValue::Null);
    }

    #[test]
    fn test_parse_simple_string() {
        assert_eq!(
            deserialize(b"+OK\r\n").unwrap(),
            RespValue::SimpleString("OK".to_string())
        );
        assert_eq!(
            deserialize(b"+hello world\r\n").unwrap(),
            RespValue::SimpleString("hello world".to_string())
        );
    }

    #[test]
    fn test_parse_error() {
        assert_eq!(
            deserialize(b"-Error message\r\n").unwrap(),
            RespValue::Error("Error message".to_string())
        );
    }

    #[test]
    fn test_parse_integer() {
        assert_eq!(deserialize(b":1000\r\n").unwrap(), RespValue::Integer(1000));
        assert_eq!(deserialize(b":-42\r\n").unwrap(), RespValue::Integer(-42));
        assert_eq!(deserialize(b":+7\r\n").unwrap(), RespValue::Integer(7));
    }

    #[test]
    fn test_parse_invalid_integer() {
        assert!(matches!(
            deserialize(b":not_a_number\r\n"),
            Err(ParseError::InvalidInteger(_))
        ));
        assert!(matches!(
            deserialize(b":12.5\r\n"),
            Err(ParseError::InvalidInteger(_))
        ));
        assert!(matches!(
            deserialize(b":\r\n"),
            Err(ParseError::InvalidInteger(_))
        ));
    }

    #[test]
    fn test_parse_bulk_string() {
        assert_eq!(
            deserialize(b"$5\r\nhello\r\n").unwrap(),
            RespValue::BulkString(Bytes::from("hello"))
        );
    }

    #[test]
    fn test_parse_empty_bulk_string() {
        assert_eq!(
            deserialize(b"$0\r\n\r\n").unwrap(),
            RespValue::BulkString(Bytes::from(""))
        );
    }

    #[test]
    fn test_bulk_string_with_crlf_in_payload() {
        assert_eq!(
            deserialize(b"$4\r\na\r\nb\r\n").unwrap(),
            RespValue::BulkString(Bytes::from("a\r\nb"))
        );
    }

    #[test]
    fn test_binary_safe_bulk_string() {
        assert_eq!(
            deserialize(b"$5\r\nhel\x00o\r\n").unwrap(),
            RespValue::BulkString(Bytes::from(&b"hel\x00o"[..]))
        );
    }

    #[test]
    fn test_bulk_string_missing_terminator() {
        assert!(matches!(
            deserialize(b"$3\r\nhello\r\n"),
            Err(ParseError::ProtocolError(_))
        ));
    }

    #[test]
    fn test_bulk_string_truncated() {
        assert_eq!(deserialize(b"$5\r\nhel"), Err(ParseError::UnexpectedEof));
    }

    #[test]
    fn test_bulk_string_negative_length() {
        assert_eq!(
            deserialize(b"$-2\r\n"),
            Err(ParseError::InvalidBulkLength(-2))
        );
    }

    #[test]
    fn test_bulk_string_bad_length() {
        assert!(matches!(
            deserialize(b"$abc\r\nabc\r\n"),
            Err(ParseError::InvalidInteger(_))
        ));
    }

    #[test]
    fn test_parse_array() {
        let input = b"*2\r\n$4\r\necho\r\n$11\r\nhello world\r\n";
        assert_eq!(
            deserialize(input).unwrap(),
            RespValue::Array(vec![
                RespValue::BulkString(Bytes::from("echo")),
                RespValue::BulkString(Bytes::from("hello world")),
            ])
        );
    }

    #[test]
    fn test_parse_empty_array() {
        assert_eq!(deserialize(b"*0\r\n").unwrap(), RespValue::Array(vec![]));
    }

    #[test]
    fn test_parse_nested_array() {
        let input = b"*2\r\n:1\r\n*2\r\n:2\r\n:3\r\n";
        assert_eq!(
            deserialize(input).unwrap(),
            RespValue::Array(vec![
                RespValue::Integer(1),
                RespValue::Array(vec![RespValue::Integer(2), RespValue::Integer(3)]),
            ])
        );
    }

    #[test]
    fn test_parse_mixed_array() {
        let input = b"*4\r\n+OK\r\n:100\r\n$5\r\nhello\r\n$-1\r\n";
        assert_eq!(
            deserialize(input).unwrap(),
            RespValue::Array(vec![
                RespValue::SimpleString("OK".to_string()),
                RespValue::Integer(100),
                RespValue::BulkString(Bytes::from("hello")),
                RespValue::Null,
            ])
        );
    }

    #[test]
    fn test_array_count_not_satisfied() {
        assert_eq!(
            deserialize(b"*3\r\n$3\r\nGET\r\n$4\r\nname\r\n"),
            Err(ParseError::UnexpectedEof)
        );
    }

    #[test]
    fn test_array_negative_count() {
        assert_eq!(
            deserialize(b"*-1\r\n"),
            Err(ParseError::InvalidArrayLength(-1))
        );
    }

    #[test]
    fn test_huge_array_count_does_not_preallocate() {
        assert_eq!(
            deserialize(b"*9223372036854775807\r\n:1\r\n"),
            Err(ParseError::UnexpectedEof)
        );
    }

    #[test]
    fn test_nesting_limit() {
        let mut input = Vec::new();
        for _ in 0..=MAX_NESTING_DEPTH {
            input.extend_from_slice(b"*1\r\n");
        }
        input.extend_from_slice(b":1\r\n");
        assert!(matches!(
            deserialize(&input),
            Err(ParseError::ProtocolError(_))
        ));
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        assert_eq!(
            deserialize(b"+OK\r\nEXTRA"),
            Err(ParseError::TrailingBytes(5))
        );
    }

    #[test]
    fn test_parser_reports_consumed_bytes() {
        let mut parser = RespParser::new();
        let (value, consumed) = parser.parse(b"*1\r\n$4\r\nPING\r\n+next\r\n").unwrap();
        assert_eq!(
            value,
            RespValue::Array(vec![RespValue::BulkString(Bytes::from("PING"))])
        );
        assert_eq!(consumed, 14);
    }

    #[test]
    fn test_unknown_prefix() {
        assert_eq!(
            deserialize(b"@invalid\r\n"),
            Err(ParseError::UnknownPrefix(b'@'))
        );
        // Maps are only ever written, never read
        assert_eq!(
            deserialize(b"%0\r\n"),
            Err(ParseError::UnknownPrefix(b'%'))
        );
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(deserialize(b""), Err(ParseError::EmptyInput));
    }

    #[test]
    fn test_missing_crlf() {
        assert_eq!(deserialize(b"+OK"), Err(ParseError::UnexpectedEof));
        assert_eq!(deserialize(b"+OK\r"), Err(ParseError::UnexpectedEof));
    }

    #[test]
    fn test_bare_line_breaks_in_simple_values() {
        assert!(matches!(
            deserialize(b"+hello\rworld\r\n"),
            Err(ParseError::ProtocolError(_))
        ));
        assert!(matches!(
            deserialize(b"+hello\nworld\r\n"),
            Err(ParseError::ProtocolError(_))
        ));
        assert!(matches!(
            deserialize(b"-oops\n"),
            Err(ParseError::ProtocolError(_))
        ));
    }

    #[test]
    fn test_roundtrip() {
        let values = vec![
            RespValue::Null,
            RespValue::simple_string("OK"),
            RespValue::simple_string(""),
            RespValue::bulk_string(Bytes::from("multi\r\nline")),
            RespValue::bulk_string(Bytes::new()),
            RespValue::integer(i64::MIN),
            RespValue::integer(i64::MAX),
            RespValue::error("ERR unknown command: FOO"),
            RespValue::array(vec![]),
            RespValue::array(vec![
                RespValue::bulk_string(Bytes::from("SET")),
                RespValue::array(vec![RespValue::Null, RespValue::integer(0)]),
                RespValue::error("nested"),
            ]),
        ];

        for original in values {
            let serialized = original.serialize().unwrap();
            assert_eq!(deserialize(&serialized).unwrap(), original);
        }
    }
}
