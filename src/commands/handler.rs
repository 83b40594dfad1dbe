//! Command Handler
//!
//! Maps a command name and its arguments to a store operation and a reply.
//!
//! ## Supported Commands
//!
//! - `PING` - Test connection
//! - `ECHO [arg ...]` - Reply with the arguments as an array
//! - `COMMAND [...]` - Handshake stub, replies `CONNECTED`
//! - `HELLO [...]` - Handshake stub, replies `["server", "redis"]`
//! - `SET key value [EX seconds | PX milliseconds | EXAT unix-seconds | PXAT unix-milliseconds]`
//! - `GET key` - Get a string, or a list as an array
//! - `EXISTS [key ...]` - Count live keys
//! - `DEL [key ...]` - Delete keys
//! - `INCR key` / `DECR key` - Adjust an integer by one
//! - `LPUSH key value [value ...]` - Push values to the head of a list
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │  execute()  │───>│  handle()   │───>│   cmd_*()   │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │                                               │             │
//! │                                               ▼             │
//! │                                             Store           │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::commands::error::{CommandError, RequestError};
use crate::protocol::RespValue;
use crate::storage::{unix_millis, Store, Value};
use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::debug;

/// Dispatches commands against a shared [`Store`].
///
/// Cloning is cheap; every connection gets its own clone.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    store: Arc<Store>,
}

/// When a SET should expire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expiry {
    After(Duration),
    At(SystemTime),
}

/// TTL options given to SET. Several may be present at once; see
/// [`SetOptions::expiry`] for which one wins.
#[derive(Debug, Default)]
struct SetOptions {
    /// EX, in seconds
    ex: Option<u64>,
    /// PX, in milliseconds
    px: Option<u64>,
    /// EXAT, converted to Unix milliseconds
    exat: Option<i64>,
    /// PXAT, in Unix milliseconds
    pxat: Option<i64>,
}

impl SetOptions {
    /// Priority is EX > PX > EXAT > PXAT.
    fn expiry(&self) -> Option<Expiry> {
        if let Some(secs) = self.ex {
            Some(Expiry::After(Duration::from_secs(secs)))
        } else if let Some(ms) = self.px {
            Some(Expiry::After(Duration::from_millis(ms)))
        } else if let Some(ms) = self.exat {
            Some(Expiry::At(unix_millis(ms)))
        } else {
            self.pxat.map(|ms| Expiry::At(unix_millis(ms)))
        }
    }
}

impl CommandHandler {
    /// Creates a new command handler with the given store.
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    #[cfg(test)]
    fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Executes a whole request and returns the reply.
    ///
    /// The request must be an array whose first element names the command.
    /// Command failures come back as `Ok` error replies; only a request of
    /// the wrong shape is an `Err`.
    pub fn execute(&self, request: RespValue) -> Result<RespValue, RequestError> {
        let kind = request.kind();
        let args = request
            .into_array()
            .ok_or(RequestError::NotAnArray(kind))?;

        let Some((name, args)) = args.split_first() else {
            return Ok(CommandError::EmptyCommand.to_reply());
        };

        let name = match name {
            RespValue::BulkString(b) => {
                std::str::from_utf8(b).map_err(|_| RequestError::NonUtf8CommandName)?
            }
            RespValue::SimpleString(s) => s.as_str(),
            other => return Err(RequestError::InvalidCommandName(other.kind())),
        };

        match self.handle(name, args) {
            Ok(reply) => Ok(reply),
            Err(e) => {
                debug!(command = %name, error = %e, "Command failed");
                Ok(e.to_reply())
            }
        }
    }

    /// Runs one command. The name is matched case-insensitively.
    pub fn handle(&self, command: &str, args: &[RespValue]) -> Result<RespValue, CommandError> {
        match command.to_ascii_uppercase().as_str() {
            "PING" => self.cmd_ping(args),
            "ECHO" => Ok(RespValue::array(args.to_vec())),
            "COMMAND" => Ok(RespValue::simple_string("CONNECTED")),
            "HELLO" => Ok(RespValue::array(vec![
                RespValue::bulk_string(Bytes::from_static(b"server")),
                RespValue::bulk_string(Bytes::from_static(b"redis")),
            ])),
            "SET" => self.cmd_set(args),
            "GET" => self.cmd_get(args),
            "EXISTS" => self.cmd_exists(args),
            "DEL" => self.cmd_del(args),
            "INCR" => self.cmd_incr(args),
            "DECR" => self.cmd_decr(args),
            "LPUSH" => self.cmd_lpush(args),
            other => Err(CommandError::UnknownCommand(other.to_string())),
        }
    }

    // ========================================================================
    // Helper functions
    // ========================================================================

    /// Extracts the string argument at `index` (0-based, after the command name).
    fn string_arg(
        command: &'static str,
        args: &[RespValue],
        index: usize,
    ) -> Result<Bytes, CommandError> {
        let arg = args.get(index).ok_or(CommandError::WrongArity(command))?;
        arg.as_bytes().ok_or(CommandError::NotAString {
            command,
            position: index + 1,
            kind: arg.kind(),
        })
    }

    /// Reads the value following a SET option as a positive integer.
    fn expire_arg(args: &[RespValue], index: usize, option: &'static str) -> Result<i64, CommandError> {
        let arg = args
            .get(index)
            .ok_or(CommandError::MissingOptionValue(option))?;
        arg.as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .filter(|n| *n > 0)
            .ok_or(CommandError::InvalidExpireTime(option))
    }

    fn parse_set_options(args: &[RespValue]) -> Result<SetOptions, CommandError> {
        let mut options = SetOptions::default();

        let mut i = 0;
        while i < args.len() {
            let option = args[i].as_str().ok_or(CommandError::NotAString {
                command: "SET",
                position: i + 3,
                kind: args[i].kind(),
            })?;

            match option.to_ascii_uppercase().as_str() {
                "EX" => {
                    i += 1;
                    options.ex = Some(Self::expire_arg(args, i, "EX")?.unsigned_abs());
                }
                "PX" => {
                    i += 1;
                    options.px = Some(Self::expire_arg(args, i, "PX")?.unsigned_abs());
                }
                "EXAT" => {
                    i += 1;
                    let secs = Self::expire_arg(args, i, "EXAT")?;
                    let ms = secs
                        .checked_mul(1000)
                        .ok_or(CommandError::InvalidExpireTime("EXAT"))?;
                    options.exat = Some(ms);
                }
                "PXAT" => {
                    i += 1;
                    options.pxat = Some(Self::expire_arg(args, i, "PXAT")?);
                }
                _ => {
                    return Err(CommandError::UnknownOption {
                        command: "SET",
                        option: option.to_string(),
                    })
                }
            }
            i += 1;
        }

        Ok(options)
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// PING
    fn cmd_ping(&self, args: &[RespValue]) -> Result<RespValue, CommandError> {
        if !args.is_empty() {
            return Err(CommandError::WrongArity("PING"));
        }
        Ok(RespValue::pong())
    }

    /// SET key value [EX seconds | PX milliseconds | EXAT unix-seconds | PXAT unix-milliseconds]
    fn cmd_set(&self, args: &[RespValue]) -> Result<RespValue, CommandError> {
        if args.len() < 2 {
            return Err(CommandError::WrongArity("SET"));
        }

        let key = Self::string_arg("SET", args, 0)?;
        let value = Self::string_arg("SET", args, 1)?;
        let options = Self::parse_set_options(&args[2..])?;

        match options.expiry() {
            Some(Expiry::After(ttl)) => self.store.set_with_expire(key, value, ttl),
            Some(Expiry::At(at)) => self.store.set_with_expire_at(key, value, at),
            None => self.store.set(key, value),
        }

        Ok(RespValue::ok())
    }

    /// GET key
    fn cmd_get(&self, args: &[RespValue]) -> Result<RespValue, CommandError> {
        if args.len() != 1 {
            return Err(CommandError::WrongArity("GET"));
        }

        let key = Self::string_arg("GET", args, 0)?;

        Ok(match self.store.lookup(&key) {
            Some(Value::String(value)) => RespValue::bulk_string(value),
            Some(Value::List(list)) => {
                RespValue::array(list.into_iter().map(RespValue::bulk_string).collect())
            }
            None => RespValue::null(),
        })
    }

    /// EXISTS [key ...]
    fn cmd_exists(&self, args: &[RespValue]) -> Result<RespValue, CommandError> {
        let mut count = 0;
        for i in 0..args.len() {
            let key = Self::string_arg("EXISTS", args, i)?;
            if self.store.exists(&key) {
                count += 1;
            }
        }
        Ok(RespValue::integer(count))
    }

    /// DEL [key ...]
    fn cmd_del(&self, args: &[RespValue]) -> Result<RespValue, CommandError> {
        // Validate every key before deleting any
        let keys = (0..args.len())
            .map(|i| Self::string_arg("DEL", args, i))
            .collect::<Result<Vec<_>, _>>()?;

        let deleted = keys.iter().filter(|key| self.store.del(key)).count();
        Ok(RespValue::integer(deleted as i64))
    }

    /// INCR key
    fn cmd_incr(&self, args: &[RespValue]) -> Result<RespValue, CommandError> {
        if args.len() != 1 {
            return Err(CommandError::WrongArity("INCR"));
        }
        let key = Self::string_arg("INCR", args, 0)?;
        Ok(RespValue::integer(self.store.incr(&key)?))
    }

    /// DECR key
    fn cmd_decr(&self, args: &[RespValue]) -> Result<RespValue, CommandError> {
        if args.len() != 1 {
            return Err(CommandError::WrongArity("DECR"));
        }
        let key = Self::string_arg("DECR", args, 0)?;
        Ok(RespValue::integer(self.store.decr(&key)?))
    }

    /// LPUSH key value [value ...]
    fn cmd_lpush(&self, args: &[RespValue]) -> Result<RespValue, CommandError> {
        if args.len() < 2 {
            return Err(CommandError::WrongArity("LPUSH"));
        }

        let key = Self::string_arg("LPUSH", args, 0)?;
        let elements = (1..args.len())
            .map(|i| Self::string_arg("LPUSH", args, i))
            .collect::<Result<Vec<_>, _>>()?;

        let len = self.store.left_push_list(key, elements)?;
        Ok(RespValue::integer(len as i64))
    }
}
