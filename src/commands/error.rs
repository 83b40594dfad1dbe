//! Dispatcher error types.

use crate::protocol::RespValue;
use crate::storage::StoreError;
use thiserror::Error;

/// A command that could not be carried out.
///
/// These are reported to the client as an error reply; the connection
/// stays open.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    EmptyCommand,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("wrong number of arguments for '{0}' command")]
    WrongArity(&'static str),

    /// An argument that must be a string was some other kind of value.
    /// `position` counts from 1, after the command name.
    #[error("'{command}' argument {position} must be a string, got {kind}")]
    NotAString {
        command: &'static str,
        position: usize,
        kind: &'static str,
    },

    #[error("unexpected option for '{command}': {option}")]
    UnknownOption {
        command: &'static str,
        option: String,
    },

    #[error("syntax error: {0} must be followed by a value")]
    MissingOptionValue(&'static str),

    #[error("invalid expire time for {0}, expected a positive integer")]
    InvalidExpireTime(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CommandError {
    /// Builds the error reply sent to the client.
    ///
    /// Type mismatches carry the `WRONGTYPE` code, everything else `ERR`.
    /// Line breaks from client-supplied names become spaces.
    pub fn to_reply(&self) -> RespValue {
        let code = match self {
            CommandError::Store(StoreError::WrongType) => "WRONGTYPE",
            _ => "ERR",
        };
        let message = self.to_string().replace(['\r', '\n'], " ");
        RespValue::error(format!("{} {}", code, message))
    }
}

/// A request whose shape is not `[command, arg, ...]`.
///
/// Unlike [`CommandError`] this closes the connection after one error reply.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("request must be an array, got {0}")]
    NotAnArray(&'static str),

    #[error("command name must be a string, got {0}")]
    InvalidCommandName(&'static str),

    #[error("command name is not valid UTF-8")]
    NonUtf8CommandName,
}
