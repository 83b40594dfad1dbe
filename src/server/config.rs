//! Server configuration.

use crate::connection::ConnectionLimits;
use crate::server::ServerError;
use std::time::Duration;

/// Default bind address
pub const DEFAULT_ADDRESS: &str = "localhost:6379";

/// Default maximum request size (1 MiB)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Settings for [`Server`](crate::server::Server).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind, `host:port`
    pub address: String,
    /// How long a connection may sit idle waiting for a request
    pub read_timeout: Duration,
    /// How long writing one reply may take
    pub write_timeout: Duration,
    /// Size of the per-connection read buffer; a request must fit in it
    pub max_message_size: usize,
    /// How long shutdown waits for open connections to finish
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            read_timeout: Duration::from_secs(30 * 60),
            write_timeout: Duration::from_secs(30),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    /// Checks that no limit is zero.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.address.is_empty() {
            return Err(ServerError::InvalidConfig("address must not be empty"));
        }
        if self.max_message_size == 0 {
            return Err(ServerError::InvalidConfig("max_message_size must be positive"));
        }
        if self.read_timeout.is_zero() {
            return Err(ServerError::InvalidConfig("read_timeout must be positive"));
        }
        if self.write_timeout.is_zero() {
            return Err(ServerError::InvalidConfig("write_timeout must be positive"));
        }
        if self.shutdown_timeout.is_zero() {
            return Err(ServerError::InvalidConfig("shutdown_timeout must be positive"));
        }
        Ok(())
    }

    pub fn connection_limits(&self) -> ConnectionLimits {
        ConnectionLimits {
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
            max_message_size: self.max_message_size,
        }
    }
}
