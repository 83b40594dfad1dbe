//! LazyKV server binary.
//!
//! Parses flags, installs logging, runs the server until Ctrl+C and then
//! drains open connections.

use anyhow::Context;
use clap::Parser;
use lazykv::server::{Server, ServerConfig};
use lazykv::storage::Store;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};

/// A small Redis-compatible key-value server
#[derive(Debug, Parser)]
#[command(name = "lazykv", version = lazykv::VERSION)]
struct Cli {
    /// Address to listen on
    #[arg(short, long, default_value = lazykv::server::config::DEFAULT_ADDRESS)]
    bind: String,

    /// Seconds a connection may stay idle before it is closed
    #[arg(long, default_value_t = 30 * 60)]
    read_timeout_secs: u64,

    /// Seconds allowed for writing one reply
    #[arg(long, default_value_t = 30)]
    write_timeout_secs: u64,

    /// Largest request accepted, in bytes
    #[arg(long, default_value_t = lazykv::server::config::DEFAULT_MAX_MESSAGE_SIZE)]
    max_message_size: usize,

    /// Seconds to wait for open connections on shutdown
    #[arg(long, default_value_t = 30)]
    shutdown_timeout_secs: u64,
}

impl From<Cli> for ServerConfig {
    fn from(cli: Cli) -> Self {
        Self {
            address: cli.bind,
            read_timeout: Duration::from_secs(cli.read_timeout_secs),
            write_timeout: Duration::from_secs(cli.write_timeout_secs),
            max_message_size: cli.max_message_size,
            shutdown_timeout: Duration::from_secs(cli.shutdown_timeout_secs),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from(Cli::parse());

    // Set up logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!(version = lazykv::VERSION, "Starting LazyKV");

    let shutdown_timeout = config.shutdown_timeout;
    let store = Arc::new(Store::new());
    let server = Server::start(config, store)
        .await
        .context("failed to start server")?;

    signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("Shutdown signal received, stopping server...");

    if let Err(e) = server.shutdown(shutdown_timeout).await {
        error!(error = %e, "Graceful shutdown failed");
        return Err(e.into());
    }

    Ok(())
}
