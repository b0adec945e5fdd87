//! Roomcast server - WebSocket relay for collaborative rooms.

use anyhow::Result;
use clap::Parser;
use roomcast_server::{config, logging, state};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use config::Config;
use logging::{LogConfig, LogFormat};
use state::AppState;

/// Roomcast server - ordered broadcast with history replay per room.
#[derive(Parser, Debug)]
#[command(name = "roomcast-server")]
#[command(about = "WebSocket relay that multiplexes rooms by request path")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override host from config
    #[arg(long)]
    host: Option<String>,

    /// Override port from config
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose logging (INFO level for all relay targets)
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace logging (includes every relayed frame)
    #[arg(long)]
    trace: bool,

    /// Quiet mode (WARN and ERROR only)
    #[arg(short, long)]
    quiet: bool,

    /// Set log level for specific targets (e.g., "room=debug" or "ws::frame=trace").
    /// Can be specified multiple times. Targets are prefixed with "roomcast::" automatically.
    #[arg(long = "log", value_name = "TARGET=LEVEL")]
    log_overrides: Vec<String>,

    /// Log output format
    #[arg(long = "log-format", value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::from_cli(
        cli.verbose,
        cli.debug,
        cli.trace,
        cli.quiet,
        cli.log_overrides,
        cli.log_format,
    );
    logging::init(&log_config);

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    tracing::info!(
        target: "roomcast::startup",
        "Loaded configuration (port: {}, max message: {} bytes, outbound buffer: {})",
        config.port,
        config.max_message_size,
        config.outbound_buffer
    );

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = Arc::new(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(target: "roomcast::startup", "Server running on {}", listener.local_addr()?);

    roomcast_server::serve(listener, state, shutdown_signal()).await?;

    tracing::info!(target: "roomcast::startup", "Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(target: "roomcast::startup", "Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
