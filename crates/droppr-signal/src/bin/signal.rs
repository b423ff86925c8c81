//! droppr Signal Server
//!
//! WebSocket relay that pairs the sender and receiver of a drop.
//!
//! # Usage
//!
//! ```bash
//! # Defaults, or the platform config file if present
//! droppr-signal
//!
//! # Explicit config file with a port override
//! droppr-signal --config /etc/droppr/signal.toml --port 5050
//!
//! # Print a sample config
//! droppr-signal --print-config
//!
//! # Write the default config to the platform config directory
//! droppr-signal --write-config
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use droppr_core::Config;
use droppr_signal::SignalServer;

#[derive(Parser, Debug)]
#[command(name = "droppr-signal")]
#[command(about = "droppr signal channel relay")]
#[command(version)]
struct Args {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, env = "DROPPR_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Bind address
    #[arg(short, long)]
    bind: Option<IpAddr>,

    /// Print a sample configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Write the default configuration to `--config` (or the platform
    /// config path) and exit
    #[arg(long)]
    write_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.print_config {
        print!("{}", Config::sample());
        return Ok(());
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    if args.write_config {
        let config = Config::default();
        match &args.config {
            Some(path) => config.save_to(path)?,
            None => config.save()?,
        }
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    let addr = SocketAddr::new(config.server.bind, config.server.port);

    info!("Starting droppr signal server");
    info!(
        "Signal channels on {} (write timeout {} ms)",
        config.server.path, config.relay.write_timeout_ms
    );

    let server = SignalServer::new(config);

    tokio::select! {
        res = server.serve(addr) => res?,
        _ = tokio::signal::ctrl_c() => {
            info!(
                "Shutting down ({} channels, {} connections)",
                server.channel_count(),
                server.connection_count()
            );
        }
    }

    Ok(())
}
