//! Dirshare binary
//!
//! Serves a directory over WebSocket and, when a tunnel id is given, exposes
//! it publicly through a tunnel client.
//!
//! # Usage
//!
//! ```bash
//! dirshare -p ./my-project
//! dirshare -p ./my-project --port 9470 --id myproject42
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dirshare::config::{ServerConfig, DEFAULT_HOST, DEFAULT_PORT};
use dirshare::socket_server::{self, OriginPolicy};
use dirshare::tree::{SelectionPolicy, DEFAULT_SELECTED_EXTENSION};
use dirshare::tunnel::{CommandTunnelProvider, Tunnel, TunnelProvider, DEFAULT_TUNNEL_COMMAND};
use dirshare::upload::PresignedUrlSink;

/// Serve a local directory for listing and zip upload
#[derive(Parser, Debug)]
#[command(name = "dirshare")]
#[command(about = "Expose a local directory over WebSocket for listing and zip upload")]
#[command(version)]
struct Args {
    /// Directory to serve (defaults to the current directory)
    #[arg(short = 'p', long = "path", env = "DIRSHARE_PATH")]
    path: Option<PathBuf>,

    /// Port to listen on. Without it, 9462 is tried first, then the next four ports
    #[arg(long, env = "DIRSHARE_PORT")]
    port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "DIRSHARE_HOST", default_value = DEFAULT_HOST)]
    host: String,

    /// Tunnel subdomain; opens a public tunnel when set
    #[arg(long = "id", env = "DIRSHARE_TUNNEL_ID")]
    tunnel_id: Option<String>,

    /// Tunnel client command, called with --port and --subdomain
    #[arg(long, env = "DIRSHARE_TUNNEL_COMMAND", default_value = DEFAULT_TUNNEL_COMMAND)]
    tunnel_command: String,

    /// File extension checked by default in listings
    #[arg(long, env = "DIRSHARE_EXTENSION", default_value = DEFAULT_SELECTED_EXTENSION)]
    extension: String,

    /// Only accept clients from these origins (repeatable, comma separated)
    #[arg(long = "allow-origin", env = "DIRSHARE_ALLOW_ORIGINS", value_delimiter = ',')]
    allow_origins: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr; RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dirshare=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

async fn run(args: Args) -> dirshare::Result<()> {
    let root = match args.path {
        Some(path) => path,
        None => std::env::current_dir()?,
    };

    let config = ServerConfig::new(root)
        .with_host(args.host)
        .with_selection(SelectionPolicy::extension(&args.extension))
        .with_origin_policy(OriginPolicy::allow_list(&args.allow_origins));
    let config = match args.port {
        Some(port) => config.with_port(port),
        None => config.with_preferred_port(DEFAULT_PORT),
    };

    let sink = Arc::new(PresignedUrlSink::new()?);
    let server = socket_server::start(&config, sink).await?;
    tracing::info!(
        "dirshare {} listening on ws://{}",
        env!("CARGO_PKG_VERSION"),
        server.local_addr()
    );

    let mut tunnel: Option<Box<dyn Tunnel>> = None;
    if let Some(id) = args.tunnel_id.as_deref() {
        let provider = CommandTunnelProvider::new(&args.tunnel_command);
        match provider.open(server.port(), Some(id)).await {
            Ok(t) => {
                tracing::info!("Tunnel open at {}", t.public_url());
                tunnel = Some(t);
            }
            // The local server stays up without a tunnel
            Err(e) => tracing::error!("Error during tunnel: {}", e),
        }
    }

    shutdown_signal().await;
    tracing::info!("Shutting down");

    if let Some(mut t) = tunnel {
        if let Err(e) = t.close().await {
            tracing::warn!("{}", e);
        }
    }
    server.close().await;
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
