use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use zapi_core::logging::{LogLevel, init_logging};
use zapi_core::ZapiConfig;
use zapi_proxy::{SessionServer, default_socket_path};

/// Session proxy for zapi
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Socket to listen on
    #[arg(short, long)]
    socket: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ZapiConfig::load_from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => ZapiConfig::load_with_fallback(),
    };
    config.merge_with_env()?;

    let mut logging = config.logging.clone();
    if args.verbose {
        logging.level = LogLevel::Debug;
    }
    init_logging(logging)?;

    let socket_path = args
        .socket
        .or(config.connection.socket_path.clone())
        .unwrap_or_else(default_socket_path);

    let server = SessionServer::new(socket_path);
    let listener = server.bind()?;
    info!("Starting zapi session proxy on {}", server.socket_path().display());

    tokio::select! {
        result = server.serve(listener) => {
            if let Err(e) = &result {
                error!("Session proxy failed: {}", e);
            }
            server.shutdown().await?;
            result
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            info!("Shutdown requested");
            server.shutdown().await
        }
    }
}
