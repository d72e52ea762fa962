use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use zapi_client::{ConnectionHandle, ConnectionResolver, DefaultTransports, ScreenItem};
use zapi_core::logging::{LogLevel, init_logging};
use zapi_core::{Advisories, ConnectionType, ZapiConfig, ZapiError};

mod output;

use output::ModuleOutput;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Connection type: auto, legacy (zabbix-api) or proxied (httpapi)
    #[arg(long)]
    connection_type: Option<ConnectionType>,

    /// Socket of the session proxy
    #[arg(long)]
    socket_path: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the Zabbix API version and the transport in use
    Version,
    /// Call an API method
    Call {
        /// Method name, e.g. host.get
        method: String,

        /// Parameters as JSON
        #[arg(short, long, default_value = "{}")]
        params: String,
    },
    /// Manage screen items
    Screenitem {
        #[command(subcommand)]
        action: ScreenItemAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ScreenItemAction {
    /// Create a screen item
    Create {
        /// Screen item definition as JSON
        #[arg(short, long)]
        data: String,

        /// Succeed without changes when the item already exists
        #[arg(long)]
        ignore_exists: bool,
    },
    /// Delete screen items
    Delete {
        /// Screen item ids
        #[arg(long = "id", num_args = 1..)]
        ids: Option<Vec<String>>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Generate default configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long, default_value = "zapi.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => return report(ModuleOutput::failure(&e)),
    };

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = LogLevel::Debug;
    }
    init_logging(logging)?;

    debug!("Configuration loaded and validated successfully");

    if let Commands::Config { action } = &cli.command {
        return handle_config_command(action, &config);
    }

    let advisories = Advisories::new();
    let output = match run(&cli.command, &config, advisories.clone()).await {
        Ok(output) => output,
        Err(e) => {
            debug!("Command failed ({}): {}", e.category(), e);
            ModuleOutput::failure(&e)
        }
    }
    .with_warnings(advisories.messages());

    report(output)
}

/// Load the configuration file, then apply environment and command line overrides
fn load_config(cli: &Cli) -> zapi_core::Result<ZapiConfig> {
    let mut config = match &cli.config {
        Some(config_path) => ZapiConfig::load_from_file(config_path)?,
        None => ZapiConfig::load_with_fallback(),
    };

    config.merge_with_env()?;
    if let Some(connection_type) = cli.connection_type {
        config.connection.connection_type = connection_type;
    }
    if let Some(socket_path) = &cli.socket_path {
        config.connection.socket_path = Some(socket_path.clone());
    }

    config.validate()?;
    Ok(config)
}

/// Print the result document; a failed result exits with status 1
fn report(output: ModuleOutput) -> Result<()> {
    println!("{}", serde_json::to_string(&output)?);
    if output.failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Resolve a connection, run the command and release the session
async fn run(
    command: &Commands,
    config: &ZapiConfig,
    advisories: Advisories,
) -> zapi_core::Result<ModuleOutput> {
    let handle = ConnectionResolver::new(&config.connection, &DefaultTransports, advisories)
        .resolve(None)
        .await?;
    info!(
        "Connected via {} to Zabbix {}",
        handle.transport_kind(),
        handle.full_api_version()
    );

    let result = execute(command, &handle).await;

    if let Err(e) = handle.close().await {
        warn!("Failed to release session: {}", e);
    }
    result
}

async fn execute(
    command: &Commands,
    handle: &ConnectionHandle,
) -> zapi_core::Result<ModuleOutput> {
    match command {
        Commands::Version => Ok(ModuleOutput::ok(false)
            .with("transport", handle.transport_kind().to_string())
            .with("api_version", handle.full_api_version())
            .with("api_version_prefix", handle.api_version_prefix())),
        Commands::Call { method, params } => {
            let params = parse_json("params", params)?;
            let result = handle.call(method, params).await?;
            Ok(ModuleOutput::ok(false).with("result", result))
        }
        Commands::Screenitem { action } => match action {
            ScreenItemAction::Create {
                data,
                ignore_exists,
            } => {
                let payload = parse_json("data", data)?;
                match ScreenItem::on(handle).create(payload, *ignore_exists).await? {
                    Some(result) => Ok(ModuleOutput::ok(true).with("result", result)),
                    None => Ok(ModuleOutput::ok(false)),
                }
            }
            ScreenItemAction::Delete { ids } => {
                let result = ScreenItem::on(handle).delete(ids.clone()).await?;
                Ok(ModuleOutput::ok(true).with("result", result))
            }
        },
        Commands::Config { .. } => Err(ZapiError::internal(
            "configuration commands do not need a connection",
        )),
    }
}

fn parse_json(key: &str, raw: &str) -> zapi_core::Result<Value> {
    serde_json::from_str(raw).map_err(|e| {
        ZapiError::Config(zapi_core::ConfigError::InvalidValue {
            key: key.to_string(),
            reason: e.to_string(),
        })
    })
}

/// Handle configuration subcommands
fn handle_config_command(action: &ConfigAction, config: &ZapiConfig) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let mut shown = config.clone();
            if shown.connection.login_password.is_some() {
                shown.connection.login_password = Some("********".to_string());
            }
            if shown.connection.http_login_password.is_some() {
                shown.connection.http_login_password = Some("********".to_string());
            }
            if shown.connection.session.auth_key.is_some() {
                shown.connection.session.auth_key = Some("********".to_string());
            }
            println!("{}", toml::to_string_pretty(&shown)?);
        }
        ConfigAction::Init { output } => {
            let default_config = ZapiConfig::default();
            default_config.save_to_file(output)?;
            println!("Default configuration saved to: {}", output.display());
        }
    }
    Ok(())
}
