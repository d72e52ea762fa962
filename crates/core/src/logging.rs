//! Logging infrastructure for zapi
//!
//! Stdout carries the JSON result of a run, so every log output defaults to
//! stderr. `RUST_LOG` overrides the configured filter.

use crate::error::{Result, ZapiError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, format::FmtSpan, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Global log level
    pub level: LogLevel,
    /// Per-module log levels
    pub module_levels: HashMap<String, LogLevel>,
    /// Log output format
    pub format: LogFormat,
    /// Output destination
    pub output: LogOutput,
    /// Include source location (file:line) in logs
    pub include_location: bool,
    /// Include span enter/exit events
    pub include_spans: bool,
    /// Enable ANSI color codes
    pub enable_colors: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Warn,
            module_levels: HashMap::new(),
            format: LogFormat::Compact,
            output: LogOutput::Stderr,
            include_location: false,
            include_spans: false,
            enable_colors: true,
        }
    }
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ZapiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ZapiError::config(format!("Invalid log level: {}", s))),
        }
    }
}

/// Log output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Compact single-line format
    Compact,
    /// Pretty multi-line format for development
    Pretty,
    /// Full format with all available information
    Full,
    /// JSON format for structured logging
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ZapiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "pretty" => Ok(LogFormat::Pretty),
            "full" => Ok(LogFormat::Full),
            "json" => Ok(LogFormat::Json),
            _ => Err(ZapiError::config(format!("Invalid log format: {}", s))),
        }
    }
}

/// Log output destinations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogOutput {
    /// Standard error
    Stderr,
    /// File output
    File {
        /// Path to the log file
        path: PathBuf,
        /// Whether to append to existing file
        append: bool,
    },
}

impl LogOutput {
    fn make_writer(&self) -> Result<BoxMakeWriter> {
        match self {
            LogOutput::Stderr => Ok(BoxMakeWriter::new(std::io::stderr)),
            LogOutput::File { path, append } => {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .write(true)
                    .append(*append)
                    .truncate(!*append)
                    .open(path)
                    .map_err(|e| {
                        ZapiError::config(format!(
                            "Failed to open log file {}: {}",
                            path.display(),
                            e
                        ))
                    })?;
                Ok(BoxMakeWriter::new(Mutex::new(file)))
            }
        }
    }
}

/// Logger builder for configuring the logging system
pub struct LoggerBuilder {
    config: LoggingConfig,
}

impl LoggerBuilder {
    /// Create a new logger builder with default configuration
    pub fn new() -> Self {
        Self {
            config: LoggingConfig::default(),
        }
    }

    /// Create a logger builder from configuration
    pub fn from_config(config: LoggingConfig) -> Self {
        Self { config }
    }

    /// Set the global log level
    pub fn level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    /// Set log level for a specific module
    pub fn module_level<S: Into<String>>(mut self, module: S, level: LogLevel) -> Self {
        self.config.module_levels.insert(module.into(), level);
        self
    }

    /// Set the log format
    pub fn format(mut self, format: LogFormat) -> Self {
        self.config.format = format;
        self
    }

    /// Set the log output destination
    pub fn output(mut self, output: LogOutput) -> Self {
        self.config.output = output;
        self
    }

    /// Enable or disable source location information
    pub fn location(mut self, enable: bool) -> Self {
        self.config.include_location = enable;
        self
    }

    /// Enable or disable span information
    pub fn spans(mut self, enable: bool) -> Self {
        self.config.include_spans = enable;
        self
    }

    /// Enable or disable colored output
    pub fn colors(mut self, enable: bool) -> Self {
        self.config.enable_colors = enable;
        self
    }

    /// Initialize the global logger
    pub fn init(self) -> Result<()> {
        init_logging(self.config)
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the filter directives for a configuration
fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(env_filter) = std::env::var("RUST_LOG") {
        return Ok(EnvFilter::new(env_filter));
    }

    let mut filter = EnvFilter::new("");
    let mut directives = vec![format!("zapi={}", config.level)];
    for crate_name in ["zapi_core", "zapi_client", "zapi_proxy", "zapi_cli"] {
        directives.push(format!("{}={}", crate_name, config.level));
    }
    for (module, level) in &config.module_levels {
        directives.push(format!("{}={}", module, level));
    }

    for directive in directives {
        let directive = directive
            .parse()
            .map_err(|e| ZapiError::config(format!("Invalid log directive '{}': {}", directive, e)))?;
        filter = filter.add_directive(directive);
    }
    Ok(filter)
}

/// Initialize the logging system with the given configuration
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config)?;
    let writer = config.output.make_writer()?;
    let ansi = config.enable_colors && config.output == LogOutput::Stderr;
    let registry = Registry::default().with(filter);

    let initialized = match config.format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_current_span(config.include_spans)
                .with_span_list(config.include_spans)
                .with_target(true)
                .with_file(config.include_location)
                .with_line_number(config.include_location);
            registry.with(fmt_layer).try_init()
        }
        format => {
            let fmt_layer = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_ansi(ansi)
                .with_span_events(if config.include_spans {
                    FmtSpan::ENTER | FmtSpan::EXIT
                } else {
                    FmtSpan::NONE
                });

            match format {
                LogFormat::Compact => registry.with(fmt_layer.compact()).try_init(),
                LogFormat::Pretty => registry.with(fmt_layer.pretty()).try_init(),
                _ => registry.with(fmt_layer).try_init(),
            }
        }
    };

    initialized.map_err(|e| ZapiError::internal(format!("Failed to install logger: {}", e)))?;

    tracing::debug!("Logging configuration: {:?}", config);
    Ok(())
}

/// Initialize logging with environment-based configuration
pub fn init_from_env() -> Result<()> {
    init_logging(config_from_vars(|key| std::env::var(key).ok())?)
}

/// Build a logging configuration from `ZAPI_LOG_*` variables provided by `lookup`
pub fn config_from_vars<F>(lookup: F) -> Result<LoggingConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut builder = LoggerBuilder::new();

    if let Some(level) = lookup("ZAPI_LOG_LEVEL") {
        builder = builder.level(level.parse()?);
    }

    if let Some(format) = lookup("ZAPI_LOG_FORMAT") {
        builder = builder.format(format.parse()?);
    }

    if let Some(file_path) = lookup("ZAPI_LOG_FILE") {
        builder = builder.output(LogOutput::File {
            path: PathBuf::from(file_path),
            append: true,
        });
    }

    if lookup("NO_COLOR").is_some() {
        builder = builder.colors(false);
    }

    Ok(builder.config)
}
