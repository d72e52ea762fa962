//! # zapi Core Library
//!
//! Shared building blocks for the zapi workspace: configuration, the error
//! taxonomy used to classify connection failures, logging setup, the wire
//! formats of both transports, and the advisory collector.
//!
//! ## Key Components
//!
//! - **Configuration**: `zapi.toml` loading, environment overrides, validation
//! - **Errors**: [`ZapiError`] and its classification into connection-level,
//!   authentication, conflict and RPC failures
//! - **Protocol**: JSON-RPC envelope and the proxy session protocol
//! - **Logging**: tracing subscriber setup
//! - **Advisories**: non-fatal operator messages

pub mod advisory;
pub mod config;
pub mod error;
pub mod logging;
pub mod protocol;

// Re-export commonly used types
pub use advisory::Advisories;
pub use config::{ConnectionConfig, ConnectionType, SessionSettings, ZapiConfig};
pub use error::{
    ApiError, AuthError, ConfigError, DependencyError, ErrorClass, ErrorClassification,
    ProtocolError, ResolveError, Result, TransportError, ZapiError,
};
pub use logging::{LogFormat, LogLevel, LogOutput, LoggerBuilder, LoggingConfig};
