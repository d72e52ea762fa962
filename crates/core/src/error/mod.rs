//! Unified error handling for zapi
//!
//! Every fallible operation in the workspace returns [`ZapiError`]. The nested
//! enums keep the taxonomy the resolver needs to make its fallback decision:
//! connection-level transport failures, JSON-RPC errors reported by the
//! server, authentication failures, configuration problems and missing
//! capabilities.

use thiserror::Error;

pub mod categories;

pub use categories::{ErrorClass, ErrorClassification};

/// Result type alias for all zapi operations
pub type Result<T> = std::result::Result<T, ZapiError>;

/// Central error type for all zapi operations
#[derive(Error, Debug)]
pub enum ZapiError {
    /// Transport-related errors (socket, HTTP, proxy session)
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// JSON-RPC error returned by the Zabbix server
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Authentication errors
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Missing runtime capabilities
    #[error(transparent)]
    Dependency(#[from] DependencyError),

    /// Connection resolution failures
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Wire protocol errors
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Transport-related errors
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection failed
    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },

    /// Proxy session socket could not be reached
    #[error("Session socket {path} unavailable: {reason}")]
    SocketUnavailable { path: String, reason: String },

    /// HTTP-level failure (non-success status)
    #[error("HTTP error {status} from {url}")]
    Http { status: u16, url: String },

    /// Request timed out
    #[error("Request timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Error reported by the session proxy itself
    #[error("Session proxy error: {message}")]
    Proxy { message: String },
}

/// JSON-RPC error object returned by the Zabbix API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} ({code}): {data}")]
pub struct ApiError {
    pub code: i64,
    pub message: String,
    pub data: String,
}

impl ApiError {
    pub fn new<M: Into<String>, D: Into<String>>(code: i64, message: M, data: D) -> Self {
        Self {
            code,
            message: message.into(),
            data: data.into(),
        }
    }

    /// Whether the server rejected a create because the object already exists
    pub fn is_already_exists(&self) -> bool {
        let needle = "already exist";
        self.data.to_lowercase().contains(needle) || self.message.to_lowercase().contains(needle)
    }
}

/// Authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// Login credentials were not configured
    #[error("Missing login credentials: {field}")]
    MissingCredentials { field: String },

    /// Login call failed
    #[error("Login failed: {source}")]
    LoginFailed {
        #[source]
        source: Box<ZapiError>,
    },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    /// Missing required configuration
    #[error("Missing required configuration: {key}")]
    MissingRequired { key: String },

    /// Configuration file error
    #[error("Configuration file error: {reason}")]
    FileError { reason: String },

    /// Validation failed
    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },
}

/// Capability errors
#[derive(Error, Debug)]
pub enum DependencyError {
    /// A required runtime dependency is not usable in this process
    #[error("Failed to import the required library: {name}. See {url} for more info: {reason}")]
    Unavailable {
        name: String,
        url: String,
        reason: String,
    },
}

/// Connection resolution failures
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Proxied transport selected without a session socket
    #[error("The required settings for httpapi connection are not provided.")]
    MissingSessionPath,

    /// Proxied attempt failed and no direct fallback is allowed
    #[error("Initialization of httpapi failed but zabbix-api fallback disabled: {source}")]
    ProxiedFailed {
        #[source]
        source: Box<ZapiError>,
    },

    /// Direct login failed
    #[error("Failed to connect to Zabbix server: {source}")]
    Login {
        #[source]
        source: Box<ZapiError>,
    },

    /// No attempt produced a client
    #[error("None of the connection type worked. See stdout/stderr for the exact error.")]
    NoTransport,
}

/// Wire protocol errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Deserialization failed
    #[error("Message deserialization failed: {reason}")]
    Deserialization { reason: String },

    /// Response did not match what the request expects
    #[error("Unexpected response: {reason}")]
    UnexpectedResponse { reason: String },
}

// Convenience constructors for common error cases
impl ZapiError {
    pub fn connection<S: Into<String>>(reason: S) -> Self {
        Self::Transport(TransportError::ConnectionFailed {
            reason: reason.into(),
        })
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(ConfigError::ValidationFailed {
            reason: message.into(),
        })
    }

    pub fn missing_config<S: Into<String>>(key: S) -> Self {
        Self::Config(ConfigError::MissingRequired { key: key.into() })
    }

    pub fn protocol<S: Into<String>>(reason: S) -> Self {
        Self::Protocol(ProtocolError::UnexpectedResponse {
            reason: reason.into(),
        })
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The JSON-RPC error behind this error, if any
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            ZapiError::Api(err) => Some(err),
            ZapiError::Auth(AuthError::LoginFailed { source })
            | ZapiError::Resolve(ResolveError::Login { source })
            | ZapiError::Resolve(ResolveError::ProxiedFailed { source }) => source.api_error(),
            _ => None,
        }
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            ZapiError::Transport(_) => "transport",
            ZapiError::Api(_) => "api",
            ZapiError::Auth(_) => "auth",
            ZapiError::Config(_) => "config",
            ZapiError::Dependency(_) => "dependency",
            ZapiError::Resolve(_) => "resolve",
            ZapiError::Protocol(_) => "protocol",
            ZapiError::Io(_) => "io",
            ZapiError::Internal { .. } => "internal",
        }
    }

    /// Render the error and its source chain, one cause per line
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut current = std::error::Error::source(self);
        while let Some(cause) = current {
            out.push_str("\ncaused by: ");
            out.push_str(&cause.to_string());
            current = cause.source();
        }
        out
    }
}

impl From<serde_json::Error> for ZapiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(ProtocolError::Deserialization {
            reason: err.to_string(),
        })
    }
}
