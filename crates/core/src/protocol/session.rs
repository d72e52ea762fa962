//! Session protocol between the proxied client and `zapi-proxy`
//!
//! One JSON document per line. The client writes a [`SessionRequest`], the
//! proxy answers with exactly one [`SessionResponse`].

use crate::error::{ApiError, ConfigError, ZapiError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Options a session proxy understands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SessionOption {
    Host,
    Port,
    RemoteUser,
    Password,
    BasicAuthUser,
    BasicAuthPassword,
    UseSsl,
    ValidateCerts,
    UrlPath,
    AuthKey,
    Timeout,
}

impl SessionOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionOption::Host => "host",
            SessionOption::Port => "port",
            SessionOption::RemoteUser => "remote_user",
            SessionOption::Password => "password",
            SessionOption::BasicAuthUser => "basic_auth_user",
            SessionOption::BasicAuthPassword => "basic_auth_password",
            SessionOption::UseSsl => "use_ssl",
            SessionOption::ValidateCerts => "validate_certs",
            SessionOption::UrlPath => "url_path",
            SessionOption::AuthKey => "auth_key",
            SessionOption::Timeout => "timeout",
        }
    }

    /// Whether the value must be kept out of logs
    pub fn is_secret(&self) -> bool {
        matches!(
            self,
            SessionOption::Password | SessionOption::BasicAuthPassword | SessionOption::AuthKey
        )
    }
}

impl fmt::Display for SessionOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionOption {
    type Err = ZapiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "host" => Ok(SessionOption::Host),
            "port" => Ok(SessionOption::Port),
            "remote_user" => Ok(SessionOption::RemoteUser),
            "password" => Ok(SessionOption::Password),
            "basic_auth_user" => Ok(SessionOption::BasicAuthUser),
            "basic_auth_password" => Ok(SessionOption::BasicAuthPassword),
            "use_ssl" => Ok(SessionOption::UseSsl),
            "validate_certs" => Ok(SessionOption::ValidateCerts),
            "url_path" => Ok(SessionOption::UrlPath),
            "auth_key" => Ok(SessionOption::AuthKey),
            "timeout" => Ok(SessionOption::Timeout),
            _ => Err(ZapiError::Config(ConfigError::InvalidValue {
                key: "session option".to_string(),
                reason: format!("unknown option: {}", s),
            })),
        }
    }
}

/// Request sent from the proxied client to the proxy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum SessionRequest {
    /// Set a session option
    SetOption { key: SessionOption, value: Value },
    /// Query the Zabbix API version
    ApiVersion,
    /// Relay a JSON-RPC call
    Call { method: String, params: Value },
    /// Log the upstream session out
    Logout,
    /// Get status of the proxy
    Status,
    /// Ping the proxy
    Ping,
}

/// Response from the proxy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum SessionResponse {
    /// Success with optional data
    Success { data: Option<Value> },
    /// Version string reported by the server
    Version { version: String },
    /// JSON-RPC error reported by the server
    RpcError {
        code: i64,
        message: String,
        data: String,
    },
    /// The proxy could not serve the request
    Error { message: String },
    /// Status information
    Status {
        uptime: u64,
        authenticated: bool,
        requests: u64,
    },
    /// Pong response to ping
    Pong,
}

impl From<ApiError> for SessionResponse {
    fn from(err: ApiError) -> Self {
        SessionResponse::RpcError {
            code: err.code,
            message: err.message,
            data: err.data,
        }
    }
}
