//! Configuration management for zapi

use crate::error::{ConfigError, Result, ZapiError};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Main configuration structure for zapi
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ZapiConfig {
    /// Zabbix connection settings
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which transport the resolver should use
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    /// Pick the transport automatically (currently the direct client)
    #[default]
    Auto,
    /// Direct HTTP client
    #[serde(alias = "zabbix-api")]
    Legacy,
    /// Session relayed through the local proxy process
    #[serde(alias = "httpapi")]
    Proxied,
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionType::Auto => write!(f, "auto"),
            ConnectionType::Legacy => write!(f, "legacy"),
            ConnectionType::Proxied => write!(f, "proxied"),
        }
    }
}

impl std::str::FromStr for ConnectionType {
    type Err = ZapiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ConnectionType::Auto),
            "legacy" | "zabbix-api" => Ok(ConnectionType::Legacy),
            "proxied" | "httpapi" => Ok(ConnectionType::Proxied),
            _ => Err(ZapiError::Config(ConfigError::InvalidValue {
                key: "connection_type".to_string(),
                reason: format!("unknown connection type: {}", s),
            })),
        }
    }
}

/// Connection settings consumed by the resolver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Transport selection
    #[serde(default)]
    pub connection_type: ConnectionType,
    /// URL of the Zabbix frontend, e.g. `https://zabbix.example.com/zabbix`
    pub server_url: Option<String>,
    /// Zabbix host (legacy option, used when `server_url` carries none)
    pub host: Option<String>,
    /// Zabbix port (legacy option, used when `server_url` carries none)
    pub port: Option<u16>,
    /// Zabbix user
    pub login_user: Option<String>,
    /// Zabbix password
    pub login_password: Option<String>,
    /// HTTP basic auth user
    pub http_login_user: Option<String>,
    /// HTTP basic auth password
    pub http_login_password: Option<String>,
    /// Verify TLS certificates of the direct client
    #[serde(default = "default_validate_certs")]
    pub validate_certs: bool,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Socket of the session proxy; required for the proxied transport
    pub socket_path: Option<PathBuf>,
    /// Let a proxied connection failure fall back to the direct client
    #[serde(default)]
    pub fallback_to_direct: bool,
    /// Options forwarded to the session proxy
    #[serde(default)]
    pub session: SessionSettings,
}

/// Settings for the proxied session, sent to the proxy as session options
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct SessionSettings {
    /// Talk HTTPS to the Zabbix frontend
    pub use_ssl: Option<bool>,
    /// Verify TLS certificates upstream
    pub validate_certs: Option<bool>,
    /// Frontend path below the host, e.g. `zabbix`
    pub url_path: Option<String>,
    /// API token used instead of user/password
    pub auth_key: Option<String>,
    /// Upstream request timeout in seconds
    pub timeout: Option<u64>,
}

/// Names of the options that predate the proxied transport
pub const LEGACY_OPTIONS: [&str; 7] = [
    "server_url",
    "host",
    "port",
    "login_user",
    "login_password",
    "http_login_user",
    "http_login_password",
];

// Default value functions
fn default_validate_certs() -> bool {
    true
}
fn default_timeout() -> u64 {
    10
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connection_type: ConnectionType::default(),
            server_url: None,
            host: None,
            port: None,
            login_user: None,
            login_password: None,
            http_login_user: None,
            http_login_password: None,
            validate_certs: default_validate_certs(),
            timeout: default_timeout(),
            socket_path: None,
            fallback_to_direct: false,
            session: SessionSettings::default(),
        }
    }
}

impl ConnectionConfig {
    /// Legacy options that are set, in declaration order
    pub fn legacy_params(&self) -> Vec<&'static str> {
        let present = [
            self.server_url.is_some(),
            self.host.is_some(),
            self.port.is_some(),
            self.login_user.is_some(),
            self.login_password.is_some(),
            self.http_login_user.is_some(),
            self.http_login_password.is_some(),
        ];
        LEGACY_OPTIONS
            .iter()
            .zip(present)
            .filter_map(|(name, set)| set.then_some(*name))
            .collect()
    }

    /// Request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Merge with environment variables from the process environment
    pub fn merge_with_env(&mut self) -> Result<()> {
        self.merge_with_vars(|key| std::env::var(key).ok())
    }

    /// Merge with variables provided by `lookup`
    ///
    /// A variable that is set but does not parse is a configuration error.
    pub fn merge_with_vars<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("ZAPI_CONNECTION_TYPE") {
            self.connection_type = value.parse()?;
        }

        if let Some(url) = lookup("ZAPI_SERVER_URL") {
            self.server_url = Some(url);
        }
        if let Some(user) = lookup("ZAPI_LOGIN_USER") {
            self.login_user = Some(user);
        }
        if let Some(password) = lookup("ZAPI_LOGIN_PASSWORD") {
            self.login_password = Some(password);
        }
        if let Some(path) = lookup("ZAPI_SOCKET_PATH") {
            self.socket_path = Some(PathBuf::from(path));
        }

        if let Some(timeout) = lookup("ZAPI_TIMEOUT") {
            self.timeout = timeout
                .parse()
                .map_err(|e| invalid_var("ZAPI_TIMEOUT", e))?;
        }

        if let Some(validate) = lookup("ZAPI_VALIDATE_CERTS") {
            self.validate_certs = validate
                .parse()
                .map_err(|e| invalid_var("ZAPI_VALIDATE_CERTS", e))?;
        }

        debug!("Connection configuration merged with environment variables");
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.timeout == 0 {
            return Err(ZapiError::config("Timeout must be greater than 0"));
        }

        if let Some(url) = &self.server_url {
            url::Url::parse(url).map_err(|e| {
                ZapiError::Config(ConfigError::InvalidValue {
                    key: "server_url".to_string(),
                    reason: e.to_string(),
                })
            })?;
        }

        if self.session.timeout == Some(0) {
            return Err(ZapiError::config("Session timeout must be greater than 0"));
        }

        if self.fallback_to_direct && self.connection_type != ConnectionType::Proxied {
            debug!("fallback_to_direct has no effect unless connection_type is proxied");
        }

        Ok(())
    }
}

impl ZapiConfig {
    /// Load configuration from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading configuration from: {}", path.display());

        let contents = std::fs::read_to_string(path).map_err(|e| {
            ZapiError::Config(ConfigError::FileError {
                reason: format!("Failed to read config file {}: {}", path.display(), e),
            })
        })?;

        let config: ZapiConfig = toml::from_str(&contents).map_err(|e| {
            ZapiError::Config(ConfigError::FileError {
                reason: format!("Failed to parse config file {}: {}", path.display(), e),
            })
        })?;

        info!("Configuration loaded successfully from: {}", path.display());
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        debug!("Saving configuration to: {}", path.display());

        let contents = toml::to_string_pretty(self)
            .map_err(|e| ZapiError::config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ZapiError::config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        std::fs::write(path, contents)
            .map_err(|e| ZapiError::config(format!("Failed to write config file: {}", e)))?;

        info!("Configuration saved successfully to: {}", path.display());
        Ok(())
    }

    /// Candidate configuration files, most specific first
    pub fn search_paths() -> Vec<PathBuf> {
        let mut config_paths = vec![PathBuf::from("zapi.toml"), PathBuf::from(".zapi.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            config_paths.push(config_dir.join("zapi").join("config.toml"));
        }
        if let Some(home_dir) = dirs::home_dir() {
            config_paths.push(home_dir.join(".zapi.toml"));
        }

        config_paths.push(PathBuf::from("/etc/zapi/config.toml"));
        config_paths
    }

    /// Load configuration with fallback paths
    pub fn load_with_fallback() -> Self {
        for config_path in Self::search_paths() {
            if config_path.exists() {
                match Self::load_from_file(&config_path) {
                    Ok(config) => {
                        info!("Using configuration from: {}", config_path.display());
                        return config;
                    }
                    Err(e) => {
                        warn!(
                            "Failed to load config from {}: {}",
                            config_path.display(),
                            e
                        );
                    }
                }
            }
        }

        info!("No configuration file found, using defaults");
        Self::default()
    }

    /// Merge configuration with environment variables
    pub fn merge_with_env(&mut self) -> Result<()> {
        if let Ok(level) = std::env::var("ZAPI_LOG_LEVEL") {
            self.logging.level = level.parse()?;
        }
        self.connection.merge_with_env()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.connection.validate()?;
        debug!("Configuration validation completed successfully");
        Ok(())
    }
}

fn invalid_var(key: &str, reason: impl fmt::Display) -> ZapiError {
    ZapiError::Config(ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = ZapiConfig::default();
        assert_eq!(config.connection.connection_type, ConnectionType::Auto);
        assert_eq!(config.connection.timeout, 10);
        assert!(config.connection.validate_certs);
        assert!(!config.connection.fallback_to_direct);
        assert!(config.connection.legacy_params().is_empty());
    }

    #[test]
    fn test_connection_type_aliases() {
        let config: ConnectionConfig =
            toml::from_str("connection_type = \"httpapi\"\nsocket_path = \"/tmp/zapi.sock\"")
                .unwrap();
        assert_eq!(config.connection_type, ConnectionType::Proxied);

        let config: ConnectionConfig = toml::from_str("connection_type = \"zabbix-api\"").unwrap();
        assert_eq!(config.connection_type, ConnectionType::Legacy);

        assert_eq!(
            "HTTPAPI".parse::<ConnectionType>().unwrap(),
            ConnectionType::Proxied
        );
        assert!("carrier-pigeon".parse::<ConnectionType>().is_err());
    }

    #[test]
    fn test_legacy_params_in_declaration_order() {
        let config = ConnectionConfig {
            login_password: Some("zabbix".to_string()),
            server_url: Some("http://zabbix.local".to_string()),
            http_login_user: Some("proxy".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.legacy_params(),
            vec!["server_url", "login_password", "http_login_user"]
        );
    }

    #[test]
    fn test_config_file_operations() {
        let mut config = ZapiConfig::default();
        config.connection.server_url = Some("https://zabbix.example.com".to_string());
        config.connection.session.url_path = Some("zabbix".to_string());
        let temp_file = NamedTempFile::new().unwrap();

        config.save_to_file(temp_file.path()).unwrap();

        let loaded = ZapiConfig::load_from_file(temp_file.path()).unwrap();
        assert_eq!(loaded.connection.server_url, config.connection.server_url);
        assert_eq!(loaded.connection.session, config.connection.session);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: ZapiConfig =
            toml::from_str("[connection]\nserver_url = \"http://zabbix.local\"\n").unwrap();
        assert_eq!(config.connection.timeout, 10);
        assert!(config.connection.validate_certs);
    }

    #[test]
    fn test_merge_with_vars() {
        let vars: HashMap<&str, &str> = [
            ("ZAPI_CONNECTION_TYPE", "httpapi"),
            ("ZAPI_SOCKET_PATH", "/run/zapi/session.sock"),
            ("ZAPI_TIMEOUT", "30"),
            ("ZAPI_VALIDATE_CERTS", "false"),
            ("ZAPI_LOGIN_USER", "Admin"),
        ]
        .into_iter()
        .collect();

        let mut config = ConnectionConfig::default();
        config
            .merge_with_vars(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.connection_type, ConnectionType::Proxied);
        assert_eq!(
            config.socket_path,
            Some(PathBuf::from("/run/zapi/session.sock"))
        );
        assert_eq!(config.timeout, 30);
        assert!(!config.validate_certs);
        assert_eq!(config.login_user.as_deref(), Some("Admin"));
    }

    #[test]
    fn test_unparseable_vars_are_rejected() {
        let mut config = ConnectionConfig::default();
        let err = config
            .merge_with_vars(|key| (key == "ZAPI_CONNECTION_TYPE").then(|| "proxyed".to_string()))
            .unwrap_err();
        assert!(matches!(
            err,
            ZapiError::Config(ConfigError::InvalidValue { ref key, .. }) if key == "connection_type"
        ));
        assert_eq!(config.connection_type, ConnectionType::Auto);

        let err = config
            .merge_with_vars(|key| (key == "ZAPI_TIMEOUT").then(|| "ten".to_string()))
            .unwrap_err();
        assert!(matches!(
            err,
            ZapiError::Config(ConfigError::InvalidValue { ref key, .. }) if key == "ZAPI_TIMEOUT"
        ));
        assert_eq!(config.timeout, 10);
    }

    #[test]
    fn test_config_validation() {
        let mut config = ConnectionConfig::default();
        assert!(config.validate().is_ok());

        config.timeout = 0;
        assert!(config.validate().is_err());

        config.timeout = 10;
        config.server_url = Some("not a url".to_string());
        assert!(config.validate().is_err());

        config.server_url = Some("https://zabbix.example.com/zabbix".to_string());
        assert!(config.validate().is_ok());
    }
}
