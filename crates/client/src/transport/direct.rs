//! Direct HTTP transport
//!
//! Talks JSON-RPC to `<server_url>/api_jsonrpc.php` with reqwest. The client
//! is cheap to clone; clones share the HTTP connection pool, the session
//! token and the cached server version.

use super::{DirectSession, RpcClient};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use zapi_core::protocol::{RpcRequest, RpcResponse};
use zapi_core::{
    ConfigError, ConnectionConfig, DependencyError, ProtocolError, Result, TransportError,
    ZapiError,
};

const ENDPOINT: &str = "api_jsonrpc.php";
const BACKEND_NAME: &str = "reqwest";
const BACKEND_URL: &str = "https://crates.io/crates/reqwest";

/// Outcome of building an HTTP client once per process
static BACKEND_PROBE: Lazy<std::result::Result<(), String>> = Lazy::new(|| {
    reqwest::Client::builder()
        .build()
        .map(|_| ())
        .map_err(|e| e.to_string())
});

/// Check that the HTTP client backend can be initialised in this process
pub fn probe_backend() -> Result<()> {
    (*BACKEND_PROBE).clone().map_err(|reason| {
        ZapiError::Dependency(DependencyError::Unavailable {
            name: BACKEND_NAME.to_string(),
            url: BACKEND_URL.to_string(),
            reason,
        })
    })
}

/// Direct client configuration
#[derive(Clone)]
pub struct DirectClientConfig {
    /// Frontend URL; the JSON-RPC endpoint is derived from it
    pub server_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// HTTP basic auth user
    pub basic_auth_user: Option<String>,
    /// HTTP basic auth password
    pub basic_auth_password: Option<String>,
    /// Verify TLS certificates
    pub validate_certs: bool,
}

impl fmt::Debug for DirectClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectClientConfig")
            .field("server_url", &self.server_url)
            .field("timeout", &self.timeout)
            .field("basic_auth_user", &self.basic_auth_user)
            .field("validate_certs", &self.validate_certs)
            .finish_non_exhaustive()
    }
}

impl DirectClientConfig {
    pub fn new<S: Into<String>>(server_url: S) -> Self {
        Self {
            server_url: server_url.into(),
            timeout: Duration::from_secs(10),
            basic_auth_user: None,
            basic_auth_password: None,
            validate_certs: true,
        }
    }

    /// Build from the legacy connection options
    pub fn from_connection(config: &ConnectionConfig) -> Result<Self> {
        let server_url = config
            .server_url
            .clone()
            .ok_or_else(|| ZapiError::missing_config("server_url"))?;

        Ok(Self {
            server_url,
            timeout: config.timeout(),
            basic_auth_user: config.http_login_user.clone(),
            basic_auth_password: config.http_login_password.clone(),
            validate_certs: config.validate_certs,
        })
    }
}

/// Derive the JSON-RPC endpoint from a frontend URL
pub fn api_endpoint(server_url: &str) -> Result<Url> {
    let mut url = Url::parse(server_url).map_err(|e| {
        ZapiError::Config(ConfigError::InvalidValue {
            key: "server_url".to_string(),
            reason: e.to_string(),
        })
    })?;

    if !url.path().ends_with(ENDPOINT) {
        let path = format!("{}/{}", url.path().trim_end_matches('/'), ENDPOINT);
        url.set_path(&path);
    }
    Ok(url)
}

/// Parse the `major.minor` part of a Zabbix version string
pub fn parse_version(version: &str) -> Option<(u32, u32)> {
    let mut parts = version.split('.');
    let major = parts.next()?.trim().parse().ok()?;
    let minor = parts
        .next()
        .map(|m| {
            m.chars()
                .take_while(|c| c.is_ascii_digit())
                .collect::<String>()
        })
        .and_then(|m| m.parse().ok())
        .unwrap_or(0);
    Some((major, minor))
}

struct Inner {
    endpoint: Url,
    http: reqwest::Client,
    config: DirectClientConfig,
    auth: RwLock<Option<String>>,
    version: RwLock<Option<String>>,
    next_id: AtomicU64,
}

/// Zabbix API client speaking JSON-RPC over HTTP
#[derive(Clone)]
pub struct DirectClient {
    inner: Arc<Inner>,
}

impl fmt::Debug for DirectClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectClient")
            .field("endpoint", &self.inner.endpoint.as_str())
            .field("authenticated", &self.inner.auth.read().is_some())
            .finish()
    }
}

impl DirectClient {
    /// Create a new direct client
    pub fn new(config: DirectClientConfig) -> Result<Self> {
        let endpoint = api_endpoint(&config.server_url)?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.validate_certs)
            .build()
            .map_err(|e| {
                ZapiError::Dependency(DependencyError::Unavailable {
                    name: BACKEND_NAME.to_string(),
                    url: BACKEND_URL.to_string(),
                    reason: e.to_string(),
                })
            })?;

        if !config.validate_certs {
            warn!("TLS certificate validation disabled for {}", endpoint);
        }
        debug!("Created direct client for {}", endpoint);

        Ok(Self {
            inner: Arc::new(Inner {
                endpoint,
                http,
                config,
                auth: RwLock::new(None),
                version: RwLock::new(None),
                next_id: AtomicU64::new(1),
            }),
        })
    }

    /// The JSON-RPC endpoint this client posts to
    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    /// Use an existing session token or API token
    pub fn set_auth(&self, token: Option<String>) {
        *self.inner.auth.write() = token.filter(|t| !t.is_empty());
    }

    /// Whether the server wants the token in an Authorization header
    fn uses_bearer(&self) -> bool {
        // The header would clash with HTTP basic auth
        if self.inner.config.basic_auth_user.is_some() {
            return false;
        }
        self.inner
            .version
            .read()
            .as_deref()
            .and_then(parse_version)
            .is_some_and(|v| v >= (6, 4))
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let token = self.auth();
        let bearer = self.uses_bearer();

        let request = RpcRequest::new(method, params, id)
            .with_auth(if bearer { None } else { token.clone() });

        let mut builder = self
            .inner
            .http
            .post(self.inner.endpoint.clone())
            .json(&request);

        if let Some(user) = &self.inner.config.basic_auth_user {
            builder = builder.basic_auth(user, self.inner.config.basic_auth_password.as_ref());
        }
        if bearer && !request.is_unauthenticated() {
            if let Some(token) = &token {
                builder = builder.bearer_auth(token);
            }
        }

        debug!("Sending {} (id {}) to {}", method, id, self.inner.endpoint);

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ZapiError::Transport(TransportError::Timeout {
                    seconds: self.inner.config.timeout.as_secs(),
                })
            } else {
                ZapiError::connection(format!("{}: {}", self.inner.endpoint, e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ZapiError::Transport(TransportError::Http {
                status: status.as_u16(),
                url: self.inner.endpoint.to_string(),
            }));
        }

        let envelope: RpcResponse = response.json().await.map_err(|e| {
            ZapiError::Protocol(ProtocolError::Deserialization {
                reason: format!("invalid JSON-RPC response to {}: {}", method, e),
            })
        })?;

        envelope.into_result()
    }
}

#[async_trait]
impl RpcClient for DirectClient {
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        self.request(method, params).await
    }

    async fn api_version(&self) -> Result<String> {
        if let Some(version) = self.inner.version.read().clone() {
            return Ok(version);
        }

        let result = self.request("apiinfo.version", json!([])).await?;
        let version = result
            .as_str()
            .ok_or_else(|| ZapiError::protocol("apiinfo.version did not return a string"))?
            .to_string();

        debug!("Zabbix API version {}", version);
        *self.inner.version.write() = Some(version.clone());
        Ok(version)
    }

    fn name(&self) -> &'static str {
        "direct"
    }
}

#[async_trait]
impl DirectSession for DirectClient {
    fn auth(&self) -> Option<String> {
        self.inner.auth.read().clone()
    }

    async fn login(&self, user: &str, password: &str) -> Result<()> {
        let version = self.api_version().await?;
        // 5.4 renamed the login parameter
        let params = match parse_version(&version) {
            Some(v) if v < (5, 4) => json!({ "user": user, "password": password }),
            _ => json!({ "username": user, "password": password }),
        };

        let result = self.request("user.login", params).await?;
        let token = result
            .as_str()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ZapiError::protocol("user.login did not return a session token"))?;

        *self.inner.auth.write() = Some(token.to_string());
        info!("Logged in to {} as {}", self.inner.endpoint, user);
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        if self.auth().is_none() {
            return Ok(());
        }

        let result = self.request("user.logout", json!([])).await;
        *self.inner.auth.write() = None;
        result.map(|_| {
            info!("Logged out from {}", self.inner.endpoint);
        })
    }
}
