//! Upstream Zabbix session held by the proxy
//!
//! Session options arrive one at a time. The direct client is built lazily
//! from the options on the first request that needs it and kept until an
//! option changes.

use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use zapi_client::{DirectClient, DirectClientConfig, DirectSession, RpcClient};
use zapi_core::protocol::SessionOption;
use zapi_core::{AuthError, ConfigError, Result, ZapiError};

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Options and the client built from them
#[derive(Debug, Default)]
pub struct UpstreamSession {
    options: BTreeMap<SessionOption, Value>,
    client: Option<DirectClient>,
}

impl UpstreamSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an option; a changed value drops the cached client
    pub async fn set_option(&mut self, key: SessionOption, value: Value) {
        if self.options.get(&key) == Some(&value) {
            return;
        }

        self.options.insert(key, value);
        if let Some(client) = self.client.take() {
            debug!("Session option {} changed, dropping upstream client", key);
            if let Err(e) = client.logout().await {
                warn!("Logout of replaced upstream session failed: {}", e);
            }
        }
    }

    pub fn option(&self, key: SessionOption) -> Option<&Value> {
        self.options.get(&key)
    }

    /// Whether an authenticated upstream client is cached
    pub fn is_authenticated(&self) -> bool {
        self.client.as_ref().is_some_and(|c| c.auth().is_some())
    }

    /// Frontend URL assembled from the session options
    pub fn server_url(&self) -> Result<String> {
        let host = self
            .string_option(SessionOption::Host)?
            .ok_or_else(|| ZapiError::missing_config("host"))?;
        let scheme = if self.bool_option(SessionOption::UseSsl)?.unwrap_or(false) {
            "https"
        } else {
            "http"
        };

        let mut url = format!("{}://{}", scheme, host);
        if let Some(port) = self.u64_option(SessionOption::Port)? {
            url.push_str(&format!(":{}", port));
        }
        if let Some(path) = self.string_option(SessionOption::UrlPath)? {
            let path = path.trim_matches('/');
            if !path.is_empty() {
                url.push('/');
                url.push_str(path);
            }
        }
        Ok(url)
    }

    /// Direct client configuration from the session options
    pub fn client_config(&self) -> Result<DirectClientConfig> {
        Ok(DirectClientConfig {
            server_url: self.server_url()?,
            timeout: Duration::from_secs(
                self.u64_option(SessionOption::Timeout)?
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            basic_auth_user: self.string_option(SessionOption::BasicAuthUser)?,
            basic_auth_password: self.string_option(SessionOption::BasicAuthPassword)?,
            validate_certs: self
                .bool_option(SessionOption::ValidateCerts)?
                .unwrap_or(true),
        })
    }

    /// The cached client, building and authenticating it if needed
    pub async fn client(&mut self) -> Result<&DirectClient> {
        if self.client.is_none() {
            let client = DirectClient::new(self.client_config()?)?;
            // Login failures are reported as a broken session, not as RPC errors
            self.authenticate(&client).await.map_err(|e| {
                ZapiError::Auth(AuthError::LoginFailed {
                    source: Box::new(e),
                })
            })?;
            self.client = Some(client);
        }

        self.client
            .as_ref()
            .ok_or_else(|| ZapiError::internal("upstream client missing after build"))
    }

    async fn authenticate(&self, client: &DirectClient) -> Result<()> {
        if let Some(key) = self.string_option(SessionOption::AuthKey)? {
            debug!("Using API token for upstream session");
            client.set_auth(Some(key));
            return Ok(());
        }

        let user = self.string_option(SessionOption::RemoteUser)?;
        let password = self.string_option(SessionOption::Password)?;
        match (user, password) {
            (Some(user), Some(password)) => client.login(&user, &password).await,
            _ => {
                debug!("No upstream credentials set, session stays anonymous");
                Ok(())
            }
        }
    }

    pub async fn api_version(&mut self) -> Result<String> {
        self.client().await?.api_version().await
    }

    pub async fn call(&mut self, method: &str, params: Value) -> Result<Value> {
        self.client().await?.call(method, params).await
    }

    /// End the upstream session and forget the client
    pub async fn logout(&mut self) -> Result<()> {
        match self.client.take() {
            Some(client) => {
                client.logout().await?;
                info!("Upstream session logged out");
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn string_option(&self, key: SessionOption) -> Result<Option<String>> {
        match self.options.get(&key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(invalid(key, other)),
        }
    }

    fn bool_option(&self, key: SessionOption) -> Result<Option<bool>> {
        match self.options.get(&key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::String(s)) => s.parse().map(Some).map_err(|_| invalid(key, s)),
            Some(other) => Err(invalid(key, other)),
        }
    }

    fn u64_option(&self, key: SessionOption) -> Result<Option<u64>> {
        match self.options.get(&key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n.as_u64().map(Some).ok_or_else(|| invalid(key, n)),
            Some(Value::String(s)) => s.parse().map(Some).map_err(|_| invalid(key, s)),
            Some(other) => Err(invalid(key, other)),
        }
    }
}

fn invalid(key: SessionOption, value: impl std::fmt::Display) -> ZapiError {
    ZapiError::Config(ConfigError::InvalidValue {
        key: key.to_string(),
        reason: format!("unexpected value {}", value),
    })
}
