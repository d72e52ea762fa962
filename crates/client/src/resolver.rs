//! Connection resolution
//!
//! Turns a [`ConnectionConfig`] into an authenticated [`ConnectionHandle`].
//! The configured connection type becomes a [`Plan`]: an ordered list of
//! transport attempts. Each attempt either resolves the handle, hands over
//! to the next attempt after a connection-level failure, or ends resolution
//! with an error. There is no retry beyond walking the plan once.

use crate::handle::{ActiveTransport, ConnectionHandle};
use crate::session::SessionGuard;
use crate::transport::{DirectClientConfig, DirectSession, PrebuiltClient, RpcClient};
use crate::transport_factory::TransportProvider;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;
use zapi_core::protocol::SessionOption;
use zapi_core::{
    Advisories, AuthError, ConnectionConfig, ConnectionType, ErrorClassification, ResolveError,
    Result, ZapiError,
};

pub const AUTO_ADVISORY: &str = "It is encouraged to keep connection_type to 'auto'";
pub const EXPERIMENTAL_ADVISORY: &str = "Usage of httpapi is considered experimental";
pub const LEGACY_OPTIONS_ADVISORY: &str =
    "If using httpapi old module options should be replaced - see documentation";
pub const FALLBACK_ADVISORY: &str = "Initialization of httpapi failed try fallback to zabbix-api";

/// One transport attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Proxied,
    Direct,
}

/// Ordered transport attempts derived from the configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    attempts: Vec<Attempt>,
}

impl Plan {
    pub fn for_config(config: &ConnectionConfig) -> Self {
        let attempts = match config.connection_type {
            ConnectionType::Auto | ConnectionType::Legacy => vec![Attempt::Direct],
            ConnectionType::Proxied if config.fallback_to_direct => {
                vec![Attempt::Proxied, Attempt::Direct]
            }
            ConnectionType::Proxied => vec![Attempt::Proxied],
        };
        Self { attempts }
    }

    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    /// Whether another attempt follows the one at `index`
    pub fn has_fallback(&self, index: usize) -> bool {
        index + 1 < self.attempts.len()
    }
}

/// Session options sent to the proxy for `config`
///
/// Legacy connection options are migrated only when at least one of them is
/// set, and only set values become options.
pub fn session_options(config: &ConnectionConfig) -> Vec<(SessionOption, Value)> {
    let mut options = Vec::new();
    let url = config
        .server_url
        .as_deref()
        .and_then(|raw| Url::parse(raw).ok());

    if !config.legacy_params().is_empty() {
        let host = url
            .as_ref()
            .and_then(|u| u.host_str().map(str::to_string))
            .or_else(|| config.host.clone());
        let port = url.as_ref().and_then(Url::port).or(config.port);

        if let Some(host) = host {
            options.push((SessionOption::Host, json!(host)));
        }
        if let Some(port) = port {
            options.push((SessionOption::Port, json!(port)));
        }
        if let Some(user) = &config.login_user {
            options.push((SessionOption::RemoteUser, json!(user)));
        }
        if let Some(password) = &config.login_password {
            options.push((SessionOption::Password, json!(password)));
        }
        if let Some(user) = &config.http_login_user {
            options.push((SessionOption::BasicAuthUser, json!(user)));
        }
        if let Some(password) = &config.http_login_password {
            options.push((SessionOption::BasicAuthPassword, json!(password)));
        }
    }

    let session = &config.session;
    let use_ssl = session
        .use_ssl
        .or_else(|| url.as_ref().map(|u| u.scheme() == "https"));
    let url_path = session.url_path.clone().or_else(|| {
        url.as_ref()
            .map(|u| u.path().trim_matches('/').to_string())
            .filter(|p| !p.is_empty())
    });

    if let Some(use_ssl) = use_ssl {
        options.push((SessionOption::UseSsl, json!(use_ssl)));
    }
    if let Some(validate_certs) = session.validate_certs {
        options.push((SessionOption::ValidateCerts, json!(validate_certs)));
    }
    if let Some(url_path) = url_path {
        options.push((SessionOption::UrlPath, json!(url_path)));
    }
    if let Some(auth_key) = &session.auth_key {
        options.push((SessionOption::AuthKey, json!(auth_key)));
    }
    if let Some(timeout) = session.timeout {
        options.push((SessionOption::Timeout, json!(timeout)));
    }

    options
}

/// Resolves a configuration into an authenticated connection
pub struct ConnectionResolver<'a> {
    config: &'a ConnectionConfig,
    provider: &'a dyn TransportProvider,
    advisories: Advisories,
}

impl<'a> ConnectionResolver<'a> {
    pub fn new(
        config: &'a ConnectionConfig,
        provider: &'a dyn TransportProvider,
        advisories: Advisories,
    ) -> Self {
        Self {
            config,
            provider,
            advisories,
        }
    }

    /// Advisories raised so far
    pub fn advisories(&self) -> &Advisories {
        &self.advisories
    }

    /// Walk the plan until one attempt yields a handle
    pub async fn resolve(&self, prebuilt: Option<PrebuiltClient>) -> Result<ConnectionHandle> {
        if self.config.connection_type != ConnectionType::Auto {
            self.advisories.warn(AUTO_ADVISORY);
        }

        let plan = Plan::for_config(self.config);
        debug!("Connection plan: {:?}", plan.attempts());

        let mut prebuilt = prebuilt;
        for (index, attempt) in plan.attempts().iter().enumerate() {
            match attempt {
                Attempt::Proxied => match self.try_proxied().await {
                    Ok(handle) => return Ok(handle),
                    Err(e) if e.is_connection_level() && plan.has_fallback(index) => {
                        warn!("Proxied attempt failed: {}", e);
                        self.advisories.warn(FALLBACK_ADVISORY);
                    }
                    Err(e) if e.is_connection_level() => {
                        return Err(ResolveError::ProxiedFailed {
                            source: Box::new(e),
                        }
                        .into());
                    }
                    Err(e) => return Err(e),
                },
                Attempt::Direct => return self.try_direct(prebuilt.take()).await,
            }
        }

        Err(ResolveError::NoTransport.into())
    }

    async fn try_proxied(&self) -> Result<ConnectionHandle> {
        let socket_path = self
            .config
            .socket_path
            .as_deref()
            .ok_or(ResolveError::MissingSessionPath)?;

        self.advisories.warn(EXPERIMENTAL_ADVISORY);
        let mut session = self.provider.open_proxied(socket_path)?;

        let legacy = self.config.legacy_params();
        if !legacy.is_empty() {
            debug!("Migrating legacy options: {}", legacy.join(", "));
            self.advisories.warn(LEGACY_OPTIONS_ADVISORY);
        }
        for (key, value) in session_options(self.config) {
            session.set_option(key, value);
        }

        let version = session.api_version().await?;
        info!(
            "Connected through session proxy at {} (Zabbix {})",
            socket_path.display(),
            version
        );
        Ok(ConnectionHandle::new(
            ActiveTransport::Proxied(session),
            version,
        ))
    }

    async fn try_direct(&self, prebuilt: Option<PrebuiltClient>) -> Result<ConnectionHandle> {
        self.provider.probe_direct()?;

        let client = match prebuilt {
            Some(PrebuiltClient::Direct(client)) => {
                debug!("Reusing pre-built direct client");
                client
            }
            Some(other) => {
                debug!("Ignoring pre-built {} client", other.kind());
                self.build_direct()?
            }
            None => self.build_direct()?,
        };

        let guard = self.login(&client).await?;
        match client.api_version().await {
            Ok(version) => {
                info!("Connected directly (Zabbix {})", version);
                Ok(ConnectionHandle::new(
                    ActiveTransport::Direct { client, guard },
                    version,
                ))
            }
            Err(e) => {
                if let Err(logout) = guard.release().await {
                    debug!("Logout after failed version query failed: {}", logout);
                }
                Err(e)
            }
        }
    }

    fn build_direct(&self) -> Result<Arc<dyn DirectSession>> {
        let config = DirectClientConfig::from_connection(self.config)?;
        self.provider.build_direct(&config)
    }

    /// Log in unless the client already holds a session token
    async fn login(&self, client: &Arc<dyn DirectSession>) -> Result<SessionGuard> {
        if client.auth().is_some_and(|token| !token.is_empty()) {
            debug!("Client already authenticated, skipping login");
            return Ok(SessionGuard::disarmed());
        }

        let user = self
            .config
            .login_user
            .as_deref()
            .ok_or_else(|| login_failure(missing_credentials("login_user")))?;
        let password = self
            .config
            .login_password
            .as_deref()
            .ok_or_else(|| login_failure(missing_credentials("login_password")))?;

        client.login(user, password).await.map_err(login_failure)?;
        Ok(SessionGuard::arm(client.clone()))
    }
}

fn missing_credentials(field: &str) -> ZapiError {
    ZapiError::Auth(AuthError::MissingCredentials {
        field: field.to_string(),
    })
}

fn login_failure(source: ZapiError) -> ZapiError {
    ZapiError::Resolve(ResolveError::Login {
        source: Box::new(source),
    })
}
