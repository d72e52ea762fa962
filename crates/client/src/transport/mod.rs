//! Transport abstraction for zapi client
//!
//! Two transports reach the Zabbix API: the direct HTTP client and the
//! proxied session relayed through `zapi-proxy`. Both answer JSON-RPC calls
//! through [`RpcClient`]; the extra capabilities each one needs during
//! resolution live in [`DirectSession`] and [`ProxiedSession`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use zapi_core::Result;
use zapi_core::protocol::SessionOption;

pub mod direct;
pub mod proxied;

pub use direct::{DirectClient, DirectClientConfig};
pub use proxied::ProxySession;

/// Trait for anything that can forward a JSON-RPC call
#[async_trait]
pub trait RpcClient: Send + Sync {
    /// Forward `method` with `params` and return the `result` member
    async fn call(&self, method: &str, params: Value) -> Result<Value>;

    /// Query the version string reported by the server
    async fn api_version(&self) -> Result<String>;

    /// Get the name of this transport type
    fn name(&self) -> &'static str;
}

/// A client that owns its own authenticated HTTP session
#[async_trait]
pub trait DirectSession: RpcClient {
    /// Current session token, if any
    fn auth(&self) -> Option<String>;

    /// Authenticate and keep the session token
    async fn login(&self, user: &str, password: &str) -> Result<()>;

    /// End the session and forget the token
    async fn logout(&self) -> Result<()>;
}

/// A client whose session is held by a proxy process
pub trait ProxiedSession: RpcClient {
    /// Queue a session option for the proxy
    fn set_option(&mut self, key: SessionOption, value: Value);
}

/// Which transport a handle is bound to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Calls are relayed by the session proxy
    ProxiedSession,
    /// Calls go straight to the server over HTTP
    DirectClient,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::ProxiedSession => write!(f, "httpapi"),
            TransportKind::DirectClient => write!(f, "zabbix-api"),
        }
    }
}

/// A client built by the caller before resolution
///
/// Only a [`PrebuiltClient::Direct`] client is reused, and only by the direct
/// attempt.
pub enum PrebuiltClient {
    Direct(Arc<dyn DirectSession>),
    Proxied(Box<dyn ProxiedSession>),
}

impl PrebuiltClient {
    pub fn kind(&self) -> TransportKind {
        match self {
            PrebuiltClient::Direct(_) => TransportKind::DirectClient,
            PrebuiltClient::Proxied(_) => TransportKind::ProxiedSession,
        }
    }
}

impl fmt::Debug for PrebuiltClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PrebuiltClient").field(&self.kind()).finish()
    }
}

impl From<DirectClient> for PrebuiltClient {
    fn from(client: DirectClient) -> Self {
        PrebuiltClient::Direct(Arc::new(client))
    }
}
