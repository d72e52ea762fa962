//! The resolved, authenticated connection

use crate::resources::Resource;
use crate::session::SessionGuard;
use crate::transport::{DirectSession, ProxiedSession, RpcClient, TransportKind};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use zapi_core::Result;

/// Length of the version prefix kept on the handle
pub const VERSION_PREFIX_LEN: usize = 5;

/// The transport a handle is bound to
pub(crate) enum ActiveTransport {
    Proxied(Box<dyn ProxiedSession>),
    Direct {
        client: Arc<dyn DirectSession>,
        guard: SessionGuard,
    },
}

/// An authenticated connection to the Zabbix API
///
/// Exactly one transport is active for the lifetime of the handle.
pub struct ConnectionHandle {
    transport: ActiveTransport,
    api_version: String,
}

impl ConnectionHandle {
    pub(crate) fn new(transport: ActiveTransport, api_version: String) -> Self {
        Self {
            transport,
            api_version,
        }
    }

    pub fn transport_kind(&self) -> TransportKind {
        match &self.transport {
            ActiveTransport::Proxied(_) => TransportKind::ProxiedSession,
            ActiveTransport::Direct { .. } => TransportKind::DirectClient,
        }
    }

    /// First five characters of the version reported by the server
    pub fn api_version_prefix(&self) -> String {
        self.api_version.chars().take(VERSION_PREFIX_LEN).collect()
    }

    /// Full version string reported by the server
    pub fn full_api_version(&self) -> &str {
        &self.api_version
    }

    /// Name of the client calls go through
    pub fn client_name(&self) -> &'static str {
        match &self.transport {
            ActiveTransport::Proxied(session) => session.name(),
            ActiveTransport::Direct { client, .. } => client.name(),
        }
    }

    /// Forward `method` with `params`
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        debug!(
            "Calling {} via {} ({})",
            method,
            self.transport_kind(),
            self.client_name()
        );
        match &self.transport {
            ActiveTransport::Proxied(session) => session.call(method, params).await,
            ActiveTransport::Direct { client, .. } => client.call(method, params).await,
        }
    }

    /// Helper for one API object type, e.g. `screenitem`
    pub fn resource<'a>(&'a self, name: &'a str) -> Resource<'a> {
        Resource::new(self, name)
    }

    /// Release the session held by this handle
    ///
    /// The proxied session belongs to the proxy, so only a direct session is
    /// logged out here.
    pub async fn close(self) -> Result<()> {
        match self.transport {
            ActiveTransport::Proxied(_) => Ok(()),
            ActiveTransport::Direct { guard, .. } => guard.release().await,
        }
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("transport", &self.transport_kind())
            .field("api_version", &self.api_version)
            .finish()
    }
}
