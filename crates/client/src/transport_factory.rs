//! Transport factory for creating transport instances
//!
//! The resolver never constructs clients itself. It asks a
//! [`TransportProvider`] so tests can substitute recording doubles for the
//! real socket and HTTP clients.

use crate::transport::direct::{DirectClient, DirectClientConfig, probe_backend};
use crate::transport::proxied::ProxySession;
use crate::transport::{DirectSession, ProxiedSession};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use zapi_core::Result;

/// Builds the clients a resolution attempt needs
pub trait TransportProvider: Send + Sync {
    /// Check that the direct client backend is usable
    fn probe_direct(&self) -> Result<()>;

    /// Open a proxied session client for the proxy at `socket_path`
    fn open_proxied(&self, socket_path: &Path) -> Result<Box<dyn ProxiedSession>>;

    /// Build a direct client
    fn build_direct(&self, config: &DirectClientConfig) -> Result<Arc<dyn DirectSession>>;
}

/// Factory producing the real socket and HTTP clients
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTransports;

impl TransportProvider for DefaultTransports {
    fn probe_direct(&self) -> Result<()> {
        probe_backend()
    }

    fn open_proxied(&self, socket_path: &Path) -> Result<Box<dyn ProxiedSession>> {
        debug!("Opening proxied session via {}", socket_path.display());
        Ok(Box::new(ProxySession::new(socket_path)))
    }

    fn build_direct(&self, config: &DirectClientConfig) -> Result<Arc<dyn DirectSession>> {
        info!("Creating direct client for {}", config.server_url);
        Ok(Arc::new(DirectClient::new(config.clone())?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_transports_build_clients() {
        let provider = DefaultTransports;
        assert!(provider.probe_direct().is_ok());

        let session = provider
            .open_proxied(Path::new("/run/zapi/session.sock"))
            .unwrap();
        assert_eq!(session.name(), "proxied");

        let direct = provider
            .build_direct(&DirectClientConfig::new("http://zabbix.local"))
            .unwrap();
        assert_eq!(direct.name(), "direct");
        assert!(direct.auth().is_none());

        assert!(
            provider
                .build_direct(&DirectClientConfig::new("not a url"))
                .is_err()
        );
    }
}
