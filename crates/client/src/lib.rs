//! Client-side library for zapi
//!
//! Resolves a [`zapi_core::ConnectionConfig`] into an authenticated
//! [`ConnectionHandle`] backed by either the proxied session transport or the
//! direct HTTP client.

pub mod handle;
pub mod resolver;
pub mod resources;
pub mod session;
pub mod transport;
pub mod transport_factory;

pub use handle::ConnectionHandle;
pub use resolver::{Attempt, ConnectionResolver, Plan, session_options};
pub use resources::{Resource, ScreenItem};
pub use session::SessionGuard;
pub use transport::{
    DirectClient, DirectClientConfig, DirectSession, PrebuiltClient, ProxiedSession,
    ProxySession, RpcClient, TransportKind,
};
pub use transport_factory::{DefaultTransports, TransportProvider};
