//! Error categorization and classification utilities

use super::{AuthError, ResolveError, TransportError, ZapiError};

/// How an error affects connection resolution and callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// A precondition was violated (missing socket, missing dependency)
    Precondition,
    /// The transport could not be reached or broke mid-request
    Connection,
    /// Login was rejected or impossible
    Authentication,
    /// The server reported that the object already exists
    Conflict,
    /// Any other JSON-RPC error reported by the server
    Rpc,
    /// Invalid or incomplete configuration
    Configuration,
    /// Bugs and unexpected states
    Internal,
}

/// Error classification trait
pub trait ErrorClassification {
    /// Get the class of this error
    fn class(&self) -> ErrorClass;

    /// Whether the error happened at the connection level
    fn is_connection_level(&self) -> bool {
        self.class() == ErrorClass::Connection
    }

    /// Whether the error is an "already exists" conflict
    fn is_already_exists(&self) -> bool {
        self.class() == ErrorClass::Conflict
    }
}

impl ErrorClassification for ZapiError {
    fn class(&self) -> ErrorClass {
        match self {
            ZapiError::Transport(transport_err) => match transport_err {
                TransportError::ConnectionFailed { .. }
                | TransportError::SocketUnavailable { .. }
                | TransportError::Http { .. }
                | TransportError::Timeout { .. }
                | TransportError::Proxy { .. } => ErrorClass::Connection,
            },
            ZapiError::Api(api_err) => {
                if api_err.is_already_exists() {
                    ErrorClass::Conflict
                } else {
                    ErrorClass::Rpc
                }
            }
            ZapiError::Auth(AuthError::LoginFailed { source }) => match source.class() {
                ErrorClass::Connection => ErrorClass::Connection,
                _ => ErrorClass::Authentication,
            },
            ZapiError::Auth(_) => ErrorClass::Authentication,
            ZapiError::Config(_) => ErrorClass::Configuration,
            ZapiError::Dependency(_) => ErrorClass::Precondition,
            ZapiError::Resolve(resolve_err) => match resolve_err {
                ResolveError::MissingSessionPath => ErrorClass::Precondition,
                ResolveError::Login { .. } => ErrorClass::Authentication,
                ResolveError::ProxiedFailed { source } => source.class(),
                ResolveError::NoTransport => ErrorClass::Internal,
            },
            // A broken frame on the session socket is a broken connection
            ZapiError::Protocol(_) => ErrorClass::Connection,
            ZapiError::Io(_) => ErrorClass::Connection,
            ZapiError::Internal { .. } => ErrorClass::Internal,
        }
    }
}
