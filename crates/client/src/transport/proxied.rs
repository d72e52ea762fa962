//! Proxied session transport
//!
//! Connects to a `zapi-proxy` process over its Unix domain socket. Each
//! request opens a fresh connection, writes one JSON line and reads one JSON
//! line back. The proxy keeps the session and its options between
//! connections.

use super::{ProxiedSession, RpcClient};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::{debug, info};
use zapi_core::protocol::{SessionOption, SessionRequest, SessionResponse};
use zapi_core::{ApiError, Result, TransportError, ZapiError};

/// Proxy status as reported by [`ProxySession::status`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyStatus {
    pub uptime: u64,
    pub authenticated: bool,
    pub requests: u64,
}

/// Client side of a proxied session
#[derive(Debug)]
pub struct ProxySession {
    socket_path: PathBuf,
    pending: Mutex<Vec<(SessionOption, Value)>>,
}

impl ProxySession {
    /// Create a session client for the proxy listening on `socket_path`
    pub fn new<P: AsRef<Path>>(socket_path: P) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Options queued but not yet sent to the proxy
    pub fn pending_options(&self) -> Vec<(SessionOption, Value)> {
        self.pending.lock().clone()
    }

    /// Send a single request on a fresh connection
    async fn send(&self, request: &SessionRequest) -> Result<SessionResponse> {
        let mut stream = UnixStream::connect(&self.socket_path).await.map_err(|e| {
            ZapiError::Transport(TransportError::SocketUnavailable {
                path: self.socket_path.display().to_string(),
                reason: e.to_string(),
            })
        })?;

        let json = serde_json::to_string(request)?;
        stream.write_all(json.as_bytes()).await?;
        stream.write_all(b"\n").await?;
        stream.flush().await?;

        let mut reader = BufReader::new(&mut stream);
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Err(ZapiError::connection(
                "session proxy closed the connection without answering",
            ));
        }

        Ok(serde_json::from_str(line.trim())?)
    }

    /// Send queued options, keeping them queued if the proxy is unreachable
    async fn flush_options(&self) -> Result<()> {
        let pending = std::mem::take(&mut *self.pending.lock());
        for (index, (key, value)) in pending.iter().enumerate() {
            if key.is_secret() {
                debug!("Setting session option {}", key);
            } else {
                debug!("Setting session option {} = {}", key, value);
            }

            let outcome = self
                .send(&SessionRequest::SetOption {
                    key: *key,
                    value: value.clone(),
                })
                .await
                .and_then(expect_success);

            if let Err(e) = outcome {
                let mut queue = self.pending.lock();
                let unsent: Vec<_> = pending[index..].to_vec();
                queue.splice(0..0, unsent);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Flush pending options, then send `request`
    async fn request(&self, request: SessionRequest) -> Result<SessionResponse> {
        self.flush_options().await?;
        let response = self.send(&request).await?;
        match response {
            SessionResponse::Error { message } => {
                Err(ZapiError::Transport(TransportError::Proxy { message }))
            }
            SessionResponse::RpcError {
                code,
                message,
                data,
            } => Err(ZapiError::Api(ApiError::new(code, message, data))),
            other => Ok(other),
        }
    }

    /// Check if the proxy is answering
    pub async fn ping(&self) -> bool {
        matches!(
            self.send(&SessionRequest::Ping).await,
            Ok(SessionResponse::Pong)
        )
    }

    /// Get proxy status
    pub async fn status(&self) -> Result<ProxyStatus> {
        match self.request(SessionRequest::Status).await? {
            SessionResponse::Status {
                uptime,
                authenticated,
                requests,
            } => Ok(ProxyStatus {
                uptime,
                authenticated,
                requests,
            }),
            other => Err(unexpected(&other)),
        }
    }

    /// Ask the proxy to end its upstream session
    pub async fn logout(&self) -> Result<()> {
        let response = self.request(SessionRequest::Logout).await?;
        expect_success(response)?;
        info!("Proxy session at {} logged out", self.socket_path.display());
        Ok(())
    }
}

fn expect_success(response: SessionResponse) -> Result<()> {
    match response {
        SessionResponse::Success { .. } => Ok(()),
        SessionResponse::Error { message } => {
            Err(ZapiError::Transport(TransportError::Proxy { message }))
        }
        other => Err(unexpected(&other)),
    }
}

fn unexpected(response: &SessionResponse) -> ZapiError {
    ZapiError::protocol(format!("unexpected session response: {:?}", response))
}

#[async_trait]
impl RpcClient for ProxySession {
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let response = self
            .request(SessionRequest::Call {
                method: method.to_string(),
                params,
            })
            .await?;

        match response {
            SessionResponse::Success { data } => Ok(data.unwrap_or(Value::Null)),
            other => Err(unexpected(&other)),
        }
    }

    async fn api_version(&self) -> Result<String> {
        match self.request(SessionRequest::ApiVersion).await? {
            SessionResponse::Version { version } => Ok(version),
            other => Err(unexpected(&other)),
        }
    }

    fn name(&self) -> &'static str {
        "proxied"
    }
}

impl ProxiedSession for ProxySession {
    fn set_option(&mut self, key: SessionOption, value: Value) {
        let pending = self.pending.get_mut();
        match pending.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => pending.push((key, value)),
        }
    }
}
