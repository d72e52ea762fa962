//! Session proxy server
//!
//! Listens on a Unix domain socket and answers newline-delimited
//! [`SessionRequest`]s. The upstream Zabbix session outlives individual
//! connections, so every client process talking to the same socket shares it.

use crate::upstream::UpstreamSession;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use zapi_core::protocol::{SessionRequest, SessionResponse};
use zapi_core::ZapiError;

/// Longest request line accepted, newline included
pub const MAX_REQUEST_LINE: u64 = 1024 * 1024;

/// State shared by every connection
#[derive(Debug)]
struct Shared {
    upstream: Mutex<UpstreamSession>,
    requests: AtomicU64,
    started: Instant,
}

/// Session proxy bound to one socket
#[derive(Debug, Clone)]
pub struct SessionServer {
    socket_path: PathBuf,
    shared: Arc<Shared>,
}

impl SessionServer {
    /// Create a new session proxy
    pub fn new(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            shared: Arc::new(Shared {
                upstream: Mutex::new(UpstreamSession::new()),
                requests: AtomicU64::new(0),
                started: Instant::now(),
            }),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Bind the socket, replacing a stale one
    pub fn bind(&self) -> Result<UnixListener> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        info!("Session proxy listening on {:?}", self.socket_path);
        Ok(listener)
    }

    /// Bind and serve until the listener fails
    pub async fn start(&self) -> Result<()> {
        let listener = self.bind()?;
        self.serve(listener).await
    }

    /// Serve connections accepted on `listener`
    pub async fn serve(&self, listener: UnixListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let shared = self.shared.clone();
                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_connection(stream, shared).await {
                            error!("Session connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Session accept error: {}", e);
                    break;
                }
            }
        }

        Ok(())
    }

    /// Log out upstream and remove the socket
    pub async fn shutdown(&self) -> Result<()> {
        if let Err(e) = self.shared.upstream.lock().await.logout().await {
            warn!("Upstream logout during shutdown failed: {}", e);
        }

        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }
        info!("Session proxy at {:?} stopped", self.socket_path);
        Ok(())
    }

    /// Handle a single connection
    async fn handle_connection(stream: UnixStream, shared: Arc<Shared>) -> Result<()> {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        loop {
            line.clear();
            match (&mut reader).take(MAX_REQUEST_LINE).read_line(&mut line).await {
                Ok(0) => break,
                Ok(_) if !line.ends_with('\n') && line.len() as u64 >= MAX_REQUEST_LINE => {
                    warn!("Dropping connection after oversized request");
                    let response = SessionResponse::Error {
                        message: format!(
                            "Request exceeds the {} byte line limit",
                            MAX_REQUEST_LINE
                        ),
                    };
                    Self::send_response(&mut writer, &response).await?;
                    break;
                }
                Ok(_) => {
                    let request: SessionRequest = match serde_json::from_str(line.trim()) {
                        Ok(request) => request,
                        Err(e) => {
                            let response = SessionResponse::Error {
                                message: format!("Invalid request format: {}", e),
                            };
                            Self::send_response(&mut writer, &response).await?;
                            continue;
                        }
                    };

                    let response = Self::handle_request(request, &shared).await;
                    Self::send_response(&mut writer, &response).await?;
                }
                Err(e) => {
                    error!("Session read error: {}", e);
                    break;
                }
            }
        }

        Ok(())
    }

    /// Handle one request
    async fn handle_request(request: SessionRequest, shared: &Shared) -> SessionResponse {
        shared.requests.fetch_add(1, Ordering::Relaxed);

        match request {
            SessionRequest::SetOption { key, value } => {
                if key.is_secret() {
                    debug!("Session option {} set", key);
                } else {
                    debug!("Session option {} = {}", key, value);
                }
                shared.upstream.lock().await.set_option(key, value).await;
                SessionResponse::Success { data: None }
            }
            SessionRequest::ApiVersion => {
                match shared.upstream.lock().await.api_version().await {
                    Ok(version) => SessionResponse::Version { version },
                    Err(e) => error_response(e),
                }
            }
            SessionRequest::Call { method, params } => {
                debug!("Relaying {}", method);
                match shared.upstream.lock().await.call(&method, params).await {
                    Ok(data) => SessionResponse::Success { data: Some(data) },
                    Err(e) => error_response(e),
                }
            }
            SessionRequest::Logout => match shared.upstream.lock().await.logout().await {
                Ok(()) => SessionResponse::Success { data: None },
                Err(e) => error_response(e),
            },
            SessionRequest::Status => SessionResponse::Status {
                uptime: shared.started.elapsed().as_secs(),
                authenticated: shared.upstream.lock().await.is_authenticated(),
                requests: shared.requests.load(Ordering::Relaxed),
            },
            SessionRequest::Ping => SessionResponse::Pong,
        }
    }

    /// Send a response line
    async fn send_response(
        writer: &mut tokio::net::unix::OwnedWriteHalf,
        response: &SessionResponse,
    ) -> Result<()> {
        let json = serde_json::to_string(response)?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Server errors keep their JSON-RPC details; everything else is a proxy error
fn error_response(err: ZapiError) -> SessionResponse {
    match err {
        ZapiError::Api(api) => api.into(),
        other => {
            warn!("Upstream request failed: {}", other);
            SessionResponse::Error {
                message: other.chain(),
            }
        }
    }
}

/// Default socket path for the session proxy
pub fn default_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("zapi")
        .join("session.sock")
}
