//! Test doubles shared by the zapi client tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use zapi_client::transport::{DirectClientConfig, DirectSession, ProxiedSession, RpcClient};
use zapi_client::transport_factory::TransportProvider;
use zapi_core::protocol::{SessionOption, SessionRequest, SessionResponse};
use zapi_core::{ApiError, DependencyError, Result, TransportError, ZapiError};

/// Ordered record of what the doubles were asked to do
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    pub fn push<S: Into<String>>(&self, event: S) {
        self.events.lock().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn contains(&self, event: &str) -> bool {
        self.events.lock().iter().any(|e| e == event)
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }
}

/// Direct session double
pub struct MockDirect {
    pub log: EventLog,
    pub version: String,
    pub token: Mutex<Option<String>>,
    pub reject_login: bool,
    /// Make `api_version` fail as if the server went away after login
    pub fail_version: bool,
    /// Error returned by every `call`
    pub call_error: Mutex<Option<ApiError>>,
}

impl MockDirect {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            version: "6.0.21".to_string(),
            token: Mutex::new(None),
            reject_login: false,
            fail_version: false,
            call_error: Mutex::new(None),
        }
    }

    pub fn authenticated(log: EventLog, token: &str) -> Self {
        let mock = Self::new(log);
        *mock.token.lock() = Some(token.to_string());
        mock
    }

    pub fn rejecting_login(log: EventLog) -> Self {
        Self {
            reject_login: true,
            ..Self::new(log)
        }
    }

    pub fn failing_version(log: EventLog) -> Self {
        Self {
            fail_version: true,
            ..Self::new(log)
        }
    }
}

#[async_trait]
impl RpcClient for MockDirect {
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        self.log.push(format!("direct.call {} {}", method, params));
        match self.call_error.lock().clone() {
            Some(err) => Err(ZapiError::Api(err)),
            None => Ok(serde_json::json!({ "itemids": ["1"] })),
        }
    }

    async fn api_version(&self) -> Result<String> {
        self.log.push("direct.api_version");
        if self.fail_version {
            return Err(ZapiError::connection("connection reset by peer"));
        }
        Ok(self.version.clone())
    }

    fn name(&self) -> &'static str {
        "mock-direct"
    }
}

#[async_trait]
impl DirectSession for MockDirect {
    fn auth(&self) -> Option<String> {
        self.token.lock().clone()
    }

    async fn login(&self, user: &str, _password: &str) -> Result<()> {
        self.log.push(format!("direct.login {}", user));
        if self.reject_login {
            return Err(ZapiError::Api(ApiError::new(
                -32602,
                "Invalid params.",
                "Incorrect user name or password or account is temporarily blocked.",
            )));
        }
        *self.token.lock() = Some("0424bd59b807674191e7d77572075f33".to_string());
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        self.log.push("direct.logout");
        *self.token.lock() = None;
        Ok(())
    }
}

/// Proxied session double
pub struct MockProxied {
    log: EventLog,
    /// `None` makes every request fail as if the socket were gone
    version: Option<String>,
    options: Arc<Mutex<Vec<(SessionOption, Value)>>>,
}

#[async_trait]
impl RpcClient for MockProxied {
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        self.log.push(format!("proxied.call {} {}", method, params));
        self.version
            .as_ref()
            .map(|_| Value::Bool(true))
            .ok_or_else(socket_gone)
    }

    async fn api_version(&self) -> Result<String> {
        self.log.push("proxied.api_version");
        self.version.clone().ok_or_else(socket_gone)
    }

    fn name(&self) -> &'static str {
        "mock-proxied"
    }
}

impl ProxiedSession for MockProxied {
    fn set_option(&mut self, key: SessionOption, value: Value) {
        self.log.push(format!("proxied.set_option {}", key));
        self.options.lock().push((key, value));
    }
}

fn socket_gone() -> ZapiError {
    ZapiError::Transport(TransportError::SocketUnavailable {
        path: "/run/zapi/session.sock".to_string(),
        reason: "Connection refused".to_string(),
    })
}

/// Provider handing out the doubles and recording every construction
pub struct MockProvider {
    pub log: EventLog,
    pub direct: Arc<MockDirect>,
    pub proxied_version: Option<String>,
    pub proxied_options: Arc<Mutex<Vec<(SessionOption, Value)>>>,
    pub built_configs: Arc<Mutex<Vec<DirectClientConfig>>>,
    pub probe_fails: bool,
}

impl MockProvider {
    pub fn new() -> Self {
        let log = EventLog::default();
        Self {
            direct: Arc::new(MockDirect::new(log.clone())),
            log,
            proxied_version: Some("6.4.10".to_string()),
            proxied_options: Arc::new(Mutex::new(Vec::new())),
            built_configs: Arc::new(Mutex::new(Vec::new())),
            probe_fails: false,
        }
    }

    /// A provider whose proxy is unreachable
    pub fn with_unreachable_proxy() -> Self {
        Self {
            proxied_version: None,
            ..Self::new()
        }
    }

    pub fn with_direct(mut self, build: impl FnOnce(EventLog) -> MockDirect) -> Self {
        self.direct = Arc::new(build(self.log.clone()));
        self
    }

    pub fn options(&self) -> Vec<(SessionOption, Value)> {
        self.proxied_options.lock().clone()
    }
}

impl TransportProvider for MockProvider {
    fn probe_direct(&self) -> Result<()> {
        self.log.push("probe_direct");
        if self.probe_fails {
            return Err(ZapiError::Dependency(DependencyError::Unavailable {
                name: "reqwest".to_string(),
                url: "https://crates.io/crates/reqwest".to_string(),
                reason: "no TLS backend".to_string(),
            }));
        }
        Ok(())
    }

    fn open_proxied(&self, socket_path: &Path) -> Result<Box<dyn ProxiedSession>> {
        self.log
            .push(format!("open_proxied {}", socket_path.display()));
        Ok(Box::new(MockProxied {
            log: self.log.clone(),
            version: self.proxied_version.clone(),
            options: self.proxied_options.clone(),
        }))
    }

    fn build_direct(&self, config: &DirectClientConfig) -> Result<Arc<dyn DirectSession>> {
        self.log.push("build_direct");
        self.built_configs.lock().push(config.clone());
        Ok(self.direct.clone())
    }
}

/// A minimal session proxy answering each request with `respond`
///
/// Returns the requests it received, in order.
pub async fn spawn_fake_proxy<F>(
    socket_path: PathBuf,
    respond: F,
) -> Arc<Mutex<Vec<SessionRequest>>>
where
    F: Fn(&SessionRequest) -> SessionResponse + Send + Sync + 'static,
{
    let listener = UnixListener::bind(&socket_path).unwrap();
    let received = Arc::new(Mutex::new(Vec::new()));
    let seen = received.clone();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let (reader, mut writer) = stream.into_split();
            let mut reader = BufReader::new(reader);
            let mut line = String::new();
            if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                continue;
            }
            let request: SessionRequest = serde_json::from_str(line.trim()).unwrap();
            let response = respond(&request);
            seen.lock().push(request);

            let json = serde_json::to_string(&response).unwrap();
            let _ = writer.write_all(json.as_bytes()).await;
            let _ = writer.write_all(b"\n").await;
        }
    });

    received
}
