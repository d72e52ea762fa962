//! Integration tests for the session proxy

use anyhow::Result;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tempfile::tempdir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use wiremock::matchers::{body_partial_json, header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zapi_client::{
    ConnectionResolver, DefaultTransports, ProxiedSession, ProxySession, RpcClient, TransportKind,
};
use zapi_core::protocol::SessionOption;
use zapi_core::{Advisories, ConnectionConfig, ConnectionType, ErrorClassification};
use zapi_core::protocol::SessionResponse;
use zapi_proxy::{MAX_REQUEST_LINE, SessionServer};

const TOKEN: &str = "0424bd59b807674191e7d77572075f33";

fn rpc_result(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "result": result,
        "id": 1
    }))
}

async fn zabbix(version: &str) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "apiinfo.version" })))
        .respond_with(rpc_result(json!(version)))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "user.login",
            "params": { "username": "Admin", "password": "zabbix" }
        })))
        .respond_with(rpc_result(json!(TOKEN)))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "user.logout" })))
        .respond_with(rpc_result(json!(true)))
        .mount(&server)
        .await;

    server
}

fn start_proxy(socket_path: PathBuf) -> Result<SessionServer> {
    let server = SessionServer::new(socket_path);
    let listener = server.bind()?;
    let serving = server.clone();
    tokio::spawn(async move {
        let _ = serving.serve(listener).await;
    });
    Ok(server)
}

fn session_for(socket: &Path, upstream: &MockServer) -> ProxySession {
    let address = upstream.address();
    let mut session = ProxySession::new(socket);
    session.set_option(SessionOption::Host, json!(address.ip().to_string()));
    session.set_option(SessionOption::Port, json!(address.port()));
    session
}

#[tokio::test]
async fn test_proxy_ping_and_status() -> Result<()> {
    let temp_dir = tempdir()?;
    let socket_path = temp_dir.path().join("run").join("session.sock");
    let _server = start_proxy(socket_path.clone())?;

    let session = ProxySession::new(&socket_path);
    assert!(session.ping().await, "Ping should succeed");

    let status = session.status().await?;
    assert!(!status.authenticated);
    assert!(status.requests >= 1);
    Ok(())
}

#[tokio::test]
async fn test_proxy_logs_in_and_relays_calls() -> Result<()> {
    let upstream = zabbix("6.0.21").await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "host.get", "auth": TOKEN })))
        .respond_with(rpc_result(json!([{ "hostid": "10084" }])))
        .expect(1)
        .mount(&upstream)
        .await;

    let temp_dir = tempdir()?;
    let socket_path = temp_dir.path().join("session.sock");
    let _server = start_proxy(socket_path.clone())?;

    let mut session = session_for(&socket_path, &upstream);
    session.set_option(SessionOption::RemoteUser, json!("Admin"));
    session.set_option(SessionOption::Password, json!("zabbix"));

    assert_eq!(session.api_version().await?, "6.0.21");
    let hosts = session.call("host.get", json!({})).await?;
    assert_eq!(hosts[0]["hostid"], "10084");
    assert!(session.status().await?.authenticated);

    session.logout().await?;
    assert!(!session.status().await?.authenticated);
    Ok(())
}

#[tokio::test]
async fn test_auth_key_skips_login() -> Result<()> {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "apiinfo.version" })))
        .respond_with(rpc_result(json!("6.4.10")))
        .mount(&upstream)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "user.login" })))
        .respond_with(rpc_result(json!(TOKEN)))
        .expect(0)
        .mount(&upstream)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "host.get" })))
        .and(header("authorization", "Bearer api-token"))
        .respond_with(rpc_result(json!([])))
        .expect(1)
        .mount(&upstream)
        .await;

    let temp_dir = tempdir()?;
    let socket_path = temp_dir.path().join("session.sock");
    let _server = start_proxy(socket_path.clone())?;

    let mut session = session_for(&socket_path, &upstream);
    session.set_option(SessionOption::AuthKey, json!("api-token"));

    assert_eq!(session.api_version().await?, "6.4.10");
    session.call("host.get", json!({})).await?;
    Ok(())
}

#[tokio::test]
async fn test_option_change_resets_upstream_client() -> Result<()> {
    let first = zabbix("6.0.21").await;
    let second = zabbix("7.0.0").await;

    let temp_dir = tempdir()?;
    let socket_path = temp_dir.path().join("session.sock");
    let _server = start_proxy(socket_path.clone())?;

    let mut session = session_for(&socket_path, &first);
    assert_eq!(session.api_version().await?, "6.0.21");

    session.set_option(SessionOption::Port, json!(second.address().port()));
    assert_eq!(session.api_version().await?, "7.0.0");
    Ok(())
}

#[tokio::test]
async fn test_unreachable_upstream_is_connection_level() -> Result<()> {
    let temp_dir = tempdir()?;
    let socket_path = temp_dir.path().join("session.sock");
    let _server = start_proxy(socket_path.clone())?;

    let mut session = ProxySession::new(&socket_path);
    session.set_option(SessionOption::Host, json!("127.0.0.1"));
    session.set_option(SessionOption::Port, json!(9));

    let err = session.api_version().await.unwrap_err();
    assert!(err.is_connection_level());
    Ok(())
}

#[tokio::test]
async fn test_shutdown_removes_socket() -> Result<()> {
    let temp_dir = tempdir()?;
    let socket_path = temp_dir.path().join("session.sock");
    let server = start_proxy(socket_path.clone())?;
    assert!(socket_path.exists());

    server.shutdown().await?;
    assert!(!socket_path.exists());
    Ok(())
}

#[tokio::test]
async fn test_resolver_through_running_proxy() -> Result<()> {
    let upstream = zabbix("6.0.21").await;
    let temp_dir = tempdir()?;
    let socket_path = temp_dir.path().join("session.sock");
    let _server = start_proxy(socket_path.clone())?;

    let config = ConnectionConfig {
        connection_type: ConnectionType::Proxied,
        server_url: Some(upstream.uri()),
        login_user: Some("Admin".to_string()),
        login_password: Some("zabbix".to_string()),
        socket_path: Some(socket_path),
        ..Default::default()
    };
    let advisories = Advisories::new();

    let handle = ConnectionResolver::new(&config, &DefaultTransports, advisories.clone())
        .resolve(None)
        .await?;

    assert_eq!(handle.transport_kind(), TransportKind::ProxiedSession);
    assert_eq!(handle.api_version_prefix(), "6.0.2");
    assert_eq!(advisories.messages().len(), 3);
    handle.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_resolver_falls_back_when_proxy_is_down() -> Result<()> {
    let upstream = zabbix("6.0.21").await;
    let temp_dir = tempdir()?;

    let config = ConnectionConfig {
        connection_type: ConnectionType::Proxied,
        server_url: Some(upstream.uri()),
        login_user: Some("Admin".to_string()),
        login_password: Some("zabbix".to_string()),
        socket_path: Some(temp_dir.path().join("absent.sock")),
        fallback_to_direct: true,
        ..Default::default()
    };

    let handle = ConnectionResolver::new(&config, &DefaultTransports, Advisories::new())
        .resolve(None)
        .await?;

    assert_eq!(handle.transport_kind(), TransportKind::DirectClient);
    handle.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_oversized_request_line_is_rejected() -> Result<()> {
    let temp_dir = tempdir()?;
    let socket_path = temp_dir.path().join("session.sock");
    let _server = start_proxy(socket_path.clone())?;

    let stream = UnixStream::connect(&socket_path).await?;
    let (reader, mut writer) = stream.into_split();
    writer
        .write_all(&vec![b'a'; MAX_REQUEST_LINE as usize])
        .await?;

    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    reader.read_line(&mut line).await?;
    match serde_json::from_str::<SessionResponse>(line.trim())? {
        SessionResponse::Error { message } => assert!(message.contains("line limit")),
        other => panic!("unexpected response: {:?}", other),
    }

    line.clear();
    assert_eq!(reader.read_line(&mut line).await?, 0);

    let session = ProxySession::new(&socket_path);
    assert!(session.ping().await, "Proxy should keep serving other clients");
    Ok(())
}
