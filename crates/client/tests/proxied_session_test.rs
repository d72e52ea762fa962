//! Proxied session client against a fake session proxy

mod shared;

use serde_json::json;
use shared::spawn_fake_proxy;
use zapi_client::{ProxiedSession, ProxySession, RpcClient};
use zapi_core::protocol::{SessionOption, SessionRequest, SessionResponse};
use zapi_core::{ErrorClass, ErrorClassification, TransportError, ZapiError};

fn answer(request: &SessionRequest) -> SessionResponse {
    match request {
        SessionRequest::SetOption { .. } => SessionResponse::Success { data: None },
        SessionRequest::ApiVersion => SessionResponse::Version {
            version: "6.0.21".to_string(),
        },
        SessionRequest::Call { method, .. } if method == "hostgroup.create" => {
            SessionResponse::RpcError {
                code: -32602,
                message: "Invalid params.".to_string(),
                data: "Host group \"Linux servers\" already exists.".to_string(),
            }
        }
        SessionRequest::Call { method, params } => SessionResponse::Success {
            data: Some(json!({ "method": method, "params": params })),
        },
        SessionRequest::Ping => SessionResponse::Pong,
        SessionRequest::Status => SessionResponse::Status {
            uptime: 12,
            authenticated: true,
            requests: 3,
        },
        SessionRequest::Logout => SessionResponse::Success { data: None },
    }
}

#[tokio::test]
async fn test_options_are_flushed_before_first_request() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("session.sock");
    let received = spawn_fake_proxy(socket.clone(), answer).await;

    let mut session = ProxySession::new(&socket);
    session.set_option(SessionOption::Host, json!("zabbix.local"));
    session.set_option(SessionOption::RemoteUser, json!("Admin"));

    assert_eq!(session.api_version().await.unwrap(), "6.0.21");
    assert!(session.pending_options().is_empty());

    assert_eq!(
        received.lock().clone(),
        vec![
            SessionRequest::SetOption {
                key: SessionOption::Host,
                value: json!("zabbix.local"),
            },
            SessionRequest::SetOption {
                key: SessionOption::RemoteUser,
                value: json!("Admin"),
            },
            SessionRequest::ApiVersion,
        ]
    );

    // Nothing left to flush on the next request
    session.call("host.get", json!({})).await.unwrap();
    assert_eq!(received.lock().len(), 4);
}

#[tokio::test]
async fn test_call_relays_method_and_params() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("session.sock");
    spawn_fake_proxy(socket.clone(), answer).await;

    let session = ProxySession::new(&socket);
    let result = session
        .call("host.get", json!({ "output": ["hostid"] }))
        .await
        .unwrap();

    assert_eq!(result["method"], "host.get");
    assert_eq!(result["params"]["output"][0], "hostid");
}

#[tokio::test]
async fn test_rpc_error_surfaces_as_api_error() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("session.sock");
    spawn_fake_proxy(socket.clone(), answer).await;

    let session = ProxySession::new(&socket);
    let err = session
        .call("hostgroup.create", json!({ "name": "Linux servers" }))
        .await
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::Conflict);
}

#[tokio::test]
async fn test_proxy_error_is_connection_level() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("session.sock");
    spawn_fake_proxy(socket.clone(), |_| SessionResponse::Error {
        message: "upstream login failed".to_string(),
    })
    .await;

    let session = ProxySession::new(&socket);
    let err = session.api_version().await.unwrap_err();

    assert!(err.is_connection_level());
    assert!(matches!(
        err,
        ZapiError::Transport(TransportError::Proxy { .. })
    ));
}

#[tokio::test]
async fn test_ping_and_status() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("session.sock");

    let session = ProxySession::new(&socket);
    assert!(!session.ping().await);

    spawn_fake_proxy(socket.clone(), answer).await;
    assert!(session.ping().await);

    let status = session.status().await.unwrap();
    assert_eq!(status.uptime, 12);
    assert!(status.authenticated);

    session.logout().await.unwrap();
}
