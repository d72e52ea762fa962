//! JSON-RPC 2.0 envelope used by the Zabbix API

use crate::error::{ApiError, ZapiError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Methods the server answers without an auth token
pub const UNAUTHENTICATED_METHODS: [&str; 2] = ["apiinfo.version", "user.login"];

/// A JSON-RPC request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Value,
    pub id: u64,
    /// Session token in the request body (servers before 6.4)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
}

impl RpcRequest {
    pub fn new<S: Into<String>>(method: S, params: Value, id: u64) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
            id,
            auth: None,
        }
    }

    /// Attach a body token unless the method must be sent anonymously
    pub fn with_auth(mut self, token: Option<String>) -> Self {
        if !self.is_unauthenticated() {
            self.auth = token;
        }
        self
    }

    /// Whether the method is answered without authentication
    pub fn is_unauthenticated(&self) -> bool {
        UNAUTHENTICATED_METHODS.contains(&self.method.as_str())
    }
}

/// Error member of a JSON-RPC response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl From<RpcErrorObject> for ApiError {
    fn from(err: RpcErrorObject) -> Self {
        let data = match err.data {
            Some(Value::String(s)) => s,
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        ApiError::new(err.code, err.message, data)
    }
}

/// A JSON-RPC response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
    #[serde(default)]
    pub id: Option<Value>,
}

impl RpcResponse {
    /// Turn the envelope into the call result
    pub fn into_result(self) -> Result<Value, ZapiError> {
        match (self.result, self.error) {
            (_, Some(error)) => Err(ZapiError::Api(error.into())),
            (Some(result), None) => Ok(result),
            (None, None) => Err(ZapiError::protocol(
                "response carries neither result nor error",
            )),
        }
    }
}
