//! JSON result document printed on stdout

use serde::Serialize;
use serde_json::{Map, Value};
use zapi_core::{ErrorClassification, ZapiError};

#[derive(Debug, Clone, Default, Serialize)]
pub struct ModuleOutput {
    pub changed: bool,
    pub failed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    pub warnings: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ModuleOutput {
    pub fn ok(changed: bool) -> Self {
        Self {
            changed,
            ..Default::default()
        }
    }

    pub fn failure(err: &ZapiError) -> Self {
        let mut output = Self {
            failed: true,
            msg: Some(err.to_string()),
            exception: Some(err.chain()),
            ..Default::default()
        };
        output
            .extra
            .insert("error_class".to_string(), Value::from(format!("{:?}", err.class())));
        output
    }

    pub fn with<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}
