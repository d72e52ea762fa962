//! Create/delete helpers for a single API object type

use crate::handle::ConnectionHandle;
use serde_json::Value;
use tracing::{debug, info};
use zapi_core::{ErrorClassification, Result};

/// Calls `<name>.create` and `<name>.delete` on a handle
#[derive(Debug, Clone, Copy)]
pub struct Resource<'a> {
    handle: &'a ConnectionHandle,
    name: &'a str,
}

impl<'a> Resource<'a> {
    pub fn new(handle: &'a ConnectionHandle, name: &'a str) -> Self {
        Self { handle, name }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    /// Create an object
    ///
    /// Returns `None` when the object already existed and `ignore_exists` is
    /// set. Every other error is returned unchanged.
    pub async fn create(&self, payload: Value, ignore_exists: bool) -> Result<Option<Value>> {
        let method = format!("{}.create", self.name);
        match self.handle.call(&method, payload).await {
            Ok(result) => {
                info!("Created {}", self.name);
                Ok(Some(result))
            }
            Err(e) if ignore_exists && e.is_already_exists() => {
                debug!("{} already exists, ignoring: {}", self.name, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Delete objects by id; `None` deletes nothing
    pub async fn delete(&self, ids: Option<Vec<String>>) -> Result<Value> {
        let ids = ids.unwrap_or_default();
        let method = format!("{}.delete", self.name);
        let result = self.handle.call(&method, Value::from(ids.clone())).await?;
        info!("Deleted {} {} object(s)", ids.len(), self.name);
        Ok(result)
    }
}

/// Screen item helper
pub struct ScreenItem;

impl ScreenItem {
    pub const NAME: &'static str = "screenitem";

    pub fn on(handle: &ConnectionHandle) -> Resource<'_> {
        Resource::new(handle, Self::NAME)
    }
}
