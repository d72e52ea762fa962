//! Scoped ownership of an authenticated direct session
//!
//! A [`SessionGuard`] is armed once a login succeeds. Releasing it logs the
//! session out; dropping it without releasing performs the same logout on a
//! best-effort basis so the server-side session does not outlive the process.

use crate::transport::DirectSession;
use std::fmt;
use std::sync::Arc;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, warn};
use zapi_core::Result;

pub struct SessionGuard {
    client: Option<Arc<dyn DirectSession>>,
}

impl SessionGuard {
    /// Guard a freshly authenticated session
    pub fn arm(client: Arc<dyn DirectSession>) -> Self {
        debug!("Session guard armed for {} transport", client.name());
        Self {
            client: Some(client),
        }
    }

    /// A guard that owns nothing
    ///
    /// Used when the session was authenticated before resolution, so its
    /// lifetime belongs to whoever logged it in.
    pub fn disarmed() -> Self {
        Self { client: None }
    }

    pub fn is_armed(&self) -> bool {
        self.client.is_some()
    }

    /// Log the session out now
    pub async fn release(mut self) -> Result<()> {
        match self.client.take() {
            Some(client) => client.logout().await,
            None => Ok(()),
        }
    }
}

impl fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGuard")
            .field("armed", &self.is_armed())
            .finish()
    }
}

async fn logout_quietly(client: Arc<dyn DirectSession>) {
    if let Err(e) = client.logout().await {
        warn!("Logout during teardown failed: {}", e);
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };

        debug!("Session guard dropped while armed, logging out");
        match Handle::try_current() {
            Ok(handle) if matches!(handle.runtime_flavor(), RuntimeFlavor::MultiThread) => {
                tokio::task::block_in_place(|| handle.block_on(logout_quietly(client)));
            }
            Ok(handle) => {
                // Blocking here would stall the only worker thread
                handle.spawn(logout_quietly(client));
            }
            Err(_) => match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime.block_on(logout_quietly(client)),
                Err(e) => warn!("No runtime available for teardown logout: {}", e),
            },
        }
    }
}
