//! Browser automation capability

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// The automation capability consumed by the capture pipeline and the
/// command dispatcher.
///
/// Implementations serialize driver access internally: one logical operation
/// is in flight at a time, even though capture and command execution are
/// independent callers.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Capture the current rendered surface as an encoded PNG.
    async fn capture_surface(&self) -> Result<Vec<u8>>;

    /// Evaluate a JavaScript expression against the live page and return its
    /// completion value.
    async fn evaluate(&self, expression: &str) -> Result<serde_json::Value>;

    /// Navigate the page to `url`.
    async fn navigate(&self, url: &str) -> Result<()>;
}

impl std::fmt::Debug for dyn BrowserDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn BrowserDriver")
    }
}

/// Shared holder for the process's driver handle.
///
/// The slot starts empty. Every operation through an empty slot fails with
/// [`Error::DriverUnavailable`] while the process stays alive, so the health
/// probe keeps reflecting the outage until the driver is re-initialized.
#[derive(Clone, Default)]
pub struct DriverSlot {
    inner: Arc<RwLock<Option<Arc<dyn BrowserDriver>>>>,
}

impl DriverSlot {
    /// A slot with no driver installed
    pub fn empty() -> Self {
        Self::default()
    }

    /// A slot pre-populated with `driver`
    pub fn with_driver(driver: Arc<dyn BrowserDriver>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(driver))),
        }
    }

    /// Install (or replace) the driver handle
    pub async fn install(&self, driver: Arc<dyn BrowserDriver>) {
        *self.inner.write().await = Some(driver);
    }

    /// Remove and return the current driver handle, leaving the slot empty
    pub async fn take(&self) -> Option<Arc<dyn BrowserDriver>> {
        self.inner.write().await.take()
    }

    /// The current driver handle, or [`Error::DriverUnavailable`]
    pub async fn get(&self) -> Result<Arc<dyn BrowserDriver>> {
        self.inner
            .read()
            .await
            .as_ref()
            .cloned()
            .ok_or(Error::DriverUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::MockDriver;

    #[tokio::test]
    async fn test_empty_slot_reports_driver_unavailable() {
        let slot = DriverSlot::empty();
        let err = slot.get().await.unwrap_err();
        assert!(matches!(err, Error::DriverUnavailable));
    }

    #[tokio::test]
    async fn test_install_and_take() {
        let slot = DriverSlot::empty();
        slot.install(Arc::new(MockDriver::default())).await;
        assert!(slot.get().await.is_ok());

        assert!(slot.take().await.is_some());
        assert!(slot.get().await.is_err());
    }
}
