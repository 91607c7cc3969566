//! DevTools-protocol driver backing the [`BrowserDriver`] trait.

use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use pagecast_core::{BrowserDriver, Error, Result};

use crate::launch::{ensure_scheme, LaunchConfig};

/// Chromium driver speaking the DevTools protocol.
///
/// The browser process is owned by this struct and torn down on
/// [`CdpDriver::close`]. Protocol commands for a single page session are
/// serialized through an operation lock so captures and script
/// evaluations never interleave on the wire.
pub struct CdpDriver {
    browser: Mutex<Browser>,
    page: Page,
    op_lock: Mutex<()>,
    event_loop: JoinHandle<()>,
}

impl CdpDriver {
    /// Launch a headless Chromium process and open the start page.
    pub async fn launch(config: &LaunchConfig) -> Result<Arc<Self>> {
        config.validate()?;

        let mut builder = BrowserConfig::builder()
            .window_size(config.width, config.height)
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg(format!("--window-size={},{}", config.width, config.height));
        if config.no_sandbox {
            builder = builder.no_sandbox();
        }
        for arg in &config.extra_args {
            builder = builder.arg(arg);
        }
        let browser_config = builder.build().map_err(Error::Launch)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| Error::Launch(format!("failed to start chromium: {}", e)))?;

        // The handler future multiplexes every CDP message for the whole
        // browser. It must be polled for any page call to make progress.
        let event_loop = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser event loop terminated: {}", e);
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| Error::Launch(format!("failed to open initial page: {}", e)))?;

        info!(
            "browser launched with a {}x{} viewport",
            config.width, config.height
        );

        let driver = Arc::new(Self {
            browser: Mutex::new(browser),
            page,
            op_lock: Mutex::new(()),
            event_loop,
        });

        if let Some(url) = &config.start_url {
            driver.navigate(url).await?;
        }

        Ok(driver)
    }

    /// Shut down the browser process.
    ///
    /// Safe to call more than once. Failures are logged rather than
    /// surfaced since the process is going away either way.
    pub async fn close(&self) {
        let _guard = self.op_lock.lock().await;
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            warn!("browser close failed: {}", e);
        }
        if let Err(e) = browser.wait().await {
            warn!("browser did not exit cleanly: {}", e);
        }
        self.event_loop.abort();
        info!("browser closed");
    }
}

#[async_trait]
impl BrowserDriver for CdpDriver {
    async fn capture_surface(&self) -> Result<Vec<u8>> {
        let _guard = self.op_lock.lock().await;
        self.page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .build(),
            )
            .await
            .map_err(|e| Error::FrameCapture(format!("screenshot command failed: {}", e)))
    }

    async fn evaluate(&self, expression: &str) -> Result<Value> {
        let _guard = self.op_lock.lock().await;
        let result = self
            .page
            .evaluate(expression)
            .await
            .map_err(|e| Error::Command(format!("script evaluation failed: {}", e)))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        let target = ensure_scheme(url);
        self.page
            .goto(target.as_str())
            .await
            .map_err(|e| Error::Navigation(format!("failed to open {}: {}", target, e)))?;
        info!("navigated to {}", target);
        Ok(())
    }
}
