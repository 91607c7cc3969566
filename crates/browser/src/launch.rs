//! Launch configuration for the managed Chromium process.

use pagecast_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default viewport width in pixels.
pub const DEFAULT_WIDTH: u32 = 1280;

/// Default viewport height in pixels.
pub const DEFAULT_HEIGHT: u32 = 720;

/// Page opened right after the browser comes up.
pub const DEFAULT_START_URL: &str = "https://www.google.com";

/// Settings for launching the headless browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchConfig {
    /// Viewport width in pixels. Must be even so captured frames can be
    /// chroma-subsampled without cropping.
    pub width: u32,

    /// Viewport height in pixels. Same evenness requirement as `width`.
    pub height: u32,

    /// Page to open once the browser is up. `None` leaves the initial
    /// blank page in place.
    pub start_url: Option<String>,

    /// Pass `--no-sandbox` to Chromium. Required in most container
    /// images where the browser runs as root.
    pub no_sandbox: bool,

    /// Additional Chromium command line switches.
    pub extra_args: Vec<String>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            start_url: Some(DEFAULT_START_URL.to_string()),
            no_sandbox: false,
            extra_args: Vec::new(),
        }
    }
}

impl LaunchConfig {
    /// Create a configuration with the default viewport and start page.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the viewport dimensions.
    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the page opened after launch.
    pub fn with_start_url(mut self, url: impl Into<String>) -> Self {
        self.start_url = Some(url.into());
        self
    }

    /// Disable the Chromium sandbox.
    pub fn with_no_sandbox(mut self, no_sandbox: bool) -> Self {
        self.no_sandbox = no_sandbox;
        self
    }

    /// Append an extra Chromium switch.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidConfig(format!(
                "viewport dimensions must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(Error::InvalidConfig(format!(
                "viewport dimensions must be even, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// Normalize a navigation target to an absolute URL.
///
/// Bare hostnames like `example.com` are assumed to be HTTPS. Targets
/// that already carry an HTTP scheme pass through unchanged.
pub fn ensure_scheme(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = LaunchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.width, 1280);
        assert_eq!(config.height, 720);
        assert_eq!(config.start_url.as_deref(), Some("https://www.google.com"));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let config = LaunchConfig::default().with_window_size(0, 720);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_odd_dimension_rejected() {
        let config = LaunchConfig::default().with_window_size(1281, 720);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = LaunchConfig::default().with_window_size(1280, 721);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_builder_chain() {
        let config = LaunchConfig::new()
            .with_window_size(640, 480)
            .with_start_url("example.com")
            .with_no_sandbox(true)
            .with_arg("--mute-audio");
        assert_eq!(config.width, 640);
        assert_eq!(config.height, 480);
        assert_eq!(config.start_url.as_deref(), Some("example.com"));
        assert!(config.no_sandbox);
        assert_eq!(config.extra_args, vec!["--mute-audio".to_string()]);
    }

    #[test]
    fn test_ensure_scheme_prefixes_bare_hosts() {
        assert_eq!(ensure_scheme("example.com"), "https://example.com");
        assert_eq!(
            ensure_scheme("example.com/path?q=1"),
            "https://example.com/path?q=1"
        );
    }

    #[test]
    fn test_ensure_scheme_keeps_existing_scheme() {
        assert_eq!(ensure_scheme("https://example.com"), "https://example.com");
        assert_eq!(ensure_scheme("http://example.com"), "http://example.com");
    }
}
