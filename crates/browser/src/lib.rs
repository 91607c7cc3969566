//! Headless Chromium control for Pagecast.
//!
//! This crate owns the browser process and exposes it through the
//! [`pagecast_core::BrowserDriver`] trait:
//!
//! - [`LaunchConfig`] describes the viewport, start page, and process
//!   flags
//! - [`CdpDriver`] launches Chromium over the DevTools protocol and
//!   serves screenshot, script evaluation, and navigation requests
//!
//! All protocol traffic for the controlled page funnels through one
//! internal event loop task, so the driver can be shared freely behind
//! an `Arc`.

#![warn(clippy::all)]

pub mod cdp;
pub mod launch;

pub use cdp::CdpDriver;
pub use launch::{ensure_scheme, LaunchConfig, DEFAULT_HEIGHT, DEFAULT_START_URL, DEFAULT_WIDTH};

/// Returns the version of this crate.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
