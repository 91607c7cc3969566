//! Core capture pipeline and control plane for the Pagecast remote browser
//!
//! This crate owns the pieces that have to get timing, ordering, and policy
//! right, independent of any particular transport or browser backend:
//!
//! - **Frame pipeline**: [`FramePacer`] (30 fps cadence without debt),
//!   [`FrameCapturer`] (screenshot → canonical RGB24), and [`VideoSource`]
//!   (pull-based producer with strictly increasing presentation timestamps)
//! - **Command dispatch**: [`CommandDispatcher`] routes click/type/scroll
//!   requests into the page and applies the [`AllowListPolicy`] to
//!   navigational clicks before they run
//! - **Driver seam**: [`BrowserDriver`] is the automation capability the
//!   pipeline consumes; [`DriverSlot`] holds the process-wide handle and
//!   reports `DriverUnavailable` while the browser is down
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐   tick    ┌───────────────┐   PNG     ┌──────────────┐
//! │ FramePacer ├──────────►│ FrameCapturer ├──────────►│ BrowserDriver │
//! └────────────┘           └──────┬────────┘  capture  └──────┬───────┘
//!        ▲                        │ RGB24 + pts               │ scripts
//!        │     VideoSource::next_frame()              CommandDispatcher
//!        └────────────────────────┴───────────────────────────┘
//! ```
//!
//! The transport layer pulls frames with [`VideoSource::next_frame`] until
//! the owning session closes; command execution and capture share one
//! serialized driver.

#![warn(clippy::all)]

mod capture;
mod dispatch;
mod driver;
mod error;
mod frame;
mod pacer;
mod policy;

#[cfg(test)]
pub(crate) mod test_util;

pub use capture::{FrameCapturer, VideoSource};
pub use dispatch::{CommandDispatcher, CommandOutcome, CommandRequest};
pub use driver::{BrowserDriver, DriverSlot};
pub use error::{Error, Result};
pub use frame::{Frame, TARGET_FPS, TIME_BASE};
pub use pacer::FramePacer;
pub use policy::AllowListPolicy;

/// Crate version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
