//! WebRTC delivery for Pagecast.
//!
//! Streams the captured browser surface to a single remote viewer:
//!
//! ```text
//! VideoSource ──> VideoEncoder (H.264 worker thread) ──> video track
//!                                                            │
//! offer/ICE over signaling ──> SessionManager ──> SignalingSession
//! ```
//!
//! - [`WebRtcConfig`] holds ICE servers and track identity
//! - [`VideoEncoder`] encodes RGB frames to Annex B H.264 off the
//!   async scheduler
//! - [`SignalingSession`] owns one peer connection, queues early ICE
//!   candidates, and pumps frames while connected
//! - [`SessionManager`] enforces the single-viewer policy

#![warn(clippy::all)]

pub mod config;
pub mod encoder;
pub mod manager;
pub mod session;

pub use config::WebRtcConfig;
pub use encoder::VideoEncoder;
pub use manager::{IceOutcome, SessionManager};
pub use session::{IceDisposition, SessionState, SignalingSession};

/// Returns the version of this crate.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
