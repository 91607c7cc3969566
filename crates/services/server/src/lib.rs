//! HTTP control plane for the Pagecast remote browser
//!
//! Wires the signaling session manager, the command dispatcher, and the
//! browser driver slot behind one axum router. The binary in this crate
//! launches the browser, builds the shared state, and serves until a
//! shutdown signal arrives.

#![warn(clippy::all)]

pub mod server;

pub use server::{ErrorResponse, HttpServer, ServerState};

/// Crate version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
