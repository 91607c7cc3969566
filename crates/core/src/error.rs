//! Error types shared across the Pagecast crates

use thiserror::Error;

/// Result type for Pagecast operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised at the capture, negotiation, and command boundaries
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Malformed or incompatible session description; the caller may resubmit
    #[error("Negotiation failed: {0}")]
    Negotiation(String),

    /// Malformed ICE candidate; non-fatal to the session
    #[error("ICE candidate rejected: {0}")]
    Ice(String),

    /// Capture or decode failure; terminal for the affected video source
    #[error("Frame capture failed: {0}")]
    FrameCapture(String),

    /// In-page script execution failure; returned to the command caller
    #[error("Command failed: {0}")]
    Command(String),

    /// The browser automation capability is not initialized
    #[error("browser driver is not initialized")]
    DriverUnavailable,

    /// The browser process could not be launched or attached
    #[error("Browser launch failed: {0}")]
    Launch(String),

    /// Page navigation failure
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// Video encoding failure
    #[error("Encoding failed: {0}")]
    Encoding(String),

    /// Underlying real-time transport failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Whether the caller may recover by simply retrying the operation
    /// (resubmitting an offer or candidate). Capture and encoding failures
    /// are terminal for their video source and are never retried here.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Negotiation(_) | Error::Ice(_))
    }
}
