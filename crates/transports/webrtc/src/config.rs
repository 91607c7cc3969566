//! Configuration types for the WebRTC transport.

use pagecast_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Configuration for outbound peer connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebRtcConfig {
    /// STUN server URLs (at least one required)
    pub stun_servers: Vec<String>,

    /// Identifier of the published video track
    pub track_id: String,

    /// Stream identifier grouping the published tracks
    pub stream_id: String,
}

impl Default for WebRtcConfig {
    fn default() -> Self {
        Self {
            stun_servers: vec!["stun:stun.l.google.com:19302".to_string()],
            track_id: "pagecast-video".to_string(),
            stream_id: "pagecast".to_string(),
        }
    }
}

impl WebRtcConfig {
    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `stun_servers` is empty
    /// - `track_id` or `stream_id` is empty
    pub fn validate(&self) -> Result<()> {
        if self.stun_servers.is_empty() {
            return Err(Error::InvalidConfig(
                "At least one STUN server is required".to_string(),
            ));
        }
        if self.track_id.is_empty() || self.stream_id.is_empty() {
            return Err(Error::InvalidConfig(
                "track_id and stream_id must be non-empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Replace the STUN server list.
    pub fn with_stun_servers(mut self, servers: Vec<String>) -> Self {
        self.stun_servers = servers;
        self
    }
}
