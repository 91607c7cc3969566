//! Owner of the single active signaling session.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;

use pagecast_core::{DriverSlot, Error, Result, VideoSource};

use crate::config::WebRtcConfig;
use crate::encoder::VideoEncoder;
use crate::session::{IceDisposition, SessionState, SignalingSession};

/// Result of routing a remote ICE candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceOutcome {
    /// A live session took the candidate
    Accepted,
    /// No session exists that could use it
    NoSession,
}

/// Keeps at most one viewer session alive at a time.
///
/// A new offer replaces a connected or defunct session but is rejected
/// while an earlier negotiation is still in flight, so two viewers
/// racing each other cannot corrupt signaling state.
pub struct SessionManager {
    driver: DriverSlot,
    config: WebRtcConfig,
    active: Mutex<Option<Arc<SignalingSession>>>,
}

impl SessionManager {
    /// Create a manager serving frames from the given driver slot.
    pub fn new(driver: DriverSlot, config: WebRtcConfig) -> Self {
        Self {
            driver,
            config,
            active: Mutex::new(None),
        }
    }

    /// Accept a viewer offer and return the answer SDP.
    ///
    /// Any previous session that already reached a connected or
    /// terminal state is closed and replaced. Candidates arriving while
    /// the answer is being produced queue on the new session.
    pub async fn submit_offer(&self, offer_sdp: String) -> Result<String> {
        let (session, replaced) = {
            let mut active = self.active.lock().await;
            if let Some(current) = active.as_ref() {
                let state = current.state().await;
                if !state.is_defunct() && state != SessionState::Connected {
                    return Err(Error::Negotiation(format!(
                        "negotiation already in progress (state {:?})",
                        state
                    )));
                }
            }
            let driver = self.driver.get().await?;
            let source = VideoSource::new(driver);
            let encoder = VideoEncoder::spawn().await?;
            let session = SignalingSession::new(&self.config, source, encoder).await?;
            let replaced = active.replace(session.clone());
            (session, replaced)
        };

        if let Some(old) = replaced {
            info!("Replacing session {} with {}", old.id(), session.id());
            if let Err(e) = old.close().await {
                warn!("Failed to close replaced session {}: {}", old.id(), e);
            }
        }

        session.apply_offer(offer_sdp).await
    }

    /// Route a remote ICE candidate to the active session.
    pub async fn add_ice_candidate(&self, candidate: RTCIceCandidateInit) -> Result<IceOutcome> {
        let session = { self.active.lock().await.clone() };
        let Some(session) = session else {
            return Ok(IceOutcome::NoSession);
        };
        match session.add_ice_candidate(candidate).await? {
            IceDisposition::Rejected => Ok(IceOutcome::NoSession),
            IceDisposition::Queued | IceDisposition::Applied => Ok(IceOutcome::Accepted),
        }
    }

    /// Close and drop the active session, if any.
    pub async fn close_active(&self) -> Result<()> {
        let session = { self.active.lock().await.take() };
        if let Some(session) = session {
            session.close().await?;
        }
        Ok(())
    }

    /// The currently installed session, if any.
    pub async fn active_session(&self) -> Option<Arc<SignalingSession>> {
        self.active.lock().await.clone()
    }
}
