//! Peer signaling session and the outbound video stream.

use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_H264};
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::media::Sample;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

use pagecast_core::{Error, Frame, Result, VideoSource};

use crate::config::WebRtcConfig;
use crate::encoder::VideoEncoder;

/// Signaling lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, no offer applied yet
    Idle,
    /// Remote offer stored, answer not yet produced
    OfferReceived,
    /// Local answer produced, transport still coming up
    AnswerSent,
    /// Peer connection established, media flowing
    Connected,
    /// Closed locally or by the peer
    Closed,
    /// Transport failed
    Failed,
}

impl SessionState {
    /// Terminal states accept no further signaling.
    pub fn is_defunct(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}

/// What happened to a submitted ICE candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceDisposition {
    /// Held back until the local answer exists
    Queued,
    /// Handed to the transport
    Applied,
    /// The session is defunct and takes no candidates
    Rejected,
}

struct StreamParts {
    source: VideoSource,
    encoder: VideoEncoder,
}

/// One remote viewer: a peer connection, its H.264 track, and the
/// frame pump feeding it.
///
/// The session reacts to transport state through a monitor task fed by
/// the peer connection callback. Frames start flowing when the
/// transport reports connected and stop on failure, close, or a
/// capture error.
pub struct SignalingSession {
    id: String,
    state: Arc<RwLock<SessionState>>,
    peer_connection: Arc<RTCPeerConnection>,
    video_track: Arc<TrackLocalStaticSample>,
    pending_candidates: Mutex<Vec<RTCIceCandidateInit>>,
    stream: Mutex<Option<StreamParts>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    shutdown: mpsc::Sender<()>,
    shutdown_rx: Mutex<Option<mpsc::Receiver<()>>>,
}

impl SignalingSession {
    /// Create a session with its peer connection and video track ready
    /// for an offer.
    pub async fn new(
        config: &WebRtcConfig,
        source: VideoSource,
        encoder: VideoEncoder,
    ) -> Result<Arc<Self>> {
        config.validate()?;

        let id = uuid::Uuid::new_v4().to_string();
        info!("Creating signaling session {}", id);

        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| Error::Negotiation(format!("Failed to register codecs: {}", e)))?;

        let interceptor_registry =
            register_default_interceptors(Default::default(), &mut media_engine).map_err(|e| {
                Error::Negotiation(format!("Failed to register interceptors: {}", e))
            })?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(interceptor_registry)
            .build();

        let ice_servers: Vec<RTCIceServer> = config
            .stun_servers
            .iter()
            .map(|url| RTCIceServer {
                urls: vec![url.clone()],
                ..Default::default()
            })
            .collect();

        let rtc_config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await.map_err(|e| {
            Error::Negotiation(format!("Failed to create peer connection: {}", e))
        })?);

        let video_track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_H264.to_string(),
                clock_rate: 90000,
                channels: 0,
                sdp_fmtp_line:
                    "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42001f"
                        .to_string(),
                rtcp_feedback: vec![],
            },
            config.track_id.clone(),
            config.stream_id.clone(),
        ));

        let rtp_sender = peer_connection
            .add_track(video_track.clone() as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(|e| Error::Negotiation(format!("Failed to add video track: {}", e)))?;

        // RTCP must be consumed for the interceptor chain to run.
        tokio::spawn(async move {
            let mut rtcp_buf = vec![0u8; 1500];
            while let Ok((_, _)) = rtp_sender.read(&mut rtcp_buf).await {}
        });

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let events_tx = events_tx.clone();
                Box::pin(async move {
                    let _ = events_tx.send(s);
                })
            },
        ));

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let session = Arc::new(Self {
            id,
            state: Arc::new(RwLock::new(SessionState::Idle)),
            peer_connection,
            video_track,
            pending_candidates: Mutex::new(Vec::new()),
            stream: Mutex::new(Some(StreamParts { source, encoder })),
            pump: Mutex::new(None),
            shutdown: shutdown_tx,
            shutdown_rx: Mutex::new(Some(shutdown_rx)),
        });

        let monitor = Arc::downgrade(&session);
        tokio::spawn(async move {
            Self::run_monitor(monitor, events_rx).await;
        });

        Ok(session)
    }

    /// Session identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current signaling state.
    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// The underlying peer connection, exposed for integration tests
    /// that need to wire up the remote side.
    pub fn peer_connection(&self) -> &Arc<RTCPeerConnection> {
        &self.peer_connection
    }

    /// Accept a remote offer and produce the local answer SDP.
    ///
    /// Valid only on an idle session. Candidates queued while the
    /// answer was being produced are applied in arrival order before
    /// this returns.
    pub async fn apply_offer(&self, offer_sdp: String) -> Result<String> {
        {
            let mut state = self.state.write().await;
            match *state {
                SessionState::Idle => *state = SessionState::OfferReceived,
                other => {
                    return Err(Error::Negotiation(format!(
                        "offer not acceptable in state {:?}",
                        other
                    )))
                }
            }
        }

        let answer_sdp = match self.negotiate(offer_sdp).await {
            Ok(sdp) => sdp,
            Err(e) => {
                self.set_state(SessionState::Failed).await;
                return Err(e);
            }
        };

        // Transition and drain under the queue lock so a candidate
        // arriving mid-drain cannot jump ahead of queued ones.
        let mut pending = self.pending_candidates.lock().await;
        {
            let mut state = self.state.write().await;
            *state = SessionState::AnswerSent;
        }
        let queued: Vec<_> = pending.drain(..).collect();
        if !queued.is_empty() {
            debug!(
                "Session {} applying {} queued ICE candidates",
                self.id,
                queued.len()
            );
        }
        for candidate in queued {
            if let Err(e) = self.peer_connection.add_ice_candidate(candidate).await {
                warn!("Session {} dropped a queued ICE candidate: {}", self.id, e);
            }
        }
        drop(pending);

        debug!("Session {} answer created", self.id);
        Ok(answer_sdp)
    }

    async fn negotiate(&self, offer_sdp: String) -> Result<String> {
        let offer = RTCSessionDescription::offer(offer_sdp)
            .map_err(|e| Error::Negotiation(format!("Failed to parse offer: {}", e)))?;

        self.peer_connection
            .set_remote_description(offer)
            .await
            .map_err(|e| Error::Negotiation(format!("Failed to set remote description: {}", e)))?;

        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .map_err(|e| Error::Negotiation(format!("Failed to create answer: {}", e)))?;

        self.peer_connection
            .set_local_description(answer)
            .await
            .map_err(|e| Error::Negotiation(format!("Failed to set local description: {}", e)))?;

        let local_desc = self
            .peer_connection
            .local_description()
            .await
            .ok_or_else(|| {
                Error::Negotiation("No local description after setting answer".to_string())
            })?;

        Ok(local_desc.sdp)
    }

    /// Route a remote ICE candidate according to the session state.
    ///
    /// Candidates arriving before the answer exists are queued;
    /// afterwards they go straight to the transport.
    pub async fn add_ice_candidate(
        &self,
        candidate: RTCIceCandidateInit,
    ) -> Result<IceDisposition> {
        let mut pending = self.pending_candidates.lock().await;
        let state = *self.state.read().await;
        match state {
            SessionState::Idle | SessionState::OfferReceived => {
                pending.push(candidate);
                Ok(IceDisposition::Queued)
            }
            SessionState::AnswerSent | SessionState::Connected => {
                self.peer_connection
                    .add_ice_candidate(candidate)
                    .await
                    .map_err(|e| Error::Ice(format!("Failed to add ICE candidate: {}", e)))?;
                Ok(IceDisposition::Applied)
            }
            SessionState::Closed | SessionState::Failed => Ok(IceDisposition::Rejected),
        }
    }

    /// Tear the session down. Safe to call more than once.
    pub async fn close(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if *state == SessionState::Closed {
                debug!("Session {} already closed", self.id);
                return Ok(());
            }
            *state = SessionState::Closed;
        }

        info!("Closing session {}", self.id);
        self.stop_stream().await;
        self.peer_connection
            .close()
            .await
            .map_err(|e| Error::Transport(format!("Failed to close peer connection: {}", e)))?;
        Ok(())
    }

    async fn set_state(&self, new_state: SessionState) {
        let mut state = self.state.write().await;
        if state.is_defunct() {
            return;
        }
        if *state != new_state {
            debug!(
                "Session {} state {:?} -> {:?}",
                self.id, *state, new_state
            );
            *state = new_state;
        }
    }

    async fn run_monitor(
        session: std::sync::Weak<Self>,
        mut events: mpsc::UnboundedReceiver<RTCPeerConnectionState>,
    ) {
        while let Some(event) = events.recv().await {
            let Some(session) = session.upgrade() else {
                break;
            };
            session.handle_transport_event(event).await;
        }
        debug!("session monitor stopped");
    }

    async fn handle_transport_event(&self, event: RTCPeerConnectionState) {
        match event {
            RTCPeerConnectionState::Connected => {
                let ready = {
                    let mut state = self.state.write().await;
                    if *state == SessionState::AnswerSent {
                        *state = SessionState::Connected;
                        true
                    } else {
                        false
                    }
                };
                if ready {
                    info!("Session {} connected", self.id);
                    self.start_stream().await;
                } else {
                    debug!(
                        "Session {} ignoring connected signal in state {:?}",
                        self.id,
                        self.state().await
                    );
                }
            }
            RTCPeerConnectionState::Failed => {
                warn!("Session {} transport failed", self.id);
                self.set_state(SessionState::Failed).await;
                self.stop_stream().await;
            }
            RTCPeerConnectionState::Closed => {
                self.set_state(SessionState::Closed).await;
                self.stop_stream().await;
            }
            RTCPeerConnectionState::Disconnected => {
                warn!("Session {} disconnected, waiting for recovery", self.id);
            }
            other => {
                debug!("Session {} transport state {:?}", self.id, other);
            }
        }
    }

    async fn start_stream(&self) {
        let parts = self.stream.lock().await.take();
        let Some(StreamParts { source, encoder }) = parts else {
            debug!("Session {} stream already started", self.id);
            return;
        };
        let Some(shutdown_rx) = self.shutdown_rx.lock().await.take() else {
            return;
        };
        let handle = tokio::spawn(run_stream(
            self.id.clone(),
            self.video_track.clone(),
            source,
            encoder,
            shutdown_rx,
        ));
        *self.pump.lock().await = Some(handle);
    }

    async fn stop_stream(&self) {
        let _ = self.shutdown.try_send(());
        let _ = self.pump.lock().await.take();
    }
}

/// Capture, encode, and write frames until shutdown or a capture error.
async fn run_stream(
    session_id: String,
    track: Arc<TrackLocalStaticSample>,
    mut source: VideoSource,
    encoder: VideoEncoder,
    mut shutdown: mpsc::Receiver<()>,
) {
    info!("Session {} video stream started", session_id);
    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => {
                debug!("Session {} stream shutting down", session_id);
                break;
            }
            captured = source.next_frame() => {
                let frame = match captured {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!("Session {} capture stopped the stream: {}", session_id, e);
                        break;
                    }
                };
                let pts = frame.pts();
                match encoder.encode(frame).await {
                    Ok(payload) if payload.is_empty() => {
                        debug!("Session {} encoder produced no output at pts {}", session_id, pts);
                    }
                    Ok(payload) => {
                        let sample = Sample {
                            data: payload,
                            duration: Frame::duration(),
                            timestamp: SystemTime::now(),
                            ..Default::default()
                        };
                        if let Err(e) = track.write_sample(&sample).await {
                            warn!("Session {} sample write failed: {}", session_id, e);
                        }
                    }
                    Err(e) => {
                        warn!("Session {} frame encode failed at pts {}: {}", session_id, pts, e);
                    }
                }
            }
        }
    }
    info!("Session {} video stream stopped", session_id);
}
