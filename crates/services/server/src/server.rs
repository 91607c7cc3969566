//! HTTP server exposing signaling, command, and health endpoints
//!
//! - POST /webrtc/offer - Accept a viewer offer, return the answer
//! - POST /webrtc/ice - Accept a trickled ICE candidate
//! - POST /command - Execute a remote browser command
//! - GET /health - Browser driver probe

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;

use pagecast_core::{
    CommandDispatcher, CommandOutcome, CommandRequest, DriverSlot, Error, Result,
};
use pagecast_webrtc::{IceOutcome, SessionManager};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ServerState {
    /// Signaling session owner
    manager: Arc<SessionManager>,
    /// Remote command executor
    dispatcher: Arc<CommandDispatcher>,
    /// Driver slot probed by the health endpoint
    driver: DriverSlot,
}

impl ServerState {
    /// Bundle the service dependencies for the router.
    pub fn new(
        manager: Arc<SessionManager>,
        dispatcher: Arc<CommandDispatcher>,
        driver: DriverSlot,
    ) -> Self {
        Self {
            manager,
            dispatcher,
            driver,
        }
    }
}

/// HTTP server for signaling and remote control.
pub struct HttpServer {
    /// Server bind address
    bind_address: String,
    /// Origins allowed by the CORS layer
    cors_origins: Vec<String>,
    /// Shared server state
    state: ServerState,
}

impl HttpServer {
    /// Create a new HTTP server.
    ///
    /// # Arguments
    ///
    /// * `bind_address` - Address to bind to (e.g., "127.0.0.1:8000")
    /// * `cors_origins` - Frontend origins allowed to call the API
    /// * `state` - Shared session manager, dispatcher, and driver slot
    pub fn new(bind_address: String, cors_origins: Vec<String>, state: ServerState) -> Self {
        Self {
            bind_address,
            cors_origins,
            state,
        }
    }

    /// Build the router with all endpoints
    fn build_router(&self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/webrtc/offer", post(offer_handler))
            .route("/webrtc/ice", post(ice_handler))
            .route("/command", post(command_handler))
            .with_state(self.state.clone())
            .layer(
                tower::ServiceBuilder::new()
                    .layer(tower_http::trace::TraceLayer::new_for_http())
                    .layer(build_cors(&self.cors_origins)),
            )
    }

    /// Start the HTTP server and run until `shutdown` resolves.
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr: std::net::SocketAddr = self
            .bind_address
            .parse()
            .map_err(|e| Error::InvalidConfig(format!("Invalid bind address: {}", e)))?;

        tracing::info!("Starting HTTP server on {}", addr);

        let router = self.build_router();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Transport(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| Error::Transport(format!("Server error: {}", e)))?;

        Ok(())
    }
}

fn build_cors(origins: &[String]) -> tower_http::cors::CorsLayer {
    use tower_http::cors::{Any, CorsLayer};

    let mut allowed = Vec::new();
    for origin in origins {
        match origin.parse::<axum::http::HeaderValue>() {
            Ok(value) => allowed.push(value),
            Err(e) => warn!("Ignoring invalid CORS origin '{}': {}", origin, e),
        }
    }

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers([header::CONTENT_TYPE])
}

// Wire shapes

/// Session description received from or sent to the viewer.
#[derive(Debug, Serialize, Deserialize)]
struct SessionDescription {
    sdp: String,
    #[serde(rename = "type")]
    kind: String,
}

/// ICE candidate as browsers serialize it.
#[derive(Debug, Deserialize)]
struct IceCandidateRequest {
    candidate: String,
    #[serde(rename = "sdpMid")]
    sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex")]
    sdp_mline_index: Option<u16>,
    #[serde(rename = "usernameFragment")]
    username_fragment: Option<String>,
}

#[derive(Debug, Serialize)]
struct IceResponse {
    status: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
}

/// Error response for failed requests.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type/category
    pub error_type: String,
    /// Human-readable error message
    pub message: String,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn error_body(error_type: &str, message: impl Into<String>) -> Json<ErrorResponse> {
    Json(ErrorResponse {
        error_type: error_type.to_string(),
        message: message.into(),
    })
}

/// Map a service error to an HTTP status and body.
fn map_error(error: Error) -> HandlerError {
    let (status, error_type) = match &error {
        Error::InvalidConfig(_) => (StatusCode::BAD_REQUEST, "invalid_config"),
        Error::Negotiation(_) => (StatusCode::BAD_REQUEST, "negotiation"),
        Error::Ice(_) => (StatusCode::BAD_REQUEST, "ice"),
        Error::DriverUnavailable | Error::Launch(_) => (StatusCode::SERVICE_UNAVAILABLE, "driver"),
        Error::FrameCapture(_) => (StatusCode::INTERNAL_SERVER_ERROR, "frame_capture"),
        Error::Command(_) => (StatusCode::INTERNAL_SERVER_ERROR, "command"),
        Error::Navigation(_) => (StatusCode::INTERNAL_SERVER_ERROR, "navigation"),
        Error::Encoding(_) => (StatusCode::INTERNAL_SERVER_ERROR, "encoding"),
        Error::Transport(_) => (StatusCode::INTERNAL_SERVER_ERROR, "transport"),
        Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io"),
        Error::Other(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    };
    (status, error_body(error_type, error.to_string()))
}

// Handler implementations

/// Accept a viewer offer and answer it.
async fn offer_handler(
    State(state): State<ServerState>,
    Json(request): Json<SessionDescription>,
) -> std::result::Result<Json<SessionDescription>, HandlerError> {
    if !request.kind.eq_ignore_ascii_case("offer") {
        return Err((
            StatusCode::BAD_REQUEST,
            error_body(
                "invalid_request",
                format!("expected type \"offer\", got \"{}\"", request.kind),
            ),
        ));
    }

    let answer = state
        .manager
        .submit_offer(request.sdp)
        .await
        .map_err(map_error)?;

    Ok(Json(SessionDescription {
        sdp: answer,
        kind: "answer".to_string(),
    }))
}

/// Route a trickled ICE candidate to the active session.
async fn ice_handler(
    State(state): State<ServerState>,
    Json(request): Json<IceCandidateRequest>,
) -> std::result::Result<Json<IceResponse>, HandlerError> {
    let candidate = RTCIceCandidateInit {
        candidate: request.candidate,
        sdp_mid: request.sdp_mid,
        sdp_mline_index: request.sdp_mline_index,
        username_fragment: request.username_fragment,
    };

    let status = match state
        .manager
        .add_ice_candidate(candidate)
        .await
        .map_err(map_error)?
    {
        IceOutcome::Accepted => "ok",
        IceOutcome::NoSession => "no peer connection",
    };

    Ok(Json(IceResponse {
        status: status.to_string(),
    }))
}

/// Execute a remote browser command.
async fn command_handler(
    State(state): State<ServerState>,
    Json(request): Json<CommandRequest>,
) -> std::result::Result<Json<serde_json::Value>, HandlerError> {
    let outcome = state
        .dispatcher
        .execute(&request)
        .await
        .map_err(map_error)?;

    let body = match outcome {
        CommandOutcome::Completed(result) => serde_json::json!({ "result": result }),
        CommandOutcome::UnknownCommand => serde_json::json!({ "error": "Unknown command" }),
    };
    Ok(Json(body))
}

/// Probe the browser driver.
async fn health_handler(
    State(state): State<ServerState>,
) -> std::result::Result<Json<HealthResponse>, HandlerError> {
    let probe = async {
        let driver = state.driver.get().await?;
        driver.capture_surface().await?;
        Ok::<(), Error>(())
    };

    if let Err(e) = probe.await {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            error_body("driver", e.to_string()),
        ));
    }

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
    }))
}
