//! Pagecast server binary entry point
//!
//! Launches a headless browser, then serves WebRTC signaling, remote
//! commands, and a health probe over HTTP.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (127.0.0.1:8000, 1280x720, google.com start page)
//! cargo run -p pagecast-server
//!
//! # Custom viewport and allow-list
//! cargo run -p pagecast-server -- \
//!   --width 1920 --height 1080 \
//!   --allow-domain google.com,github.com,wikipedia.org
//!
//! # Inside a container
//! cargo run -p pagecast-server -- --no-sandbox --bind 0.0.0.0:8000
//! ```

use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pagecast_browser::{CdpDriver, LaunchConfig};
use pagecast_core::{AllowListPolicy, CommandDispatcher, DriverSlot};
use pagecast_server::{HttpServer, ServerState};
use pagecast_webrtc::{SessionManager, WebRtcConfig};

/// Pagecast remote browser server
///
/// Streams a headless browser as 30 fps H.264 video over WebRTC and
/// executes remote click/type/scroll commands against the live page.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// HTTP bind address
    #[arg(long, default_value = "127.0.0.1:8000", env = "PAGECAST_BIND")]
    bind: String,

    /// Page to open after the browser launches
    #[arg(
        long,
        default_value = "https://www.google.com",
        env = "PAGECAST_START_URL"
    )]
    start_url: String,

    /// Viewport width in pixels
    #[arg(long, default_value_t = 1280, env = "PAGECAST_WIDTH")]
    width: u32,

    /// Viewport height in pixels
    #[arg(long, default_value_t = 720, env = "PAGECAST_HEIGHT")]
    height: u32,

    /// Domains remote clicks may navigate to, subdomains included
    /// (comma-separated)
    #[arg(
        long = "allow-domain",
        value_delimiter = ',',
        default_value = "google.com,github.com",
        env = "PAGECAST_ALLOW_DOMAINS"
    )]
    allow_domains: Vec<String>,

    /// Frontend origins allowed to call the API (comma-separated)
    #[arg(
        long = "cors-origin",
        value_delimiter = ',',
        default_value = "http://localhost:3000",
        env = "PAGECAST_CORS_ORIGIN"
    )]
    cors_origins: Vec<String>,

    /// Launch the browser with sandboxing disabled (needed in most containers)
    #[arg(long, default_value_t = false, env = "PAGECAST_NO_SANDBOX")]
    no_sandbox: bool,

    /// STUN servers (comma-separated)
    #[arg(
        long = "stun",
        value_delimiter = ',',
        default_value = "stun:stun.l.google.com:19302",
        env = "PAGECAST_STUN"
    )]
    stun_servers: Vec<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get())
        .thread_name("pagecast")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        bind = %args.bind,
        "Pagecast server starting"
    );

    let launch = LaunchConfig::new()
        .with_window_size(args.width, args.height)
        .with_start_url(&args.start_url)
        .with_no_sandbox(args.no_sandbox);
    launch.validate()?;

    let webrtc_config = WebRtcConfig::default().with_stun_servers(args.stun_servers.clone());
    webrtc_config.validate()?;

    let driver_slot = DriverSlot::empty();

    // The server comes up even when the browser does not; the health
    // endpoint keeps reporting the outage until a driver is installed.
    let browser = match CdpDriver::launch(&launch).await {
        Ok(driver) => {
            driver_slot.install(driver.clone()).await;
            info!("Browser driver ready");
            Some(driver)
        }
        Err(e) => {
            warn!("Browser launch failed, starting without a driver: {}", e);
            None
        }
    };

    let manager = Arc::new(SessionManager::new(driver_slot.clone(), webrtc_config));
    let policy = AllowListPolicy::new(args.allow_domains.clone());
    let dispatcher = Arc::new(CommandDispatcher::new(driver_slot.clone(), policy));

    info!(
        viewport = %format!("{}x{}", args.width, args.height),
        allow_domains = ?args.allow_domains,
        "Control plane configured"
    );

    let state = ServerState::new(manager.clone(), dispatcher, driver_slot);
    let server = HttpServer::new(args.bind, args.cors_origins, state);
    server.serve(shutdown_signal()).await?;

    if let Err(e) = manager.close_active().await {
        warn!("Failed to close the active session: {}", e);
    }
    if let Some(driver) = browser {
        driver.close().await;
    }

    info!("Pagecast server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

fn init_tracing() {
    // Initialize tracing with EnvFilter for RUST_LOG support
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
