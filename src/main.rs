//! Skyward - a weather and satellite monitoring core for one location.
//!
//! Starts one refresh task per feed and serves the read-only query surface
//! over HTTP. Configuration comes from `SKYWARD_*` environment variables
//! (see [`skyward::config`]); a `.env` file is honoured if present.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use skyward::api::{self, AppState};
use skyward::config::Config;
use skyward::monitor::Monitor;
use skyward::scheduler::Scheduler;
use skyward::sources::{HimawariClient, OpenMeteoClient, Sources};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing with environment filter
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("skyward=info".parse()?))
        .init();

    // Misconfiguration is the only fatal error
    let config = Config::from_env()?;

    info!(
        location = %config.location,
        locus = %config.locus,
        port = config.port,
        interval_secs = config.schedule.base_interval.as_secs(),
        "Starting Skyward"
    );

    let http = reqwest::Client::builder()
        .timeout(config.schedule.request_timeout)
        .user_agent(concat!("skyward/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let sources = Sources::new(
        Arc::new(OpenMeteoClient::with_client(&config.open_meteo_url, http.clone())),
        Arc::new(HimawariClient::with_client(&config.himawari_url, http)),
    );

    let port = config.port;
    let monitor = Monitor::shared(config);
    let scheduler = Scheduler::new(Arc::clone(&monitor), sources);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let tasks = scheduler.spawn(shutdown_rx);
    info!(feeds = tasks.len(), "Refresh tasks started");

    let app = api::router(AppState { monitor }).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "Skyward is listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown requested");
        })
        .await?;

    shutdown_tx.send(true).ok();
    for task in tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "Refresh task ended abnormally");
        }
    }

    info!("Skyward stopped");
    Ok(())
}
