//! Hook Relay server.
//!
//! Serves the capture gateway on `PORT`, tries once to expose it publicly,
//! provisions a startup webhook and tears the tunnel down on SIGINT/SIGTERM.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hookrelay::web::expose_and_seed;
use hookrelay::{router, AppState, Config, Exposure, Registry, TunnelClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("relay_starting");

    // Load configuration
    let config = Config::from_env();
    let tunnel = TunnelClient::from_config(&config);
    info!(
        port = config.port,
        tunnel_configured = tunnel.is_configured(),
        tunnel_api_url = %config.tunnel_api_url,
        public_url = ?config.public_url,
        trust_proxy = config.trust_proxy,
        "config_loaded"
    );

    let state = AppState::new(config.clone(), Registry::new(), Exposure::new());

    let app = router(state.clone());

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, local_url = %config.local_url(), "relay_listening");

    // Exposure runs beside the server so local traffic is served immediately
    let seed = {
        let state = state.clone();
        let tunnel = tunnel.clone();
        tokio::spawn(async move {
            expose_and_seed(&state, &tunnel).await;
        })
    };

    // Run server with graceful shutdown
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    seed.abort();

    // Close the public tunnel
    tunnel.close().await;

    info!("relay_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
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
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("relay_shutting_down");
}
