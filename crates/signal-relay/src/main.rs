//! Signal Relay
//!
//! WebSocket signaling relay for browser peer connections.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize Prometheus metrics recorder
//! 3. Create the hub
//! 4. Bind the HTTP listener (fail fast on bind errors) and mark ready
//! 5. Serve until Ctrl+C / SIGTERM
//!
//! # Shutdown Flow
//!
//! 1. Mark not ready
//! 2. Close every session (peers receive `user-left`) and stop every room
//! 3. Let in-flight HTTP requests drain

#![warn(clippy::pedantic)]

use std::net::SocketAddr;
use std::sync::Arc;

use signal_relay::config::Config;
use signal_relay::observability::{init_metrics_recorder, HealthState};
use signal_relay::routes::{self, AppState};
use signal_relay::signaling::Hub;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signal_relay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Signal Relay");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        static_dir = %config.static_dir,
        default_room_id = %config.default_room_id,
        pong_wait_seconds = config.pong_wait_seconds,
        write_wait_seconds = config.write_wait_seconds,
        max_message_size = config.max_message_size,
        "Configuration loaded successfully"
    );

    // Must happen before any metrics are recorded
    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;

    let hub = Arc::new(Hub::new(config.room_queue_capacity));
    let health_state = Arc::new(HealthState::new());

    let bind_addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.bind_address, "Invalid bind address");
        format!("Invalid bind address: {e}")
    })?;

    let state = Arc::new(AppState {
        hub: Arc::clone(&hub),
        config,
        health: Arc::clone(&health_state),
    });
    let app = routes::build_routes(state, Some(prometheus_handle));

    // Bind before serving to fail fast on bind errors
    let listener = tokio::net::TcpListener::bind(bind_addr).await.map_err(|e| {
        error!(error = %e, addr = %bind_addr, "Failed to bind listener");
        format!("Failed to bind to {bind_addr}: {e}")
    })?;
    health_state.set_ready();
    info!(addr = %bind_addr, "Signal Relay listening");

    let shutdown_health = Arc::clone(&health_state);
    let shutdown_hub = Arc::clone(&hub);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, draining sessions");
        shutdown_health.set_not_ready();
        shutdown_hub.shutdown().await;
    })
    .await
    .map_err(|e| {
        error!(error = %e, "Server failed");
        e
    })?;

    info!("Signal Relay shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. Without them the relay
/// cannot shut down gracefully.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
