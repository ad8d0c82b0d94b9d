//! Fleet Ship - HTTP front-end for fleet
//!
//! This is the main entry point for the gateway service. It connects to the
//! fleet API, starts the swap orchestrator and serves the HTTP API until
//! interrupted. Swaps still running at shutdown are cancelled.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fleet_ship_client::connect;
use fleet_ship_control::Dispatcher;
use fleet_ship_gateway::{create_router, Args, GatewayState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,fleet_ship=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Fleet Ship");

    let (gateway_config, control_config) = Args::parse().into_configs();

    tracing::info!(
        listen_addr = %gateway_config.listen_addr,
        fleet_endpoint = %gateway_config.fleet_endpoint,
        basic_auth = gateway_config.basic_auth.is_some(),
        poll_interval_ms = control_config.poll_interval_ms,
        step_timeout_seconds = ?control_config.step_timeout_seconds,
        max_concurrent_swaps = control_config.max_concurrent_swaps,
        empty_match = ?control_config.empty_match,
        "Configuration loaded"
    );

    let fleet = match connect(
        &gateway_config.fleet_endpoint,
        &gateway_config.transport_options(),
    ) {
        Ok(fleet) => Arc::new(fleet),
        Err(e) => {
            tracing::error!(error = %e, "Cannot reach fleet");
            return Err(e.into());
        }
    };
    tracing::info!(endpoint = %fleet.endpoint().address(), "Fleet client initialized");

    let dispatcher = Arc::new(Dispatcher::new(fleet, control_config));

    let listen_addr = gateway_config.listen_addr.clone();
    let app = create_router(GatewayState::new(Arc::clone(&dispatcher), gateway_config));

    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    dispatcher.shutdown();
    tracing::info!("Fleet Ship stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
