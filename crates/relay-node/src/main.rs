//! # Relay Node
//!
//! Serves `GET /` by relaying each request to the responder over the
//! in-memory bus and returning its reply.

use anyhow::{Context, Result};
use relay_node::{facade, NodeConfig, NodeRuntime};
use relay_telemetry::{init_logging, TelemetryConfig};
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(&TelemetryConfig::from_env())?;

    let config = NodeConfig::from_env();
    let bind_addr = config.http.bind_addr;

    let mut runtime = NodeRuntime::new(config)?;
    runtime.start().await?;

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!(addr = %bind_addr, "HTTP facade listening. Press Ctrl+C to stop.");

    axum::serve(listener, facade::router(runtime.facade_state()))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    runtime.shutdown().await?;
    info!("Relay node stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Ctrl+C received, shutting down"),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
    }
}
