//! Gateway service binary.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use biogate_api::{AppState, create_router};
use biogate_core::config::GatewayConfig;
use biogate_gateway::Gateway;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = GatewayConfig::from_env();
    tracing::info!(
        device = %format!("{}:{}", config.device_host, config.device_port),
        listen = %config.listen_addr,
        "starting biogate"
    );

    let gateway = Arc::new(Gateway::new(config.clone()));
    gateway.start().await;

    let router = create_router(AppState {
        gateway: gateway.clone(),
    });
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    gateway.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
    }
}
