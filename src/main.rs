//! TokenDesk entrypoint
//!
//! Wires configuration, the cache-aside aggregator, the polling
//! scheduler, and the HTTP/WebSocket surface together.

use anyhow::Context;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use tokendesk::api::{create_router, AppState, WsBroadcaster};
use tokendesk::cache::CacheStore;
use tokendesk::config::AppConfig;
use tokendesk::scheduler::spawn_poller;
use tokendesk::service::AggregatorService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = AppConfig::load()?;
    tracing::info!(config = %cfg.digest(), "Starting TokenDesk");

    let cache = CacheStore::from_config(&cfg.cache);
    let service = AggregatorService::from_config(&cfg, cache);
    let ws = WsBroadcaster::default();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = spawn_poller(
        service.clone(),
        ws.clone(),
        Duration::from_millis(cfg.poller.interval_ms),
        shutdown_rx,
    );

    let app = create_router(AppState { service, ws });
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.server.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind HTTP listener")?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await
        .context("HTTP server failed")?;

    // Stop scheduling further ticks and let the in-flight one finish.
    let _ = shutdown_tx.send(true);
    let _ = poller.await;

    Ok(())
}
