//! offcache proxy entry point.
//!
//! Boots the intercepting proxy: loads configuration, registers the
//! configured controller version (install, activate, claim), then serves
//! page traffic through it. Logs go to stderr as JSON.

use std::sync::Arc;

use anyhow::Result;
use offcache_client::{ControllerSettings, FetchClient, FetchConfig, Registration};
use offcache_core::{AppConfig, CacheDb};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod control;
mod error;
mod proxy;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let settings = ControllerSettings::from_config(&config)?;

    let db = CacheDb::open(&config.db_path).await?;
    let fetcher = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let registration = Arc::new(Registration::new(db, fetcher));

    let report = registration.register(settings.clone()).await?;
    tracing::info!(
        store = %report.install.store,
        cached = report.install.cached.len(),
        failed = report.install.failed.len(),
        purged = report.activate.purged.len(),
        "controller registered"
    );

    let app = proxy::router(proxy::AppState::new(Arc::clone(&registration), settings, config.max_bytes));
    let listener = TcpListener::bind(&config.listen_addr).await?;

    tracing::info!(addr = %config.listen_addr, origin = %config.origin, "Starting offcache proxy");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(controller) = registration.active().await {
        controller.settle().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}
