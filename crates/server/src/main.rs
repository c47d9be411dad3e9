//! shellcache proxy entry point.
//!
//! Boots the offline-first worker in front of the configured origin and serves
//! it over HTTP. Logs are JSON on stderr.

use std::sync::Arc;

use anyhow::{Context, Result};
use shellcache_core::{AppConfig, CacheStorage};
use shellcache_worker::{FetchClient, FetchConfig, Network, Registration, Worker, WorkerConfig};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(version = %config.version, origin = %config.origin, "starting shellcache");

    let storage = CacheStorage::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache database {}", config.db_path.display()))?;
    let network: Arc<dyn Network> = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let worker_config = Arc::new(WorkerConfig::from_app_config(&config)?);
    let origin = worker_config.origin.clone();

    let registration = Arc::new(Registration::new());
    let worker = Arc::new(Worker::new(worker_config, storage, network.clone()));
    match registration.boot(worker).await {
        Ok(state) => tracing::info!(version = %config.version, %state, "worker ready"),
        Err(e) => {
            // Whatever version was restored keeps serving; without one, requests pass through.
            let serving = registration.active_version().await;
            tracing::error!(error = %e, code = e.code(), ?serving, "worker install failed");
        }
    }

    let state = handler::ProxyState {
        registration,
        network,
        origin,
        max_body_bytes: config.max_bytes,
        allow_forward: config.allow_forward,
    };

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "listening");

    axum::serve(listener, handler::router(state)).await?;

    Ok(())
}
