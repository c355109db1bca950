// src/server/initialization.rs

//! Handles server initialization: opening the sink pool and binding the listener.

use super::context::ServerContext;
use super::listener::Listener;
use crate::config::Config;
use crate::core::sink::{ConnectionPool, IngestSink};
use anyhow::{Context, Result};
use tracing::{debug, info};

/// Opens the connection pool, then binds the listener.
///
/// The pool comes first so no connection is accepted before the backend is reachable.
pub async fn setup<S: IngestSink>(config: &Config, sink: S) -> Result<ServerContext<S>> {
    log_startup_info(config);

    let pool = ConnectionPool::open(sink, &config.pool)
        .await
        .context("Failed to open the sink connection pool")?;

    let listener = Listener::bind(
        (config.app.host.as_str(), config.app.port),
        pool.clone(),
        config.max_line_bytes,
    )
    .await
    .with_context(|| {
        format!(
            "Failed to bind listener on {}:{}",
            config.app.host, config.app.port
        )
    })?;
    info!("Watergate listening on {}", listener.local_addr()?);

    Ok(ServerContext { pool, listener })
}

/// Logs key configuration parameters at startup.
fn log_startup_info(config: &Config) {
    info!(
        "Using {:?} backend with pool min_size={}, max_size={}, lease timeout={:?}.",
        config.database.backend, config.pool.min_size, config.pool.max_size, config.pool.timeout
    );
    if let Ok(effective) = toml::to_string(config) {
        debug!("Effective configuration:\n{}", effective);
    }
}
