// src/server/mod.rs

use crate::config::{Backend, Config};
use crate::core::sink::{IngestSink, MemorySink, PostgresSink};
use anyhow::Result;
use tracing::{info, warn};

mod context;
mod initialization;
mod listener;
mod metrics_server;
mod shutdown;

pub use listener::{Listener, StopHandle};

/// The main server startup function, orchestrating all setup phases.
pub async fn run(config: Config) -> Result<()> {
    match config.database.backend {
        Backend::Postgres => {
            let sink = PostgresSink::new(&config.database);
            if let Some(path) = &config.database.migrations {
                sink.apply_migrations(path).await?;
            }
            serve(config, sink).await
        }
        Backend::Memory => {
            warn!("Memory backend selected: records are not persisted beyond this process.");
            serve(config, MemorySink::new()).await
        }
    }
}

/// Runs the listener until a termination signal arrives, then closes the pool.
///
/// Connection handlers still running at that point are not awaited. Their later
/// inserts fail with a closed-pool error until the process exits.
async fn serve<S: IngestSink>(config: Config, sink: S) -> Result<()> {
    // 1. Open the pool and bind the listening socket.
    let ctx = initialization::setup(&config, sink).await?;
    let stop = ctx.listener.stop_handle();

    // 2. Route termination signals to the listener.
    shutdown::install(stop.clone())?;

    // 3. Optional metrics exporter, stopped together with the listener.
    if config.metrics.enabled {
        tokio::spawn(metrics_server::run_metrics_server(
            ctx.pool.clone(),
            config.metrics.port,
            stop.subscribe(),
        ));
    } else {
        info!("Prometheus metrics server is disabled in the configuration.");
    }

    // 4. Accept connections until stopped.
    ctx.listener.run().await;

    info!("Closing the sink connection pool.");
    ctx.pool.close();
    info!("Server shutdown complete.");
    Ok(())
}
