// src/server/metrics_server.rs

use crate::core::metrics::{self, gather_metrics};
use crate::core::sink::{ConnectionPool, IngestSink};
use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};
use std::net::SocketAddr;
use tokio::sync::broadcast;
use tracing::{error, info};

/// Handles HTTP requests to the /metrics endpoint.
///
/// Pool gauges are sampled on every scrape before all registered metrics are encoded.
async fn metrics_handler<S: IngestSink>(pool: ConnectionPool<S>) -> impl IntoResponse {
    let status = pool.status();
    metrics::POOL_SIZE.set(status.size as f64);
    metrics::POOL_AVAILABLE.set(status.available as f64);
    metrics::POOL_WAITING.set(status.waiting as f64);

    let body = gather_metrics();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        body,
    )
}

/// Runs a simple HTTP server to expose Prometheus metrics on /metrics.
pub async fn run_metrics_server<S: IngestSink>(
    pool: ConnectionPool<S>,
    port: u16,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let app = Router::new().route("/metrics", get(move || metrics_handler(pool.clone())));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind metrics server on port {}: {}", port, e);
            return;
        }
    };
    info!(
        "Prometheus metrics server listening on http://{}/metrics",
        addr
    );

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_rx.recv().await.ok();
            info!("Metrics server shutting down.");
        })
        .await;
    if let Err(e) = result {
        error!("Metrics server failed: {}", e);
    }
}
