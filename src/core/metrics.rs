// src/core/metrics.rs

//! Defines and registers Prometheus metrics for server monitoring.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only once
//! globally for the entire application lifecycle.

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, Histogram, TextEncoder, register_counter, register_counter_vec,
    register_gauge, register_histogram,
};

lazy_static! {
    // --- Connection Gauges and Counters ---
    /// The number of clients currently connected to the server.
    pub static ref CONNECTED_CLIENTS: Gauge =
        register_gauge!("watergate_connected_clients", "Number of currently connected clients.").unwrap();
    /// The total number of connections accepted by the server since startup.
    pub static ref CONNECTIONS_RECEIVED_TOTAL: Counter =
        register_counter!("watergate_connections_received_total", "Total number of connections received.").unwrap();

    // --- Record Counters ---
    /// Processed lines, labeled by outcome (accepted or the error kind).
    pub static ref RECORDS_TOTAL: CounterVec =
        register_counter_vec!("watergate_records_total", "Total number of processed lines, labeled by outcome.", &["outcome"]).unwrap();

    // --- Pool Gauges ---
    /// Sink connections currently open.
    pub static ref POOL_SIZE: Gauge =
        register_gauge!("watergate_pool_size", "Number of open sink connections.").unwrap();
    /// Sink connections idle in the pool.
    pub static ref POOL_AVAILABLE: Gauge =
        register_gauge!("watergate_pool_available", "Number of idle sink connections.").unwrap();
    /// Callers waiting for a pool lease.
    pub static ref POOL_WAITING: Gauge =
        register_gauge!("watergate_pool_waiting", "Number of callers waiting for a sink connection.").unwrap();

    // --- Histograms ---
    /// Time spent executing one insert while holding a lease.
    pub static ref INSERT_LATENCY_SECONDS: Histogram =
        register_histogram!("watergate_insert_latency_seconds", "Latency of sink inserts in seconds.").unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_else(|e| format!("# failed to encode metrics: {e}\n"))
}
