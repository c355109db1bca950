// src/connection/guard.rs

//! Defines `ConnectionGuard`, an RAII guard for connection accounting.

use crate::core::metrics;
use std::net::SocketAddr;
use tracing::debug;

/// Keeps the connected-clients gauge in step with live handlers, however a
/// handler's scope is exited.
pub struct ConnectionGuard {
    addr: SocketAddr,
}

impl ConnectionGuard {
    pub(crate) fn new(addr: SocketAddr) -> Self {
        metrics::CONNECTED_CLIENTS.inc();
        Self { addr }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        metrics::CONNECTED_CLIENTS.dec();
        debug!("Connection {} closed, released its resources.", self.addr);
    }
}
