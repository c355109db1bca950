// src/server/context.rs

use super::listener::Listener;
use crate::core::sink::{ConnectionPool, IngestSink};

/// Holds all the initialized state required to run the server's main loop.
pub struct ServerContext<S: IngestSink> {
    pub pool: ConnectionPool<S>,
    pub listener: Listener<S>,
}
