// src/core/sink/mod.rs

//! Durable storage for normalized records.
//!
//! A backend is described by two traits: [`IngestSink`] opens connections and
//! [`SinkConnection`] performs one insert per record. Connections are never used
//! directly by the protocol loop; they are leased from a [`ConnectionPool`].

use crate::core::errors::IngestError;
use crate::core::record::Record;
use async_trait::async_trait;

pub mod memory;
pub mod pool;
pub mod postgres;

pub use memory::MemorySink;
pub use pool::{ConnectionPool, PoolStatus};
pub use postgres::PostgresSink;

/// A factory for backend connections.
#[async_trait]
pub trait IngestSink: Send + Sync + 'static {
    type Connection: SinkConnection;

    /// Opens a new connection to the backend.
    async fn connect(&self) -> Result<Self::Connection, IngestError>;
}

/// A single live connection to the backend.
#[async_trait]
pub trait SinkConnection: Send + 'static {
    /// Stores one record. Exactly one attempt is made.
    async fn insert(&mut self, record: &Record) -> Result<(), IngestError>;

    /// Returns true if the connection can no longer be used and must be replaced.
    fn is_closed(&self) -> bool {
        false
    }
}
