// src/core/sink/pool.rs

//! A bounded pool of sink connections shared by every connection handler.

use super::{IngestSink, SinkConnection};
use crate::config::PoolConfig;
use crate::core::errors::IngestError;
use crate::core::metrics;
use crate::core::record::Record;
use deadpool::Runtime;
use deadpool::managed::{self, Metrics, PoolError, RecycleError, RecycleResult};
use futures::future::try_join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Adapts an [`IngestSink`] to deadpool's manager interface.
pub struct SinkManager<S: IngestSink> {
    sink: Arc<S>,
}

impl<S: IngestSink> managed::Manager for SinkManager<S> {
    type Type = S::Connection;
    type Error = IngestError;

    async fn create(&self) -> Result<Self::Type, Self::Error> {
        debug!("Opening a new sink connection.");
        self.sink.connect().await
    }

    async fn recycle(&self, conn: &mut Self::Type, _: &Metrics) -> RecycleResult<Self::Error> {
        if conn.is_closed() {
            debug!("Discarding a closed sink connection.");
            return Err(RecycleError::Message("sink connection is closed".into()));
        }
        Ok(())
    }
}

/// A snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub max_size: usize,
    /// Connections currently open, leased or idle.
    pub size: usize,
    /// Idle connections ready to be leased.
    pub available: usize,
    /// Callers waiting for a lease.
    pub waiting: usize,
}

/// Hands out scoped leases on sink connections.
///
/// At most `max_size` connections exist at once and a caller waits at most `timeout`
/// for one. Each lease covers a single insert and is returned to the pool as soon as
/// that insert finishes, successfully or not.
///
/// `min_size` only applies at [`ConnectionPool::open`]. A connection that reports itself
/// closed after an insert is removed from the pool right away and is not replaced until a
/// later lease needs it, so an idle pool may hold fewer than `min_size` connections.
pub struct ConnectionPool<S: IngestSink> {
    inner: managed::Pool<SinkManager<S>>,
    timeout: Duration,
}

impl<S: IngestSink> Clone for ConnectionPool<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            timeout: self.timeout,
        }
    }
}

impl<S: IngestSink> ConnectionPool<S> {
    /// Builds the pool and eagerly opens `min_size` connections.
    ///
    /// Fails if any of the initial connections cannot be established.
    pub async fn open(sink: S, config: &PoolConfig) -> Result<Self, IngestError> {
        let manager = SinkManager {
            sink: Arc::new(sink),
        };
        let inner = managed::Pool::builder(manager)
            .max_size(config.max_size)
            .wait_timeout(Some(config.timeout))
            .create_timeout(Some(config.timeout))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| IngestError::Persistence(format!("failed to build pool: {e}")))?;

        let pool = Self {
            inner,
            timeout: config.timeout,
        };

        // Leasing `min_size` connections at once forces them all to be created;
        // dropping the leases parks them as idle.
        let warm = try_join_all((0..config.min_size).map(|_| pool.lease())).await?;
        drop(warm);

        info!(
            "Connection pool opened (min_size={}, max_size={}, timeout={:?}).",
            config.min_size, config.max_size, config.timeout
        );
        Ok(pool)
    }

    /// Leases a connection, runs one insert and releases the lease.
    pub async fn insert(&self, record: &Record) -> Result<(), IngestError> {
        let mut conn = self.lease().await?;
        let _timer = metrics::INSERT_LATENCY_SECONDS.start_timer();
        let result = conn.insert(record).await;
        if conn.is_closed() {
            debug!("Sink connection closed during insert, removing it from the pool.");
            drop(managed::Object::take(conn));
        }
        result
    }

    /// Acquires a connection within `timeout`.
    ///
    /// The bound covers the whole acquisition: waiting for a free slot, discarding
    /// broken idle connections and opening a new one.
    async fn lease(&self) -> Result<managed::Object<SinkManager<S>>, IngestError> {
        let result = match tokio::time::timeout(self.timeout, self.inner.get()).await {
            Ok(result) => result,
            Err(_) => return Err(self.lease_timeout()),
        };
        result.map_err(|e| match e {
            PoolError::Timeout(_) => self.lease_timeout(),
            PoolError::Closed => IngestError::Persistence("pool is closed".to_string()),
            PoolError::Backend(e) => e,
            other => IngestError::Persistence(other.to_string()),
        })
    }

    fn lease_timeout(&self) -> IngestError {
        IngestError::Persistence(format!(
            "couldn't get a connection after {:.2} sec",
            self.timeout.as_secs_f64()
        ))
    }

    pub fn status(&self) -> PoolStatus {
        let status = self.inner.status();
        PoolStatus {
            max_size: status.max_size,
            size: status.size,
            available: status.available,
            waiting: status.waiting,
        }
    }

    /// Closes the pool. Pending and future leases fail; idle connections are dropped.
    pub fn close(&self) {
        self.inner.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}
