// src/core/sink/memory.rs

//! An in-process sink that keeps records in memory.
//!
//! Used for the `memory` backend (dry runs without a database) and by the test
//! suite, which relies on the knobs for insert latency and forced rejections.

use super::{IngestSink, SinkConnection};
use crate::core::errors::IngestError;
use crate::core::record::Record;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Default)]
struct MemoryStore {
    records: Mutex<Vec<Record>>,
    connects: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

/// Clones share the same store, so a handle kept outside the pool observes every
/// insert made through it.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    store: Arc<MemoryStore>,
    insert_delay: Option<Duration>,
    rejected_event_type: Option<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every insert take at least `delay`.
    pub fn with_insert_delay(mut self, delay: Duration) -> Self {
        self.insert_delay = Some(delay);
        self
    }

    /// Makes the sink refuse records whose `event_type` equals `event_type`.
    pub fn rejecting(mut self, event_type: impl Into<String>) -> Self {
        self.rejected_event_type = Some(event_type.into());
        self
    }

    /// All records stored so far, in insertion order.
    pub fn records(&self) -> Vec<Record> {
        self.store.records.lock().clone()
    }

    /// Number of connections opened against this sink.
    pub fn connects(&self) -> usize {
        self.store.connects.load(Ordering::SeqCst)
    }

    /// Highest number of inserts that were running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.store.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IngestSink for MemorySink {
    type Connection = MemoryConnection;

    async fn connect(&self) -> Result<Self::Connection, IngestError> {
        let id = self.store.connects.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Memory sink connection #{} opened.", id);
        Ok(MemoryConnection {
            id,
            sink: self.clone(),
        })
    }
}

#[derive(Debug)]
pub struct MemoryConnection {
    id: usize,
    sink: MemorySink,
}

#[async_trait]
impl SinkConnection for MemoryConnection {
    async fn insert(&mut self, record: &Record) -> Result<(), IngestError> {
        let store = &self.sink.store;
        let running = store.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        store.peak_in_flight.fetch_max(running, Ordering::SeqCst);

        if let Some(delay) = self.sink.insert_delay {
            tokio::time::sleep(delay).await;
        }

        let result = match &self.sink.rejected_event_type {
            Some(rejected) if rejected == record.event_type() => Err(IngestError::Persistence(
                format!("insert rejected for event_type '{rejected}'"),
            )),
            _ => {
                store.records.lock().push(record.clone());
                debug!(
                    "Memory sink connection #{} stored {}",
                    self.id,
                    serde_json::to_string(record).unwrap_or_default()
                );
                Ok(())
            }
        };

        store.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
