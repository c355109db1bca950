// src/core/mod.rs

//! The central module containing the ingestion logic: records, wire protocol,
//! sinks and metrics.

pub mod errors;
pub mod metrics;
pub mod protocol;
pub mod record;
pub mod sink;

pub use errors::{IngestError, ValidationError};
pub use record::Record;
