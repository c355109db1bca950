// src/core/errors.rs

//! Defines the primary error type for the ingestion engine.

use std::sync::Arc;
use thiserror::Error;

/// Reasons a decoded JSON value is refused by the record normalizer.
///
/// The display text is sent verbatim to the client after `ERROR: `.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("expected an object")]
    NotAnObject,

    #[error("event_type must be a non-empty string")]
    InvalidEventType,

    #[error("user_id must be a non-empty string")]
    InvalidUserId,

    #[error("props must be an object")]
    InvalidProps,
}

/// The main error enum, representing all possible failures within the server.
///
/// `Protocol`, `Validation` and `Persistence` are local to one line and are reported
/// back to the client. `Io` and `LineTooLong` end the connection they occur on.
#[derive(Error, Debug, Clone)]
pub enum IngestError {
    /// The line could not be decoded as JSON.
    #[error("{0}")]
    Protocol(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Lease timeout, closed pool or backend rejection.
    #[error("{0}")]
    Persistence(String),

    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("line exceeds the maximum length of {0} bytes")]
    LineTooLong(usize),
}

impl IngestError {
    /// Returns true if the error must terminate the connection it occurred on.
    pub fn is_fatal(&self) -> bool {
        matches!(self, IngestError::Io(_) | IngestError::LineTooLong(_))
    }

    /// Short label used for the `outcome` metric dimension.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            IngestError::Protocol(_) => "protocol_error",
            IngestError::Validation(_) => "validation_error",
            IngestError::Persistence(_) => "persistence_error",
            IngestError::Io(_) | IngestError::LineTooLong(_) => "transport_error",
        }
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for IngestError {
    fn from(e: std::io::Error) -> Self {
        IngestError::Io(Arc::new(e))
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(e: serde_json::Error) -> Self {
        IngestError::Protocol(e.to_string())
    }
}

impl From<tokio_postgres::Error> for IngestError {
    fn from(e: tokio_postgres::Error) -> Self {
        // The bare display of a server-side error is just "db error"; surface the
        // message the backend actually sent.
        match e.as_db_error() {
            Some(db) => IngestError::Persistence(db.message().to_string()),
            None => IngestError::Persistence(e.to_string()),
        }
    }
}
