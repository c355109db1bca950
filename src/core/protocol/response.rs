// src/core/protocol/response.rs

use crate::core::errors::IngestError;

/// The acknowledgement written back for every processed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Encoded as `OK\0`.
    Ok,
    /// Encoded as `ERROR: <message>\0`.
    Error(String),
}

impl From<&IngestError> for Response {
    fn from(e: &IngestError) -> Self {
        Response::Error(e.to_string())
    }
}

impl From<Result<(), IngestError>> for Response {
    fn from(result: Result<(), IngestError>) -> Self {
        match result {
            Ok(()) => Response::Ok,
            Err(e) => Response::from(&e),
        }
    }
}
