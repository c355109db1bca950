// src/connection/handler.rs

//! Defines the `ConnectionHandler` which runs the protocol loop of one client connection.

use super::guard::ConnectionGuard;
use crate::core::metrics;
use crate::core::protocol::{IngestCodec, Response};
use crate::core::record::Record;
use crate::core::sink::{ConnectionPool, IngestSink};
use crate::core::IngestError;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// Runs the read → decode → normalize → persist → respond loop for one connection.
///
/// Lines are handled strictly one at a time: the response for a line is written
/// before the next line is read. Decode, validation and persistence failures are
/// answered with an error response and the loop carries on; only transport
/// failures, end of stream or the kill signal end it.
pub struct ConnectionHandler<S: IngestSink, T> {
    framed: Framed<T, IngestCodec>,
    addr: SocketAddr,
    /// Captured once at accept time and attached to every record.
    source_ip: String,
    pool: ConnectionPool<S>,
    kill_rx: broadcast::Receiver<()>,
}

impl<S, T> ConnectionHandler<S, T>
where
    S: IngestSink,
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(
        stream: T,
        addr: SocketAddr,
        pool: ConnectionPool<S>,
        max_line_bytes: usize,
        kill_rx: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            framed: Framed::new(stream, IngestCodec::new(max_line_bytes)),
            addr,
            source_ip: addr.ip().to_string(),
            pool,
            kill_rx,
        }
    }

    /// The main event loop for the connection.
    ///
    /// Returns an error only if a response could not be written.
    pub async fn run(&mut self) -> Result<(), IngestError> {
        let _guard = ConnectionGuard::new(self.addr);
        // A dropped kill sender must not look like a kill request.
        let mut kill_armed = true;

        loop {
            tokio::select! {
                biased;
                signal = self.kill_rx.recv(), if kill_armed => {
                    match signal {
                        Ok(()) | Err(RecvError::Lagged(_)) => {
                            info!("Connection handler for {} received kill signal.", self.addr);
                            break;
                        }
                        Err(RecvError::Closed) => kill_armed = false,
                    }
                }
                result = self.framed.next() => {
                    match result {
                        Some(Ok(line)) => {
                            if let Some(response) = self.process_line(line).await {
                                self.framed.send(response).await?;
                            }
                        }
                        Some(Err(e)) => {
                            if is_normal_disconnect(&e) {
                                debug!("Connection from {} closed by peer: {}", self.addr, e);
                            } else {
                                warn!("Connection error for {}: {}", self.addr, e);
                            }
                            break;
                        }
                        None => {
                            debug!("Connection from {} closed by peer.", self.addr);
                            break;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Handles one raw line. Blank lines produce no response.
    async fn process_line(&self, line: Bytes) -> Option<Response> {
        let line = line.trim_ascii();
        if line.is_empty() {
            return None;
        }
        debug!("Got from {}: {}", self.addr, String::from_utf8_lossy(line));

        let result = self.ingest(line).await;
        match &result {
            Ok(()) => metrics::RECORDS_TOTAL.with_label_values(&["accepted"]).inc(),
            Err(e) => {
                metrics::RECORDS_TOTAL
                    .with_label_values(&[e.outcome_label()])
                    .inc();
                debug!("Rejected line from {}: {}", self.addr, e);
            }
        }
        Some(Response::from(result))
    }

    async fn ingest(&self, line: &[u8]) -> Result<(), IngestError> {
        let value: Value = serde_json::from_slice(line)?;
        let record = Record::normalize(&value)?.with_source_ip(self.source_ip.as_str());
        self.pool.insert(&record).await
    }
}

/// Helper function to check for non-critical disconnection errors.
fn is_normal_disconnect(e: &IngestError) -> bool {
    matches!(e, IngestError::Io(io_err) if matches!(
        io_err.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionAborted
    ))
}
