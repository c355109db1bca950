// src/core/protocol/codec.rs

//! A `tokio_util::codec` implementation that splits the inbound byte stream into
//! newline-terminated lines and encodes NUL-terminated responses.

use super::response::Response;
use crate::core::errors::IngestError;
use bytes::{Bytes, BytesMut};
use std::cmp;
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

const LINE_TERMINATOR: u8 = b'\n';
const RESPONSE_TERMINATOR: u8 = b'\0';
const OK_BODY: &[u8] = b"OK";
const ERROR_PREFIX: &[u8] = b"ERROR: ";

/// Default upper bound on a single request line, excluding the terminator.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

#[derive(Debug)]
pub struct IngestCodec {
    max_line_bytes: usize,
    /// Offset up to which the buffer has already been scanned for a newline.
    next_index: usize,
}

impl IngestCodec {
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            max_line_bytes,
            next_index: 0,
        }
    }
}

impl Default for IngestCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_BYTES)
    }
}

impl Decoder for IngestCodec {
    type Item = Bytes;
    type Error = IngestError;

    /// Yields the next complete line without its `\n` terminator.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let read_to = cmp::min(self.max_line_bytes.saturating_add(1), src.len());
        let newline = src[self.next_index..read_to]
            .iter()
            .position(|b| *b == LINE_TERMINATOR);

        match newline {
            Some(offset) => {
                let end = self.next_index + offset;
                self.next_index = 0;
                let mut line = src.split_to(end + 1);
                line.truncate(end);
                Ok(Some(line.freeze()))
            }
            None if src.len() > self.max_line_bytes => {
                Err(IngestError::LineTooLong(self.max_line_bytes))
            }
            None => {
                self.next_index = read_to;
                Ok(None)
            }
        }
    }

    /// An unterminated trailing line is dropped: a peer that disconnects mid-line
    /// gets no response for it.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        if !src.is_empty() {
            debug!(
                "Discarding {} bytes of unterminated input at end of stream.",
                src.len()
            );
            src.clear();
        }
        self.next_index = 0;
        Ok(None)
    }
}

impl Encoder<Response> for IngestCodec {
    type Error = IngestError;

    fn encode(&mut self, item: Response, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Response::Ok => {
                dst.reserve(OK_BODY.len() + 1);
                dst.extend_from_slice(OK_BODY);
            }
            Response::Error(message) => {
                dst.reserve(ERROR_PREFIX.len() + message.len() + 1);
                dst.extend_from_slice(ERROR_PREFIX);
                dst.extend_from_slice(message.as_bytes());
            }
        }
        dst.extend_from_slice(&[RESPONSE_TERMINATOR]);
        Ok(())
    }
}
