// src/connection/mod.rs

//! Manages the lifecycle of a single client TCP connection: framing, the
//! per-line ingest loop, and connection accounting.

mod guard;
mod handler;

pub use guard::ConnectionGuard;
pub use handler::ConnectionHandler;
