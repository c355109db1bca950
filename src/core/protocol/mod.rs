// src/core/protocol/mod.rs

//! The line-oriented wire protocol: newline-terminated JSON requests in,
//! NUL-terminated acknowledgements out.

pub mod codec;
pub mod response;
pub use codec::IngestCodec;
pub use response::Response;
