//! # Error Types
//!
//! Defines error types used by the codec and the pipe primitive.

use thiserror::Error;

/// Errors raised while encoding or decoding headers and payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The buffer ended before the structure it describes.
    #[error("Truncated buffer: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// The header declared a size the buffer cannot satisfy.
    #[error("Invalid header size {header_size} for a {buffer_len} byte message")]
    InvalidHeaderSize { header_size: u32, buffer_len: usize },

    /// A struct declared a byte size that does not fit its contents.
    #[error("Invalid struct size {declared} for {spec}")]
    InvalidStructSize { spec: String, declared: u32 },

    /// A value did not match the kind declared by the spec.
    #[error("Type mismatch for field `{field}`: expected {expected}")]
    TypeMismatch { field: String, expected: String },

    /// A non-nullable field was absent.
    #[error("Missing required field `{field}` in {spec}")]
    MissingField { spec: String, field: String },

    /// A presence marker other than 0 or 1.
    #[error("Invalid presence marker {marker} for field `{field}`")]
    InvalidPresence { field: String, marker: u8 },

    /// String bytes were not valid UTF-8.
    #[error("Invalid UTF-8 in field `{field}`")]
    InvalidUtf8 { field: String },

    /// More positional arguments than the spec has fields.
    #[error("Too many values for {spec}: expected at most {expected}, got {got}")]
    TooManyValues {
        spec: String,
        expected: usize,
        got: usize,
    },
}

/// Errors reported by the pipe primitive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipeError {
    /// The local handle has been closed.
    #[error("Handle {0} is closed")]
    Closed(u64),

    /// The remote endpoint has been closed.
    #[error("Peer closed")]
    PeerClosed,

    /// A read or watch returned a status the protocol does not expect.
    #[error("Unexpected pipe status: {0}")]
    Unexpected(u32),
}

/// Errors from `serialize_and_send_message`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("Encode failed: {0}")]
    Codec(#[from] CodecError),

    #[error("Write failed: {0}")]
    Pipe(#[from] PipeError),
}
