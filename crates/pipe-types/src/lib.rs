//! # Pipe Types Crate
//!
//! Everything an endpoint needs to talk over a message pipe without knowing
//! what the endpoint does with the messages.
//!
//! ## Layout
//!
//! - [`header`]: the fixed message header and its flag bits.
//! - [`schema`]: declarative struct specs and the dynamic [`Value`] model.
//! - [`codec`]: the single generic routine that turns a spec plus a value
//!   into payload bytes and back.
//! - [`pipe`]: the non-blocking, readiness-driven pipe primitive boundary.
//! - [`local`]: an in-process pipe pair driven by the tokio local task set.
//!
//! ## Design Principles
//!
//! - **Header first**: the header is always decoded before any payload byte
//!   is interpreted.
//! - **Schema-driven**: no per-message types; an ordered field list drives
//!   encoding and decoding.

pub mod codec;
pub mod errors;
pub mod header;
pub mod local;
pub mod pipe;
pub mod schema;

pub use codec::{
    decode_struct_inline, encode_message, encode_struct, serialize_and_send_message,
};
pub use errors::{CodecError, PipeError, SendError};
pub use header::{deserialize_message_header, MessageFlags, MessageHeader, HEADER_SIZE};
pub use local::{create_message_pipe, LocalPipe};
pub use pipe::{
    HandleId, MessagePipe, PipeHandle, PipeMessage, RawHandle, ReadResult, Signals,
    WatchCallback, Watcher,
};
pub use schema::{FieldKind, FieldSpec, SpecRef, StructSpec, StructValue, Value};
