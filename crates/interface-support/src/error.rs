//! Error types for interface endpoints.
//!
//! Usage errors are returned to the caller immediately. Protocol and
//! transport errors tear the affected binding down; callers observe them as
//! rejected response futures.

use pipe_types::{CodecError, PipeError, SendError};
use thiserror::Error;

/// Errors surfaced by proxies, targets and the control channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterfaceError {
    #[error("Attempting to use an unbound proxy")]
    NotBound,

    #[error("Endpoint already bound")]
    AlreadyBound,

    /// The pipe is already known to be closed; nothing was sent.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A pending response was rejected by endpoint teardown.
    #[error("Disconnected: {reason}")]
    Disconnected { reason: String },

    #[error("Too many pending responses (limit {limit})")]
    TooManyPendingResponses { limit: usize },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Pipe error: {0}")]
    Pipe(#[from] PipeError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),
}

impl From<SendError> for InterfaceError {
    fn from(err: SendError) -> Self {
        match err {
            SendError::Codec(e) => InterfaceError::Codec(e),
            SendError::Pipe(e) => InterfaceError::Pipe(e),
        }
    }
}

/// Peer misbehaviour. Always tears down the binding it arrived on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Malformed message header: {0}")]
    MalformedHeader(CodecError),

    #[error("Received unexpected request message (ordinal {ordinal})")]
    UnexpectedRequest { ordinal: u32 },

    #[error("Received unexpected response message (request {request_id})")]
    UnexpectedResponse { request_id: u64 },

    #[error("Received malformed response message: {0}")]
    MalformedResponse(CodecError),

    #[error("Response ordinal {received} does not match request ordinal {expected}")]
    OrdinalMismatch { expected: u32, received: u32 },

    #[error("Received unexpected response on interface target (ordinal {ordinal})")]
    UnexpectedResponseOnTarget { ordinal: u32 },

    #[error("Received unknown message (ordinal {ordinal})")]
    UnknownOrdinal { ordinal: u32 },

    #[error("Received malformed message: {0}")]
    MalformedRequest(CodecError),

    #[error("Received malformed control message: {0}")]
    MalformedControlMessage(CodecError),

    #[error("Received unknown control message (input {input})")]
    UnknownControlMessage { input: u32 },
}

/// Failures raised by application handlers and listeners.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// The handler declined to answer the request.
    #[error("Handler rejected the request: {0}")]
    Rejected(String),

    #[error("Message expects a reply but its handler did not provide one (ordinal {ordinal})")]
    MissingReply { ordinal: u32 },

    #[error(transparent)]
    Listener(#[from] ListenerError),
}

impl HandlerError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        HandlerError::Rejected(reason.into())
    }
}

/// Misuse of a callback target's listener set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListenerError {
    #[error("Multiple listeners attempted to reply to a message ({count} replies)")]
    MultipleResponders { count: usize },

    #[error("Callback router has been dropped")]
    RouterGone,
}
