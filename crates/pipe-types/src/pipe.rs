//! # Pipe Primitive Boundary
//!
//! The contract endpoints consume from the underlying message pipe: a
//! non-blocking read, a write, readiness watching and close. Everything is
//! single-threaded; watch callbacks run on the execution context that owns
//! the handle.

use crate::errors::PipeError;
use bytes::Bytes;
use std::fmt;
use std::rc::Rc;

/// Opaque handle transferred alongside a message. Not interpreted here.
pub type RawHandle = u32;

/// Identity of one pipe endpoint, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(pub u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle#{}", self.0)
    }
}

/// One message read off a pipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeMessage {
    pub bytes: Bytes,
    pub handles: Vec<RawHandle>,
}

impl PipeMessage {
    pub fn new(bytes: Bytes) -> Self {
        Self {
            bytes,
            handles: Vec::new(),
        }
    }
}

/// Outcome of a non-blocking read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadResult {
    /// A message was dequeued.
    Message(PipeMessage),
    /// Nothing queued right now.
    ShouldWait,
    /// Nothing queued and the peer is gone, so nothing ever will be.
    PeerClosed,
    /// Any other status; the protocol treats it as fatal.
    Failed(u32),
}

/// Signals a watcher can be interested in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signals {
    pub readable: bool,
    pub peer_closed: bool,
}

impl Signals {
    pub const READABLE: Self = Self {
        readable: true,
        peer_closed: false,
    };

    pub const READABLE_OR_PEER_CLOSED: Self = Self {
        readable: true,
        peer_closed: true,
    };
}

/// Callback invoked when a watched signal becomes satisfied.
pub type WatchCallback = Rc<dyn Fn(Signals)>;

/// Active watch registration. Dropping it cancels the watch.
pub trait Watcher {
    /// Stop delivering notifications. Idempotent.
    fn cancel(&mut self);
}

/// Non-blocking, message-oriented pipe endpoint.
pub trait MessagePipe {
    fn id(&self) -> HandleId;

    /// Queue a message for the peer.
    fn write_message(&self, bytes: Bytes, handles: Vec<RawHandle>) -> Result<(), PipeError>;

    /// Dequeue the next message without blocking.
    fn read_message(&self) -> ReadResult;

    /// Invoke `callback` whenever `signals` become satisfied.
    fn watch(&self, signals: Signals, callback: WatchCallback)
        -> Result<Box<dyn Watcher>, PipeError>;

    /// Close this endpoint. Idempotent; the peer observes peer-closed.
    fn close(&self);

    fn is_closed(&self) -> bool;
}

/// Shared pipe endpoint.
pub type PipeHandle = Rc<dyn MessagePipe>;
