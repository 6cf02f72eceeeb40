//! Pending Response Registry.
//!
//! Maps request ids to callers awaiting a reply. Each entry is settled
//! exactly once: resolved by its reply, or rejected by teardown.
//!
//! Flow:
//! 1. The proxy allocates a request id and calls `register()`
//! 2. The request is written to the pipe
//! 3. The reply arrives and the proxy `take()`s the entry and resolves it
//! 4. On teardown `reject_all()` settles every remaining entry

use crate::error::InterfaceError;
use pipe_types::{SpecRef, StructValue};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::debug;

/// Result delivered to a caller awaiting a reply.
pub type ResponseResult = Result<Option<StructValue>, InterfaceError>;

/// Future returned for every request sent through an endpoint.
///
/// Either already settled (no reply expected, or the send failed up front)
/// or waiting on the registry. A dropped resolver surfaces as
/// [`InterfaceError::ConnectionClosed`].
#[derive(Debug)]
pub enum ResponseFuture<T> {
    Ready(Option<Result<T, InterfaceError>>),
    Waiting(oneshot::Receiver<Result<T, InterfaceError>>),
}

impl<T> ResponseFuture<T> {
    pub fn ready(result: Result<T, InterfaceError>) -> Self {
        ResponseFuture::Ready(Some(result))
    }

    pub fn failed(err: InterfaceError) -> Self {
        ResponseFuture::Ready(Some(Err(err)))
    }

    /// Pair of a waiting future and the sender that settles it.
    pub fn channel() -> (oneshot::Sender<Result<T, InterfaceError>>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, ResponseFuture::Waiting(rx))
    }
}

impl<T: Unpin> Future for ResponseFuture<T> {
    type Output = Result<T, InterfaceError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.get_mut() {
            ResponseFuture::Ready(slot) => {
                Poll::Ready(slot.take().unwrap_or(Err(InterfaceError::ConnectionClosed)))
            }
            ResponseFuture::Waiting(rx) => Pin::new(rx)
                .poll(cx)
                .map(|result| result.unwrap_or(Err(InterfaceError::ConnectionClosed))),
        }
    }
}

/// One in-flight request.
#[derive(Debug)]
pub struct PendingResponse {
    pub request_id: u64,
    /// Ordinal the reply must carry
    pub ordinal: u32,
    /// Schema the reply payload is decoded with
    pub response_spec: SpecRef,
    sender: oneshot::Sender<ResponseResult>,
}

impl PendingResponse {
    pub fn resolve(self, value: StructValue) {
        // The caller may have dropped its future; nothing to do then.
        let _ = self.sender.send(Ok(Some(value)));
    }

    pub fn reject(self, err: InterfaceError) {
        let _ = self.sender.send(Err(err));
    }
}

/// Counters for a registry's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingStats {
    pub total_registered: u64,
    pub total_taken: u64,
    pub total_rejected: u64,
}

/// Registry of requests awaiting replies, keyed by request id.
#[derive(Debug, Default)]
pub struct PendingRegistry {
    pending: HashMap<u64, PendingResponse>,
    stats: PendingStats,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request and get the future its reply settles.
    pub fn register(
        &mut self,
        request_id: u64,
        ordinal: u32,
        response_spec: SpecRef,
    ) -> ResponseFuture<Option<StructValue>> {
        let (sender, future) = ResponseFuture::channel();
        self.pending.insert(
            request_id,
            PendingResponse {
                request_id,
                ordinal,
                response_spec,
                sender,
            },
        );
        self.stats.total_registered += 1;
        debug!(request_id, ordinal, "Registered pending response");
        future
    }

    /// Remove the entry for `request_id` so its reply can settle it.
    pub fn take(&mut self, request_id: u64) -> Option<PendingResponse> {
        let entry = self.pending.remove(&request_id)?;
        self.stats.total_taken += 1;
        Some(entry)
    }

    /// Reject every remaining entry and leave the registry empty.
    pub fn reject_all(&mut self, err: &InterfaceError) -> usize {
        let count = self.pending.len();
        for (_, entry) in self.pending.drain() {
            entry.reject(err.clone());
        }
        self.stats.total_rejected += count as u64;
        count
    }

    pub fn contains(&self, request_id: u64) -> bool {
        self.pending.contains_key(&request_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn stats(&self) -> PendingStats {
        self.stats
    }
}
