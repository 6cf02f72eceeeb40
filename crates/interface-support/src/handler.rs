//! Message handler registrations and their results.

use crate::error::HandlerError;
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use pipe_types::{SpecRef, StructValue, Value};
use std::fmt;
use std::future::Future;

/// Reply produced by a handler for a message that declares a response.
pub enum Reply {
    /// Sent before the handler's dispatch returns.
    Immediate(StructValue),
    /// Sent once the future completes; a failure closes the binding.
    Deferred(LocalBoxFuture<'static, Result<StructValue, HandlerError>>),
}

impl Reply {
    pub fn immediate(value: StructValue) -> Self {
        Reply::Immediate(value)
    }

    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = Result<StructValue, HandlerError>> + 'static,
    {
        Reply::Deferred(future.boxed_local())
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Immediate(value) => f.debug_tuple("Immediate").field(value).finish(),
            Reply::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// `Ok(None)` means no reply; required to be `Some` when a response is declared.
pub type HandlerResult = Result<Option<Reply>, HandlerError>;

/// Handler invoked with the request fields in schema order.
pub type HandlerFn = Box<dyn Fn(&[Value]) -> HandlerResult>;

/// One ordinal's registration on a target.
pub struct MessageHandler {
    pub request_spec: SpecRef,
    pub response_spec: Option<SpecRef>,
    pub handler: HandlerFn,
}

impl MessageHandler {
    pub fn new(request_spec: SpecRef, response_spec: Option<SpecRef>, handler: HandlerFn) -> Self {
        Self {
            request_spec,
            response_spec,
            handler,
        }
    }

    pub fn expects_response(&self) -> bool {
        self.response_spec.is_some()
    }
}

impl fmt::Debug for MessageHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageHandler")
            .field("request_spec", &self.request_spec.name())
            .field(
                "response_spec",
                &self.response_spec.as_ref().map(|spec| spec.name()),
            )
            .finish_non_exhaustive()
    }
}
