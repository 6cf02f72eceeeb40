//! # Control Message Handler
//!
//! Handles runtime messages on the reserved control ordinal without
//! involving application handlers. The only command answered is
//! flush-for-testing: the peer replies as soon as it has read every message
//! queued ahead of the request, so a completed round-trip proves the pipe
//! has been drained in both directions.

use crate::config::UnknownControlPolicy;
use crate::error::{InterfaceError, ProtocolError};
use crate::pending::ResponseFuture;
use pipe_types::{
    decode_struct_inline, serialize_and_send_message, FieldKind, MessageFlags, MessageHeader,
    PipeHandle, SpecRef, StructSpec, StructValue, Value,
};
use std::cell::RefCell;
use std::collections::HashMap;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Ordinal reserved for control messages.
pub const RUN_MESSAGE_ID: u32 = 0xFFFF_FFFF;

const FLUSH_FOR_TESTING_TAG: u32 = 1;

/// Command carried by a control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunInput {
    FlushForTesting,
    /// A command this runtime does not implement.
    Other(u32),
}

impl RunInput {
    pub fn from_tag(tag: u32) -> Self {
        match tag {
            FLUSH_FOR_TESTING_TAG => RunInput::FlushForTesting,
            other => RunInput::Other(other),
        }
    }

    pub fn tag(self) -> u32 {
        match self {
            RunInput::FlushForTesting => FLUSH_FOR_TESTING_TAG,
            RunInput::Other(tag) => tag,
        }
    }
}

/// Request payload schema: `{ input: uint32 }`.
pub fn run_message_params() -> SpecRef {
    StructSpec::new("RunMessageParams")
        .field("input", FieldKind::Uint32)
        .build()
}

/// Reply payload schema: `{ output: uint32? }`.
pub fn run_response_message_params() -> SpecRef {
    StructSpec::new("RunResponseMessageParams")
        .nullable_field("output", FieldKind::Uint32)
        .build()
}

type FlushSender = oneshot::Sender<Result<(), InterfaceError>>;

/// Control channel of one binding.
pub struct ControlMessageHandler {
    handle: PipeHandle,
    policy: UnknownControlPolicy,
    request_spec: SpecRef,
    response_spec: SpecRef,
    pending_flushes: RefCell<HashMap<u64, FlushSender>>,
}

impl ControlMessageHandler {
    pub fn new(handle: PipeHandle, policy: UnknownControlPolicy) -> Self {
        Self {
            handle,
            policy,
            request_spec: run_message_params(),
            response_spec: run_response_message_params(),
            pending_flushes: RefCell::new(HashMap::new()),
        }
    }

    /// Send a control request and get a future settled by its reply.
    ///
    /// `request_id` comes from the owning endpoint's counter, shared with
    /// application requests.
    pub fn send_run_message(&self, request_id: u64, input: RunInput) -> ResponseFuture<()> {
        let params = StructValue::new().with("input", input.tag());
        if let Err(e) = serialize_and_send_message(
            self.handle.as_ref(),
            RUN_MESSAGE_ID,
            request_id,
            MessageFlags::EXPECTS_RESPONSE,
            &self.request_spec,
            &params,
        ) {
            warn!(request_id, error = %e, "Failed to send control message");
            return ResponseFuture::failed(e.into());
        }

        let (sender, future) = ResponseFuture::channel();
        self.pending_flushes.borrow_mut().insert(request_id, sender);
        debug!(request_id, ?input, "Sent control message");
        future
    }

    /// Handle `buffer` if it is a control message.
    ///
    /// Returns whether the message was consumed. Unconsumed messages go on to
    /// normal dispatch.
    pub fn maybe_handle_control_message(
        &self,
        header: &MessageHeader,
        buffer: &[u8],
    ) -> Result<bool, ProtocolError> {
        if header.ordinal != RUN_MESSAGE_ID {
            return Ok(false);
        }

        if header.flags.expects_response() {
            self.handle_run_request(header.request_id, header.payload(buffer))
        } else {
            Ok(self.handle_run_response(header.request_id))
        }
    }

    fn handle_run_request(&self, request_id: u64, payload: &[u8]) -> Result<bool, ProtocolError> {
        let params = decode_struct_inline(payload, &self.request_spec)
            .map_err(ProtocolError::MalformedControlMessage)?;
        let tag = params.get("input").and_then(Value::as_u32).unwrap_or_default();

        match RunInput::from_tag(tag) {
            RunInput::FlushForTesting => {
                let output = StructValue::new().with("output", Value::Null);
                if let Err(e) = serialize_and_send_message(
                    self.handle.as_ref(),
                    RUN_MESSAGE_ID,
                    request_id,
                    MessageFlags::IS_RESPONSE,
                    &self.response_spec,
                    &output,
                ) {
                    // The reader observes the closed pipe on its own.
                    debug!(request_id, error = %e, "Could not answer flush request");
                }
                Ok(true)
            }
            RunInput::Other(input) => match self.policy {
                UnknownControlPolicy::Ignore => {
                    debug!(request_id, input, "Ignoring unknown control message");
                    Ok(false)
                }
                UnknownControlPolicy::Reject => {
                    Err(ProtocolError::UnknownControlMessage { input })
                }
            },
        }
    }

    fn handle_run_response(&self, request_id: u64) -> bool {
        let sender = self.pending_flushes.borrow_mut().remove(&request_id);
        match sender {
            Some(sender) => {
                debug!(request_id, "Control round-trip complete");
                let _ = sender.send(Ok(()));
                true
            }
            None => false,
        }
    }

    /// Drop every outstanding resolver; their futures settle as
    /// [`InterfaceError::ConnectionClosed`].
    pub fn reject_all(&self) -> usize {
        let mut pending = self.pending_flushes.borrow_mut();
        let count = pending.len();
        pending.clear();
        count
    }

    pub fn pending_count(&self) -> usize {
        self.pending_flushes.borrow().len()
    }

    pub fn handle(&self) -> &PipeHandle {
        &self.handle
    }
}
