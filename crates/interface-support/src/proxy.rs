//! # Proxy Endpoint
//!
//! Caller side of an interface. Serializes requests onto the bound pipe,
//! hands back one [`ResponseFuture`] per call and matches replies to callers
//! by request id, whatever order they arrive in.
//!
//! Any protocol violation or transport failure tears the binding down: the
//! handle is closed and every pending response is rejected exactly once.

use crate::config::EndpointConfig;
use crate::control::{ControlMessageHandler, RunInput};
use crate::error::{InterfaceError, ProtocolError};
use crate::pending::{PendingRegistry, PendingStats, ResponseFuture};
use crate::reader::HandleReader;
use pipe_types::{
    decode_struct_inline, deserialize_message_header, encode_message, MessageFlags,
    MessageHeader, MessagePipe, PipeError, PipeHandle, PipeMessage, SpecRef, StructValue, Value,
};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};

struct ProxyState {
    handle: Option<PipeHandle>,
    reader: Option<HandleReader>,
    control: Option<Rc<ControlMessageHandler>>,
    next_request_id: u64,
    pending: PendingRegistry,
}

struct ProxyInner {
    config: EndpointConfig,
    state: RefCell<ProxyState>,
}

/// Caller-side endpoint bound to at most one pipe handle.
pub struct InterfaceProxy {
    inner: Rc<ProxyInner>,
}

impl Default for InterfaceProxy {
    fn default() -> Self {
        Self::new(EndpointConfig::default())
    }
}

impl InterfaceProxy {
    /// Create an unbound proxy.
    pub fn new(config: EndpointConfig) -> Self {
        Self {
            inner: Rc::new(ProxyInner {
                config,
                state: RefCell::new(ProxyState {
                    handle: None,
                    reader: None,
                    control: None,
                    next_request_id: 0,
                    pending: PendingRegistry::new(),
                }),
            }),
        }
    }

    /// Create a proxy already bound to `handle`.
    pub fn with_handle(config: EndpointConfig, handle: PipeHandle) -> Result<Self, InterfaceError> {
        let proxy = Self::new(config);
        proxy.bind_handle(handle)?;
        Ok(proxy)
    }

    /// Bind to `handle`, starting a fresh request-id sequence.
    ///
    /// Fails while a previous binding is still being read. A proxy whose
    /// binding was unbound or torn down may be bound again.
    pub fn bind_handle(&self, handle: PipeHandle) -> Result<(), InterfaceError> {
        if self.is_bound() {
            return Err(InterfaceError::AlreadyBound);
        }

        let on_read = Rc::downgrade(&self.inner);
        let on_error = Rc::downgrade(&self.inner);
        let reader = HandleReader::new(
            handle.clone(),
            Box::new(move |message: PipeMessage| {
                if let Some(inner) = on_read.upgrade() {
                    inner.on_message_received(message);
                }
            }),
            Box::new(move |err: PipeError| {
                if let Some(inner) = on_error.upgrade() {
                    inner.on_error(err.to_string());
                }
            }),
        );
        reader.start()?;

        let control = Rc::new(ControlMessageHandler::new(
            handle.clone(),
            self.inner.config.unknown_control_messages,
        ));

        debug!(endpoint = %self.inner.config.name, handle = %handle.id(), "Proxy bound");
        let mut state = self.inner.state.borrow_mut();
        state.handle = Some(handle);
        state.reader = Some(reader);
        state.control = Some(control);
        state.next_request_id = 0;
        state.pending = PendingRegistry::new();
        Ok(())
    }

    /// Stop reading without closing the handle, and release it.
    ///
    /// Every pending response is rejected with
    /// [`InterfaceError::Disconnected`] and pending flushes settle as
    /// [`InterfaceError::ConnectionClosed`].
    pub fn unbind(&self) -> Option<PipeHandle> {
        let (reader, control, handle) = {
            let mut state = self.inner.state.borrow_mut();
            (state.reader.take(), state.control.take(), state.handle.take())
        };
        if let Some(reader) = reader {
            reader.stop();
        }
        if let Some(control) = control {
            control.reject_all();
        }
        let rejected = self
            .inner
            .state
            .borrow_mut()
            .pending
            .reject_all(&InterfaceError::Disconnected {
                reason: "unbound".to_string(),
            });
        if handle.is_some() {
            debug!(endpoint = %self.inner.config.name, rejected, "Proxy unbound");
        }
        handle
    }

    /// Send a request.
    ///
    /// `args` map positionally onto the fields of `request_spec`. With a
    /// `response_spec` the future settles with the decoded reply; without
    /// one it is already resolved to `None` once the message is written.
    pub fn send_message(
        &self,
        ordinal: u32,
        request_spec: &SpecRef,
        response_spec: Option<&SpecRef>,
        args: Vec<Value>,
    ) -> Result<ResponseFuture<Option<StructValue>>, InterfaceError> {
        let (handle, request_id, bytes) = {
            let mut state = self.inner.state.borrow_mut();
            let Some(handle) = state.handle.clone() else {
                return Err(InterfaceError::NotBound);
            };

            // The pipe has already been closed, so just drop the message.
            if state.reader.as_ref().map_or(true, HandleReader::is_stopped) {
                debug!(endpoint = %self.inner.config.name, ordinal, "Dropping message on closed pipe");
                return Ok(ResponseFuture::failed(InterfaceError::ConnectionClosed));
            }

            if response_spec.is_some() {
                if let Some(limit) = self.inner.config.max_pending_responses {
                    if state.pending.len() >= limit {
                        return Err(InterfaceError::TooManyPendingResponses { limit });
                    }
                }
            }

            let value = request_spec.value_from_args(args)?;
            let flags = if response_spec.is_some() {
                MessageFlags::EXPECTS_RESPONSE
            } else {
                MessageFlags::NONE
            };
            let request_id = state.next_request_id;
            let header = MessageHeader::new(ordinal, request_id, flags);
            let bytes = encode_message(&header, request_spec, &value)?;
            state.next_request_id += 1;
            (handle, request_id, bytes)
        };

        if let Err(e) = handle.write_message(bytes, Vec::new()) {
            warn!(
                endpoint = %self.inner.config.name,
                ordinal,
                request_id,
                error = %e,
                "Failed to write request"
            );
            return Ok(ResponseFuture::failed(e.into()));
        }

        match response_spec {
            Some(spec) => Ok(self
                .inner
                .state
                .borrow_mut()
                .pending
                .register(request_id, ordinal, spec.clone())),
            None => Ok(ResponseFuture::ready(Ok(None))),
        }
    }

    /// Resolve once the peer has read everything sent before this call.
    pub fn flush_for_testing(&self) -> Result<ResponseFuture<()>, InterfaceError> {
        let (control, request_id) = {
            let mut state = self.inner.state.borrow_mut();
            if state.handle.is_none() {
                return Err(InterfaceError::NotBound);
            }
            let Some(control) = state.control.clone() else {
                return Ok(ResponseFuture::failed(InterfaceError::ConnectionClosed));
            };
            let request_id = state.next_request_id;
            state.next_request_id += 1;
            (control, request_id)
        };
        Ok(control.send_run_message(request_id, RunInput::FlushForTesting))
    }

    /// Bound and still reading.
    pub fn is_bound(&self) -> bool {
        self.inner
            .state
            .borrow()
            .reader
            .as_ref()
            .is_some_and(|reader| !reader.is_stopped())
    }

    pub fn pending_count(&self) -> usize {
        self.inner.state.borrow().pending.len()
    }

    /// Whether the request sent with `request_id` still awaits its reply.
    pub fn is_pending(&self, request_id: u64) -> bool {
        self.inner.state.borrow().pending.contains(request_id)
    }

    /// Registry counters since the current binding was made.
    pub fn pending_stats(&self) -> PendingStats {
        self.inner.state.borrow().pending.stats()
    }

    /// Request id the next request will carry.
    pub fn next_request_id(&self) -> u64 {
        self.inner.state.borrow().next_request_id
    }

    pub fn handle(&self) -> Option<PipeHandle> {
        self.inner.state.borrow().handle.clone()
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.inner.config
    }

    /// Tear the binding down as if the pipe had failed. Idempotent.
    pub fn close(&self) {
        self.inner.on_error("closed locally".to_string());
    }
}

impl ProxyInner {
    fn on_message_received(&self, message: PipeMessage) {
        let buffer = message.bytes.as_ref();
        let header = match deserialize_message_header(buffer) {
            Ok(header) => header,
            Err(e) => return self.on_protocol_error(ProtocolError::MalformedHeader(e)),
        };

        let control = self.state.borrow().control.clone();
        if let Some(control) = control {
            match control.maybe_handle_control_message(&header, buffer) {
                Ok(true) => return,
                Ok(false) => {}
                Err(e) => return self.on_protocol_error(e),
            }
        }

        if !header.flags.is_response() || header.flags.expects_response() {
            return self.on_protocol_error(ProtocolError::UnexpectedRequest {
                ordinal: header.ordinal,
            });
        }

        let entry = self.state.borrow_mut().pending.take(header.request_id);
        let Some(entry) = entry else {
            return self.on_protocol_error(ProtocolError::UnexpectedResponse {
                request_id: header.request_id,
            });
        };

        let err = match decode_struct_inline(header.payload(buffer), &entry.response_spec) {
            Ok(value) if header.ordinal == entry.ordinal => {
                debug!(
                    endpoint = %self.config.name,
                    ordinal = header.ordinal,
                    request_id = header.request_id,
                    "Resolved pending response"
                );
                entry.resolve(value);
                return;
            }
            Ok(_) => ProtocolError::OrdinalMismatch {
                expected: entry.ordinal,
                received: header.ordinal,
            },
            Err(e) => ProtocolError::MalformedResponse(e),
        };

        entry.reject(InterfaceError::Protocol(err.clone()));
        self.on_protocol_error(err);
    }

    fn on_protocol_error(&self, err: ProtocolError) {
        self.on_error(err.to_string());
    }

    fn on_error(&self, reason: String) {
        let (reader, control) = {
            let mut state = self.state.borrow_mut();
            let Some(reader) = state.reader.take() else {
                return;
            };
            (reader, state.control.take())
        };

        reader.stop_and_close();
        if let Some(control) = control {
            control.reject_all();
        }
        let rejected = self
            .state
            .borrow_mut()
            .pending
            .reject_all(&InterfaceError::Disconnected {
                reason: reason.clone(),
            });

        warn!(
            endpoint = %self.config.name,
            reason = %reason,
            rejected,
            "Proxy connection torn down"
        );
    }
}
