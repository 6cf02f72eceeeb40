//! # Target Endpoint
//!
//! Callee side of an interface. One handler table, keyed by ordinal, is
//! shared by any number of simultaneous bindings; each binding owns its own
//! reader and control channel. A misbehaving peer or a failing handler
//! closes only the binding it arrived on.

use crate::config::EndpointConfig;
use crate::control::ControlMessageHandler;
use crate::error::{HandlerError, InterfaceError, ProtocolError};
use crate::handler::{HandlerResult, MessageHandler, Reply};
use crate::reader::HandleReader;
use pipe_types::{
    decode_struct_inline, deserialize_message_header, serialize_and_send_message, MessageFlags,
    MessagePipe, PipeError, PipeHandle, PipeMessage, SpecRef, StructValue, Value,
};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, error, warn};

/// Key of one bound handle on a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(pub u64);

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "binding#{}", self.0)
    }
}

struct Binding {
    reader: HandleReader,
    control: Rc<ControlMessageHandler>,
}

struct TargetInner {
    config: EndpointConfig,
    handlers: RefCell<HashMap<u32, Rc<MessageHandler>>>,
    bindings: RefCell<HashMap<BindingId, Binding>>,
    next_binding: Cell<u64>,
}

/// Callee-side endpoint.
pub struct InterfaceTarget {
    inner: Rc<TargetInner>,
}

/// Non-owning reference to a target, for handlers that need to reach back
/// into it.
#[derive(Clone)]
pub struct WeakInterfaceTarget {
    inner: Weak<TargetInner>,
}

impl WeakInterfaceTarget {
    pub fn upgrade(&self) -> Option<InterfaceTarget> {
        self.inner.upgrade().map(|inner| InterfaceTarget { inner })
    }
}

impl Default for InterfaceTarget {
    fn default() -> Self {
        Self::new(EndpointConfig::default())
    }
}

impl InterfaceTarget {
    pub fn new(config: EndpointConfig) -> Self {
        Self {
            inner: Rc::new(TargetInner {
                config,
                handlers: RefCell::new(HashMap::new()),
                bindings: RefCell::new(HashMap::new()),
                next_binding: Cell::new(0),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakInterfaceTarget {
        WeakInterfaceTarget {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Install the handler for `ordinal`, replacing any earlier one.
    ///
    /// Returns true if a handler was replaced.
    pub fn register_handler<F>(
        &self,
        ordinal: u32,
        request_spec: SpecRef,
        response_spec: Option<SpecRef>,
        handler: F,
    ) -> bool
    where
        F: Fn(&[Value]) -> HandlerResult + 'static,
    {
        let handler = MessageHandler::new(request_spec, response_spec, Box::new(handler));
        let replaced = self
            .inner
            .handlers
            .borrow_mut()
            .insert(ordinal, Rc::new(handler))
            .is_some();
        debug!(endpoint = %self.inner.config.name, ordinal, replaced, "Registered handler");
        replaced
    }

    pub fn has_handler(&self, ordinal: u32) -> bool {
        self.inner.handlers.borrow().contains_key(&ordinal)
    }

    /// Start serving requests arriving on `handle`.
    pub fn bind_handle(&self, handle: PipeHandle) -> Result<BindingId, InterfaceError> {
        let id = BindingId(self.inner.next_binding.get());
        self.inner.next_binding.set(id.0 + 1);

        let on_read = Rc::downgrade(&self.inner);
        let on_error = Rc::downgrade(&self.inner);
        let reader = HandleReader::new(
            handle.clone(),
            Box::new(move |message: PipeMessage| {
                if let Some(inner) = on_read.upgrade() {
                    inner.on_message_received(id, message);
                }
            }),
            Box::new(move |err: PipeError| {
                if let Some(inner) = on_error.upgrade() {
                    inner.on_error(id, err);
                }
            }),
        );
        let control = Rc::new(ControlMessageHandler::new(
            handle.clone(),
            self.inner.config.unknown_control_messages,
        ));

        reader.start()?;
        self.inner
            .bindings
            .borrow_mut()
            .insert(id, Binding { reader, control });

        debug!(endpoint = %self.inner.config.name, binding = %id, handle = %handle.id(), "Target bound");
        Ok(id)
    }

    /// Stop reading `binding` and close its handle.
    ///
    /// Returns false if the binding was already gone.
    pub fn close_binding(&self, binding: BindingId) -> bool {
        self.inner.close_binding(binding)
    }

    pub fn binding_count(&self) -> usize {
        self.inner.bindings.borrow().len()
    }

    pub fn is_bound(&self, binding: BindingId) -> bool {
        self.inner.bindings.borrow().contains_key(&binding)
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.inner.config
    }
}

impl TargetInner {
    fn on_message_received(self: &Rc<Self>, binding: BindingId, message: PipeMessage) {
        let buffer = message.bytes.as_ref();
        let header = match deserialize_message_header(buffer) {
            Ok(header) => header,
            Err(e) => return self.on_protocol_error(binding, ProtocolError::MalformedHeader(e)),
        };

        let Some((handle, control)) = self.bindings.borrow().get(&binding).map(|b| {
            (b.reader.handle().clone(), b.control.clone())
        }) else {
            return;
        };

        match control.maybe_handle_control_message(&header, buffer) {
            Ok(true) => return,
            Ok(false) => {}
            Err(e) => return self.on_protocol_error(binding, e),
        }

        if header.flags.is_response() {
            return self.on_protocol_error(
                binding,
                ProtocolError::UnexpectedResponseOnTarget {
                    ordinal: header.ordinal,
                },
            );
        }

        let handler = self.handlers.borrow().get(&header.ordinal).cloned();
        let Some(handler) = handler else {
            return self.on_protocol_error(
                binding,
                ProtocolError::UnknownOrdinal {
                    ordinal: header.ordinal,
                },
            );
        };

        let request = match decode_struct_inline(header.payload(buffer), &handler.request_spec) {
            Ok(request) => request,
            Err(e) => return self.on_protocol_error(binding, ProtocolError::MalformedRequest(e)),
        };

        let args = request.into_values();
        let result = (handler.handler)(&args);

        let Some(response_spec) = handler.response_spec.clone() else {
            if let Err(e) = result {
                return self.on_handler_error(binding, header.ordinal, e);
            }
            return;
        };

        match result {
            Err(e) => self.on_handler_error(binding, header.ordinal, e),
            Ok(None) => {
                let err = HandlerError::MissingReply {
                    ordinal: header.ordinal,
                };
                error!(endpoint = %self.config.name, binding = %binding, error = %err, "Handler did not reply");
                self.close_binding(binding);
            }
            Ok(Some(Reply::Immediate(value))) => self.send_reply(
                binding,
                &handle,
                header.ordinal,
                header.request_id,
                &response_spec,
                &value,
            ),
            Ok(Some(Reply::Deferred(future))) => {
                let weak = Rc::downgrade(self);
                let (ordinal, request_id) = (header.ordinal, header.request_id);
                tokio::task::spawn_local(async move {
                    let result = future.await;
                    let Some(inner) = weak.upgrade() else {
                        return;
                    };
                    match result {
                        Ok(value) => inner.send_reply(
                            binding,
                            &handle,
                            ordinal,
                            request_id,
                            &response_spec,
                            &value,
                        ),
                        Err(e) => inner.on_handler_error(binding, ordinal, e),
                    }
                });
            }
        }
    }

    fn send_reply(
        &self,
        binding: BindingId,
        handle: &PipeHandle,
        ordinal: u32,
        request_id: u64,
        spec: &SpecRef,
        value: &StructValue,
    ) {
        match serialize_and_send_message(
            handle.as_ref(),
            ordinal,
            request_id,
            MessageFlags::IS_RESPONSE,
            spec,
            value,
        ) {
            Ok(()) => debug!(binding = %binding, ordinal, request_id, "Sent reply"),
            Err(e) => {
                warn!(
                    endpoint = %self.config.name,
                    binding = %binding,
                    ordinal,
                    request_id,
                    error = %e,
                    "Failed to send reply"
                );
                self.close_binding(binding);
            }
        }
    }

    fn on_handler_error(&self, binding: BindingId, ordinal: u32, err: HandlerError) {
        warn!(
            endpoint = %self.config.name,
            binding = %binding,
            ordinal,
            error = %err,
            "Handler rejected request; closing binding"
        );
        self.close_binding(binding);
    }

    fn on_protocol_error(&self, binding: BindingId, err: ProtocolError) {
        warn!(
            endpoint = %self.config.name,
            binding = %binding,
            error = %err,
            "Protocol error; closing binding"
        );
        self.close_binding(binding);
    }

    fn on_error(&self, binding: BindingId, err: PipeError) {
        debug!(endpoint = %self.config.name, binding = %binding, reason = %err, "Binding lost");
        self.close_binding(binding);
    }

    fn close_binding(&self, binding: BindingId) -> bool {
        let removed = self.bindings.borrow_mut().remove(&binding);
        let Some(removed) = removed else {
            return false;
        };
        removed.reader.stop_and_close();
        removed.control.reject_all();
        debug!(endpoint = %self.config.name, binding = %binding, "Binding closed");
        true
    }
}
