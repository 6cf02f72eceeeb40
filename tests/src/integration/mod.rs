//! # Integration Scenarios
//!
//! Proxies and targets wired together over [`LocalPipe`](pipe_types::LocalPipe)
//! pairs. Every scenario runs inside a tokio `LocalSet`, which delivers pipe
//! notifications.

pub mod callbacks;
pub mod flush;
pub mod reply_order;
pub mod request_response;

use interface_support::{
    BindingId, EndpointConfig, InterfaceError, InterfaceProxy, InterfaceTarget, Reply,
};
use pipe_types::{
    create_message_pipe, deserialize_message_header, serialize_and_send_message, FieldKind,
    MessageFlags, MessageHeader, MessagePipe, PipeHandle, ReadResult, SendError, SpecRef,
    StructSpec, StructValue, Value,
};
use std::future::Future;
use std::time::Duration;

/// Ordinal of the `Add(a, b) => (sum)` request.
pub const ADD: u32 = 3;

/// Ordinal of the fire-and-forget `Ping(a, b)` message.
pub const PING: u32 = 1;

pub fn add_params() -> SpecRef {
    StructSpec::new("AddParams")
        .field("a", FieldKind::Int32)
        .field("b", FieldKind::Int32)
        .build()
}

pub fn add_response() -> SpecRef {
    StructSpec::new("AddResponseParams")
        .field("sum", FieldKind::Int32)
        .build()
}

pub fn args(a: i32, b: i32) -> Vec<Value> {
    vec![Value::Int32(a), Value::Int32(b)]
}

pub fn sum_of(value: &StructValue) -> Option<i32> {
    value.get("sum").and_then(Value::as_i32)
}

/// Target answering `Add` immediately.
pub fn calculator() -> InterfaceTarget {
    let target = InterfaceTarget::new(EndpointConfig::named("calculator"));
    target.register_handler(ADD, add_params(), Some(add_response()), |args: &[Value]| {
        let a = args[0].as_i32().unwrap_or_default();
        let b = args[1].as_i32().unwrap_or_default();
        Ok(Some(Reply::immediate(
            StructValue::new().with("sum", a + b),
        )))
    });
    target
}

/// Bind a fresh pipe between `target` and a new proxy.
pub fn connect(
    target: &InterfaceTarget,
) -> Result<(InterfaceProxy, BindingId), InterfaceError> {
    let (client, server) = create_message_pipe();
    let binding = target.bind_handle(server)?;
    let proxy = InterfaceProxy::with_handle(EndpointConfig::named("client"), client)?;
    Ok((proxy, binding))
}

/// Bind a proxy to one end of a fresh pipe and hand back the raw other end.
pub fn connect_raw() -> Result<(InterfaceProxy, PipeHandle), InterfaceError> {
    let (client, peer) = create_message_pipe();
    let proxy = InterfaceProxy::with_handle(EndpointConfig::named("client"), client)?;
    Ok((proxy, peer))
}

/// Header of the next message queued on a raw peer handle, if any.
pub fn read_header(peer: &PipeHandle) -> Option<MessageHeader> {
    match peer.read_message() {
        ReadResult::Message(message) => deserialize_message_header(&message.bytes).ok(),
        _ => None,
    }
}

/// Answer as a raw peer with an `AddResponseParams` reply.
pub fn write_reply(
    peer: &PipeHandle,
    ordinal: u32,
    request_id: u64,
    sum: i32,
) -> Result<(), SendError> {
    serialize_and_send_message(
        peer.as_ref(),
        ordinal,
        request_id,
        MessageFlags::IS_RESPONSE,
        &add_response(),
        &StructValue::new().with("sum", sum),
    )
}

/// Let queued local tasks run.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Await `future`, giving up after one second.
pub async fn within<F: Future>(future: F) -> Result<F::Output, tokio::time::error::Elapsed> {
    tokio::time::timeout(Duration::from_secs(1), future).await
}
