//! # Interface Support - Typed Endpoints over Message Pipes
//!
//! Turns a raw, bidirectional, message-oriented pipe into request/response
//! and event-dispatch semantics.
//!
//! ## Roles
//!
//! ```text
//! ┌──────────────────┐   request (expects response)   ┌──────────────────┐
//! │  InterfaceProxy  │ ─────────────────────────────→ │ InterfaceTarget  │
//! │                  │                                │                  │
//! │ pending registry │ ←───────────────────────────── │  handler table   │
//! └──────────────────┘   reply (is response)          └──────────────────┘
//!          ↑                                                   │
//!     HandleReader                                        HandleReader
//!  ControlMessageHandler                              ControlMessageHandler
//! ```
//!
//! A [`CallbackTarget`] installed as a handler multicasts messages to a
//! dynamic listener set managed through a [`CallbackRouter`].
//!
//! ## Execution Model
//!
//! Single-threaded and readiness-driven. Endpoints must be driven from a
//! tokio [`LocalSet`](tokio::task::LocalSet): pipe notifications and
//! deferred handler replies run as local tasks.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod callback;
pub mod config;
pub mod control;
pub mod error;
pub mod handler;
pub mod pending;
pub mod proxy;
pub mod reader;
pub mod target;

pub use callback::{CallbackRouter, CallbackTarget, Listener, ListenerId};
pub use config::{ConfigError, EndpointConfig, UnknownControlPolicy};
pub use control::{ControlMessageHandler, RunInput, RUN_MESSAGE_ID};
pub use error::{HandlerError, InterfaceError, ListenerError, ProtocolError};
pub use handler::{HandlerFn, HandlerResult, MessageHandler, Reply};
pub use pending::{PendingRegistry, PendingResponse, PendingStats, ResponseFuture, ResponseResult};
pub use proxy::InterfaceProxy;
pub use reader::{HandleReader, ReaderState};
pub use target::{BindingId, InterfaceTarget, WeakInterfaceTarget};
