//! # Handle Reader
//!
//! Watches one pipe handle and, on each readiness notification, drains every
//! message available at that moment before returning. Reports at most one
//! error, after which it is stopped for good.
//!
//! ```text
//! Idle ──start()──→ Watching ──stop() / peer closed / read failure──→ Stopped
//! ```

use pipe_types::{
    MessagePipe, PipeError, PipeHandle, PipeMessage, ReadResult, Signals, Watcher,
};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::{debug, error};

/// Invoked once per message read off the handle.
pub type ReadCallback = Box<dyn Fn(PipeMessage)>;

/// Invoked once when the handle can no longer be read.
pub type ErrorCallback = Box<dyn Fn(PipeError)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Idle,
    Watching,
    Stopped,
}

struct ReaderInner {
    handle: PipeHandle,
    on_read: ReadCallback,
    on_error: ErrorCallback,
    watcher: RefCell<Option<Box<dyn Watcher>>>,
    state: Cell<ReaderState>,
}

impl ReaderInner {
    fn on_ready(&self) {
        loop {
            if self.state.get() != ReaderState::Watching {
                return;
            }
            match self.handle.read_message() {
                ReadResult::ShouldWait => return,
                ReadResult::PeerClosed => {
                    debug!(handle = %self.handle.id(), "Peer closed pipe");
                    self.stop();
                    (self.on_error)(PipeError::PeerClosed);
                    return;
                }
                ReadResult::Failed(status) => {
                    error!(handle = %self.handle.id(), status, "Unexpected pipe read status");
                    self.stop();
                    (self.on_error)(PipeError::Unexpected(status));
                    return;
                }
                ReadResult::Message(message) => (self.on_read)(message),
            }
        }
    }

    fn stop(&self) {
        self.state.set(ReaderState::Stopped);
        // Take first: cancelling must not run while the cell is borrowed.
        let watcher = self.watcher.borrow_mut().take();
        if let Some(mut watcher) = watcher {
            watcher.cancel();
        }
    }
}

/// Reader attached to exactly one pipe handle.
pub struct HandleReader {
    inner: Rc<ReaderInner>,
}

impl HandleReader {
    pub fn new(handle: PipeHandle, on_read: ReadCallback, on_error: ErrorCallback) -> Self {
        Self {
            inner: Rc::new(ReaderInner {
                handle,
                on_read,
                on_error,
                watcher: RefCell::new(None),
                state: Cell::new(ReaderState::Idle),
            }),
        }
    }

    /// Begin watching for readability or peer closure.
    ///
    /// Only meaningful from `Idle`; a stopped reader is never restarted.
    pub fn start(&self) -> Result<(), PipeError> {
        if self.inner.state.get() != ReaderState::Idle {
            return Ok(());
        }

        let weak: Weak<ReaderInner> = Rc::downgrade(&self.inner);
        let watcher = self.inner.handle.watch(
            Signals::READABLE_OR_PEER_CLOSED,
            Rc::new(move |_signals: Signals| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_ready();
                }
            }),
        );

        match watcher {
            Ok(watcher) => {
                *self.inner.watcher.borrow_mut() = Some(watcher);
                self.inner.state.set(ReaderState::Watching);
                Ok(())
            }
            Err(e) => {
                self.inner.state.set(ReaderState::Stopped);
                Err(e)
            }
        }
    }

    /// Stop watching. Idempotent; the handle stays open.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Stop watching and close the handle.
    pub fn stop_and_close(&self) {
        self.inner.stop();
        self.inner.handle.close();
    }

    /// True unless the reader is actively watching.
    pub fn is_stopped(&self) -> bool {
        self.inner.state.get() != ReaderState::Watching
    }

    pub fn state(&self) -> ReaderState {
        self.inner.state.get()
    }

    pub fn handle(&self) -> &PipeHandle {
        &self.inner.handle
    }
}

impl Drop for HandleReader {
    fn drop(&mut self) {
        self.inner.stop();
    }
}
