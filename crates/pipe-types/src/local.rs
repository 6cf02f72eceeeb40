//! # In-Process Message Pipe
//!
//! A pipe pair living in one thread. Writes queue into the peer's inbox and
//! readiness notifications are delivered as tasks on the current tokio
//! [`LocalSet`](tokio::task::LocalSet), never synchronously from inside the
//! write. Callers must therefore drive endpoints within a `LocalSet`.
//!
//! At most one notification per endpoint is outstanding at a time; a
//! watcher is expected to drain the inbox when notified.

use crate::errors::PipeError;
use crate::pipe::{
    HandleId, MessagePipe, PipeHandle, PipeMessage, RawHandle, ReadResult, Signals,
    WatchCallback, Watcher,
};
use bytes::Bytes;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Status reported when reading from a handle that was closed locally.
pub const RESULT_INVALID_ARGUMENT: u32 = 3;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

struct WatchSlot {
    token: u64,
    signals: Signals,
    callback: WatchCallback,
}

#[derive(Default)]
struct EndState {
    inbox: VecDeque<PipeMessage>,
    closed: bool,
    watch: Option<WatchSlot>,
    notify_scheduled: bool,
}

#[derive(Default)]
struct PairState {
    ends: [EndState; 2],
    next_token: u64,
}

impl PairState {
    /// Signals currently satisfied for the watcher on `side`, if any.
    fn ready(&self, side: usize) -> Option<(Signals, WatchCallback)> {
        let end = &self.ends[side];
        let slot = end.watch.as_ref()?;
        let readable = slot.signals.readable && !end.inbox.is_empty();
        // A readable watch also fires once readability becomes impossible.
        let peer_closed = self.ends[1 - side].closed
            && (slot.signals.peer_closed || slot.signals.readable);
        if !readable && !peer_closed {
            return None;
        }
        Some((
            Signals {
                readable,
                peer_closed,
            },
            slot.callback.clone(),
        ))
    }
}

/// One endpoint of an in-process pipe pair.
pub struct LocalPipe {
    pair: Rc<RefCell<PairState>>,
    side: usize,
    id: HandleId,
}

/// Create a connected pipe pair.
pub fn create_message_pipe() -> (PipeHandle, PipeHandle) {
    let (a, b) = LocalPipe::pair();
    (a as PipeHandle, b as PipeHandle)
}

impl LocalPipe {
    /// Create a connected pair, keeping the concrete type.
    pub fn pair() -> (Rc<LocalPipe>, Rc<LocalPipe>) {
        let pair = Rc::new(RefCell::new(PairState::default()));
        let a = Rc::new(LocalPipe {
            pair: pair.clone(),
            side: 0,
            id: HandleId(NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed)),
        });
        let b = Rc::new(LocalPipe {
            pair,
            side: 1,
            id: HandleId(NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed)),
        });
        (a, b)
    }

    /// Number of messages waiting to be read on this endpoint.
    pub fn queued_messages(&self) -> usize {
        self.pair.borrow().ends[self.side].inbox.len()
    }

    fn peer(&self) -> usize {
        1 - self.side
    }
}

fn schedule_notify(pair: &Rc<RefCell<PairState>>, side: usize) {
    {
        let mut state = pair.borrow_mut();
        if state.ends[side].notify_scheduled || state.ready(side).is_none() {
            return;
        }
        state.ends[side].notify_scheduled = true;
    }

    let weak: Weak<RefCell<PairState>> = Rc::downgrade(pair);
    tokio::task::spawn_local(async move {
        let Some(pair) = weak.upgrade() else {
            return;
        };
        let ready = {
            let mut state = pair.borrow_mut();
            state.ends[side].notify_scheduled = false;
            state.ready(side)
        };
        if let Some((signals, callback)) = ready {
            trace!(side, ?signals, "Delivering pipe readiness");
            callback(signals);
        }
    });
}

impl MessagePipe for LocalPipe {
    fn id(&self) -> HandleId {
        self.id
    }

    fn write_message(&self, bytes: Bytes, handles: Vec<RawHandle>) -> Result<(), PipeError> {
        {
            let mut state = self.pair.borrow_mut();
            if state.ends[self.side].closed {
                return Err(PipeError::Closed(self.id.0));
            }
            let peer = &mut state.ends[self.peer()];
            if peer.closed {
                return Err(PipeError::PeerClosed);
            }
            peer.inbox.push_back(PipeMessage { bytes, handles });
        }
        schedule_notify(&self.pair, self.peer());
        Ok(())
    }

    fn read_message(&self) -> ReadResult {
        let mut state = self.pair.borrow_mut();
        if state.ends[self.side].closed {
            return ReadResult::Failed(RESULT_INVALID_ARGUMENT);
        }
        if let Some(message) = state.ends[self.side].inbox.pop_front() {
            return ReadResult::Message(message);
        }
        if state.ends[self.peer()].closed {
            return ReadResult::PeerClosed;
        }
        ReadResult::ShouldWait
    }

    fn watch(
        &self,
        signals: Signals,
        callback: WatchCallback,
    ) -> Result<Box<dyn Watcher>, PipeError> {
        let token = {
            let mut state = self.pair.borrow_mut();
            if state.ends[self.side].closed {
                return Err(PipeError::Closed(self.id.0));
            }
            let token = state.next_token;
            state.next_token += 1;
            state.ends[self.side].watch = Some(WatchSlot {
                token,
                signals,
                callback,
            });
            token
        };
        schedule_notify(&self.pair, self.side);

        Ok(Box::new(LocalWatcher {
            pair: Rc::downgrade(&self.pair),
            side: self.side,
            token,
            active: true,
        }))
    }

    fn close(&self) {
        {
            let mut state = self.pair.borrow_mut();
            let end = &mut state.ends[self.side];
            if end.closed {
                return;
            }
            end.closed = true;
            end.inbox.clear();
            end.watch = None;
        }
        schedule_notify(&self.pair, self.peer());
    }

    fn is_closed(&self) -> bool {
        self.pair.borrow().ends[self.side].closed
    }
}

struct LocalWatcher {
    pair: Weak<RefCell<PairState>>,
    side: usize,
    token: u64,
    active: bool,
}

impl Watcher for LocalWatcher {
    fn cancel(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        let Some(pair) = self.pair.upgrade() else {
            return;
        };
        let mut state = pair.borrow_mut();
        let end = &mut state.ends[self.side];
        if end.watch.as_ref().is_some_and(|slot| slot.token == self.token) {
            end.watch = None;
        }
    }
}

impl Drop for LocalWatcher {
    fn drop(&mut self) {
        self.cancel();
    }
}
