//! # Callback Router and Callback Target
//!
//! Multicast of incoming interface messages to a dynamic set of listeners.
//!
//! ```text
//! CallbackRouter                         CallbackTarget
//! ┌──────────────────────────┐           ┌─────────────────────────┐
//! │ listener id → target id  │──────────→│ listener id → listener  │
//! │ target id → listener set │  removal  │ dispatch / handler      │
//! └──────────────────────────┘           └─────────────────────────┘
//! ```
//!
//! The router owns the global id space and the reverse lookup used by
//! `remove_listener`; each target owns its listeners and only a weak
//! reference to the router.

use crate::error::{HandlerError, ListenerError};
use crate::handler::{HandlerResult, Reply};
use pipe_types::Value;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::debug;

/// Router-wide listener identifier. The first id handed out is 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TargetId(u64);

/// Listener callback. The returned reply is only used by request/response
/// dispatch.
pub type Listener = Rc<dyn Fn(&[Value]) -> HandlerResult>;

type ListenerSet = RefCell<BTreeMap<ListenerId, Listener>>;

#[derive(Default)]
struct RouterState {
    next_listener_id: u64,
    next_target_id: u64,
    owners: HashMap<ListenerId, TargetId>,
    targets: HashMap<TargetId, Weak<ListenerSet>>,
}

/// Owner of the listener id space.
#[derive(Clone, Default)]
pub struct CallbackRouter {
    state: Rc<RefCell<RouterState>>,
}

impl CallbackRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a listener from whichever target holds it.
    ///
    /// Returns true iff the listener was found and removed.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let listeners = {
            let mut state = self.state.borrow_mut();
            let Some(owner) = state.owners.remove(&id) else {
                return false;
            };
            state.targets.get(&owner).and_then(Weak::upgrade)
        };
        if let Some(listeners) = listeners {
            listeners.borrow_mut().remove(&id);
        }
        debug!(listener = %id, "Removed listener");
        true
    }

    pub fn listener_count(&self) -> usize {
        self.state.borrow().owners.len()
    }

    fn next_listener_id(&self) -> ListenerId {
        let mut state = self.state.borrow_mut();
        state.next_listener_id += 1;
        ListenerId(state.next_listener_id)
    }
}

/// Listener storage and dispatch for one interface.
pub struct CallbackTarget {
    id: TargetId,
    router: Weak<RefCell<RouterState>>,
    listeners: Rc<ListenerSet>,
}

impl CallbackTarget {
    pub fn new(router: &CallbackRouter) -> Self {
        let listeners: Rc<ListenerSet> = Rc::new(RefCell::new(BTreeMap::new()));
        let mut state = router.state.borrow_mut();
        let id = TargetId(state.next_target_id);
        state.next_target_id += 1;
        state.targets.insert(id, Rc::downgrade(&listeners));
        Self {
            id,
            router: Rc::downgrade(&router.state),
            listeners,
        }
    }

    /// Register `listener` under a fresh router-wide id.
    pub fn add_listener<F>(&self, listener: F) -> Result<ListenerId, ListenerError>
    where
        F: Fn(&[Value]) -> HandlerResult + 'static,
    {
        let state = self.router.upgrade().ok_or(ListenerError::RouterGone)?;
        let router = CallbackRouter { state };
        let id = router.next_listener_id();
        router.state.borrow_mut().owners.insert(id, self.id);
        self.listeners.borrow_mut().insert(id, Rc::new(listener));
        debug!(listener = %id, "Added listener");
        Ok(id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Invoke every listener in registration order, discarding replies.
    ///
    /// The first failing listener aborts the rest of the dispatch.
    pub fn dispatch(&self, args: &[Value]) -> Result<(), HandlerError> {
        dispatch(&self.listeners, args)
    }

    /// Invoke every listener; at most one may reply.
    pub fn dispatch_with_response(&self, args: &[Value]) -> HandlerResult {
        dispatch_with_response(&self.listeners, args)
    }

    /// Entry point to install with
    /// [`InterfaceTarget::register_handler`](crate::InterfaceTarget::register_handler).
    pub fn create_target_handler(
        &self,
        expects_response: bool,
    ) -> impl Fn(&[Value]) -> HandlerResult + 'static {
        let listeners = self.listeners.clone();
        move |args: &[Value]| {
            if expects_response {
                dispatch_with_response(&listeners, args)
            } else {
                dispatch(&listeners, args).map(|()| None)
            }
        }
    }
}

impl Drop for CallbackTarget {
    fn drop(&mut self) {
        let listeners = std::mem::take(&mut *self.listeners.borrow_mut());
        if let Some(state) = self.router.upgrade() {
            let mut state = state.borrow_mut();
            for id in listeners.keys() {
                state.owners.remove(id);
            }
            state.targets.remove(&self.id);
        }
    }
}

// Listeners may add or remove listeners while being dispatched to, so the
// set is snapshotted first.
fn snapshot(listeners: &ListenerSet) -> Vec<Listener> {
    listeners.borrow().values().cloned().collect()
}

fn dispatch(listeners: &ListenerSet, args: &[Value]) -> Result<(), HandlerError> {
    for listener in snapshot(listeners) {
        listener(args)?;
    }
    Ok(())
}

fn dispatch_with_response(listeners: &ListenerSet, args: &[Value]) -> HandlerResult {
    let replies = snapshot(listeners)
        .into_iter()
        .map(|listener| listener(args))
        .collect::<Result<Vec<Option<Reply>>, HandlerError>>()?;

    let mut replies: Vec<Reply> = replies.into_iter().flatten().collect();
    if replies.len() > 1 {
        return Err(ListenerError::MultipleResponders {
            count: replies.len(),
        }
        .into());
    }
    Ok(replies.pop())
}
