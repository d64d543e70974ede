//! Waitable events with multi-event wait support.
//!
//! A sync call parks on *two* conditions at once: its own completion and the
//! calling worker's backlog wake. [`Event::wait_any`] supports that dual wait
//! without polling: each waiting thread registers a shared wait node with
//! every event, and whichever event fires first notifies the node's own
//! condvar.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// A manually-reset waitable event.
///
/// Clones share the same underlying state, so an `Event` can be handed to a
/// signaling thread while waiters keep their own handle.
#[derive(Clone, Default)]
pub struct Event {
    inner: Arc<EventInner>,
}

#[derive(Default)]
struct EventInner {
    state: Mutex<EventState>,
    cond: Condvar,
}

#[derive(Default)]
struct EventState {
    set: bool,
    waiters: Vec<(Arc<WaitNode>, usize)>,
}

/// Per-`wait_any` registration shared across the waited events.
struct WaitNode {
    fired: Mutex<Option<usize>>,
    cond: Condvar,
}

impl WaitNode {
    fn new() -> Self {
        Self {
            fired: Mutex::new(None),
            cond: Condvar::new(),
        }
    }

    fn fire(&self, index: usize) {
        let mut fired = self.fired.lock();
        if fired.is_none() {
            *fired = Some(index);
        }
        self.cond.notify_all();
    }
}

impl Event {
    /// Create an unset event.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal the event, waking every current waiter. The event stays set
    /// until [`Event::reset`].
    pub fn set(&self) {
        let mut state = self.inner.state.lock();
        state.set = true;
        self.inner.cond.notify_all();
        for (node, index) in state.waiters.drain(..) {
            node.fire(index);
        }
    }

    /// Clear the signal. Registered multi-waiters stay registered.
    pub fn reset(&self) {
        self.inner.state.lock().set = false;
    }

    /// Whether the event is currently set.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.inner.state.lock().set
    }

    /// Block until the event is set or the timeout elapses. `None` waits
    /// forever. Returns whether the event was set.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.inner.state.lock();
        while !state.set {
            match deadline {
                Some(deadline) => {
                    if self
                        .inner
                        .cond
                        .wait_until(&mut state, deadline)
                        .timed_out()
                    {
                        return state.set;
                    }
                }
                None => self.inner.cond.wait(&mut state),
            }
        }
        true
    }

    /// Block until any of `events` is set or the timeout elapses.
    ///
    /// Returns the index of a set event, or `None` on timeout. With several
    /// events already set the lowest index wins.
    pub fn wait_any(events: &[&Event], timeout: Option<Duration>) -> Option<usize> {
        let node = Arc::new(WaitNode::new());
        for (index, event) in events.iter().enumerate() {
            let mut state = event.inner.state.lock();
            if state.set {
                drop(state);
                Self::deregister(events, &node);
                return Some(index);
            }
            state.waiters.push((Arc::clone(&node), index));
        }

        let deadline = timeout.map(|t| Instant::now() + t);
        let hit = {
            let mut fired = node.fired.lock();
            while fired.is_none() {
                match deadline {
                    Some(deadline) => {
                        if node.cond.wait_until(&mut fired, deadline).timed_out() {
                            break;
                        }
                    }
                    None => node.cond.wait(&mut fired),
                }
            }
            *fired
        };
        Self::deregister(events, &node);
        hit
    }

    fn deregister(events: &[&Event], node: &Arc<WaitNode>) {
        for event in events {
            event
                .inner
                .state
                .lock()
                .waiters
                .retain(|(waiter, _)| !Arc::ptr_eq(waiter, node));
        }
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event").field("set", &self.is_set()).finish()
    }
}
