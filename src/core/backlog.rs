//! Per-worker side channel for tasks rerouted around a wait cycle.
//!
//! When a sync delivery would close a detected cycle, the task lands here
//! instead of the normal queue. The owning worker drains the backlog on its
//! own thread only, including from inside a nested sync-call wait, which is
//! what breaks the deadlock: the parked worker still makes forward progress
//! without ever running two tasks concurrently.
//!
//! Backlog tasks are explicitly unordered relative to the normal queue and
//! may run interleaved with or ahead of it.

use parking_lot::Mutex;

use crate::core::task::Task;
use crate::engine::event::Event;

pub(crate) struct Backlog {
    pending: Mutex<Vec<Task>>,
    wake: Event,
}

impl Backlog {
    pub(crate) fn new() -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            wake: Event::new(),
        }
    }

    /// Append a task and signal the owning worker. Callable from any thread.
    pub(crate) fn push(&self, task: Task) {
        self.pending.lock().push(task);
        self.wake.set();
    }

    /// Atomically swap out the whole pending list.
    ///
    /// The wake is reset *before* the swap: a concurrent push either lands
    /// in the taken batch or re-signals afterwards, so a signal is never
    /// lost while an entry sits unobserved.
    pub(crate) fn take_all(&self) -> Vec<Task> {
        self.wake.reset();
        std::mem::take(&mut *self.pending.lock())
    }

    /// The wake event a parked sync call includes in its dual wait.
    pub(crate) fn wake_event(&self) -> &Event {
        &self.wake
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.lock().len()
    }
}
