//! Invoker bookkeeping and wait-cycle detection.
//!
//! Every in-flight sync call registers a *potential* invoker on its target
//! worker for the call's whole duration; while the task body physically
//! executes, an *actual* invoker is additionally pushed on the callee's
//! stack. Cycle detection is a reachability question over the potential
//! relation: "is the target's thread already, transitively, waiting on me?"
//! If so, delivering normally and blocking would close the cycle, and the
//! caller reroutes the task into the target's backlog instead.
//!
//! Each tracker has its own lock and the traversal never holds two tracker
//! locks at once: it snapshots one tracker, releases, then follows the
//! snapshot. That keeps the component that exists to prevent deadlocks from
//! introducing a lower-level one of its own. The traversal carries a visited
//! set because legitimate cycles already exist once one hop has been
//! resolved via backlog.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Weak};
use std::thread::ThreadId;

use parking_lot::Mutex;

use crate::core::location::Location;
use crate::core::worker::WorkerCore;

/// One worker (or plain thread) waiting on another via a sync call.
#[derive(Clone)]
pub(crate) struct Invoker {
    /// Submission site of the sync call, diagnostics only.
    pub location: Location,
    /// Thread issuing the call.
    pub thread: ThreadId,
    /// The calling thread's worker, when it has one. Weak: an invoker
    /// record must never keep a worker alive.
    pub worker: Weak<WorkerCore>,
}

#[derive(Default)]
struct TrackerInner {
    /// In-flight sync calls targeting this worker, keyed by call id.
    potential: Vec<(u64, Invoker)>,
    /// Live call stack: invokers whose task body is executing right now.
    actual: Vec<Invoker>,
}

/// Per-worker invoker sets. Internally locked; shared only through the
/// explicit add/remove and snapshot operations.
#[derive(Default)]
pub(crate) struct InvokerTracker {
    inner: Mutex<TrackerInner>,
}

impl InvokerTracker {
    pub(crate) fn add_potential(&self, call_id: u64, invoker: Invoker) {
        self.inner.lock().potential.push((call_id, invoker));
    }

    pub(crate) fn remove_potential(&self, call_id: u64) {
        self.inner.lock().potential.retain(|(id, _)| *id != call_id);
    }

    pub(crate) fn potential_len(&self) -> usize {
        self.inner.lock().potential.len()
    }

    pub(crate) fn push_actual(&self, invoker: Invoker) {
        self.inner.lock().actual.push(invoker);
    }

    pub(crate) fn pop_actual(&self) {
        self.inner.lock().actual.pop();
    }

    /// Whether `thread` has a live task body executing on this worker.
    pub(crate) fn invoker_is(&self, thread: ThreadId) -> bool {
        self.inner
            .lock()
            .actual
            .iter()
            .any(|invoker| invoker.thread == thread)
    }

    pub(crate) fn actual_depth(&self) -> usize {
        self.inner.lock().actual.len()
    }

    fn potential_snapshot(&self) -> Vec<(ThreadId, Weak<WorkerCore>)> {
        self.inner
            .lock()
            .potential
            .iter()
            .map(|(_, invoker)| (invoker.thread, invoker.worker.clone()))
            .collect()
    }

    fn actual_snapshot(&self) -> Vec<(ThreadId, Weak<WorkerCore>)> {
        self.inner
            .lock()
            .actual
            .iter()
            .map(|invoker| (invoker.thread, invoker.worker.clone()))
            .collect()
    }
}

/// Removes a potential-invoker registration exactly once, on every exit
/// path of a sync call: success, reroute, abort, or timeout.
pub(crate) struct PotentialGuard<'a> {
    tracker: &'a InvokerTracker,
    call_id: u64,
}

impl<'a> PotentialGuard<'a> {
    pub(crate) fn new(tracker: &'a InvokerTracker, call_id: u64) -> Self {
        Self { tracker, call_id }
    }
}

impl Drop for PotentialGuard<'_> {
    fn drop(&mut self) {
        self.tracker.remove_potential(self.call_id);
    }
}

/// Would waiting on `start` eventually loop back to `thread`?
///
/// Breadth traversal over the potential-invoker relation: each invoker of
/// `start` is either `thread` itself or a worker whose own invokers are
/// followed transitively.
pub(crate) fn invoker_contains(start: &Arc<WorkerCore>, thread: ThreadId) -> bool {
    let mut visited: HashSet<usize> = HashSet::new();
    visited.insert(Arc::as_ptr(start) as usize);
    let mut frontier: VecDeque<Arc<WorkerCore>> = VecDeque::new();
    frontier.push_back(Arc::clone(start));

    while let Some(worker) = frontier.pop_front() {
        for (invoker_thread, invoker_worker) in worker.invokers.potential_snapshot() {
            if invoker_thread == thread {
                return true;
            }
            if let Some(next) = invoker_worker.upgrade() {
                if visited.insert(Arc::as_ptr(&next) as usize) {
                    frontier.push_back(next);
                }
            }
        }
    }
    false
}

/// Threads above `worker` in the live call stack: the actual invokers of
/// `worker`, transitively. Excludes the current thread itself.
pub(crate) fn invocation_chain(worker: Option<&Arc<WorkerCore>>) -> Vec<ThreadId> {
    let mut chain = Vec::new();
    let Some(start) = worker else {
        return chain;
    };
    let mut visited: HashSet<usize> = HashSet::new();
    visited.insert(Arc::as_ptr(start) as usize);
    let mut frontier: VecDeque<Arc<WorkerCore>> = VecDeque::new();
    frontier.push_back(Arc::clone(start));

    while let Some(current) = frontier.pop_front() {
        for (invoker_thread, invoker_worker) in current.invokers.actual_snapshot() {
            chain.push(invoker_thread);
            if let Some(next) = invoker_worker.upgrade() {
                if visited.insert(Arc::as_ptr(&next) as usize) {
                    frontier.push_back(next);
                }
            }
        }
    }
    chain
}
