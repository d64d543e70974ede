//! Type-erased deferred closures flowing through queues and backlogs.

use std::fmt;
use std::thread::ThreadId;

use crate::core::location::Location;

/// Boxed fire-and-forget closure, the unit of work a worker executes.
pub type TaskFn = Box<dyn FnOnce() + Send + 'static>;

/// A deferred closure plus the provenance the scheduler carries with it.
///
/// Sync tasks additionally carry a unique monotonic id and a snapshot of the
/// calling thread's invocation chain; the chain is what lets
/// [`TaskQueue::poll_tasks`](crate::engine::TaskQueue::poll_tasks) pick out,
/// during cancellation, exactly the tasks the polling thread is responsible
/// for.
pub struct Task {
    body: TaskFn,
    location: Location,
    sync_id: Option<u64>,
    origin_chain: Vec<ThreadId>,
}

impl Task {
    /// Wrap a closure submitted from the current thread.
    pub fn new<F>(location: Location, body: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            body: Box::new(body),
            location,
            sync_id: None,
            origin_chain: vec![std::thread::current().id()],
        }
    }

    /// Wrap a sync-call closure carrying its call id and the caller's
    /// invocation-chain snapshot.
    pub(crate) fn for_sync_call<F>(
        location: Location,
        sync_id: u64,
        origin_chain: Vec<ThreadId>,
        body: F,
    ) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            body: Box::new(body),
            location,
            sync_id: Some(sync_id),
            origin_chain,
        }
    }

    /// Consume the task and run its body on the current thread.
    pub fn run(self) {
        (self.body)();
    }

    /// Submission site of this task.
    #[must_use]
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Monotonic id for sync tasks, `None` for fire-and-forget ones.
    #[must_use]
    pub fn sync_id(&self) -> Option<u64> {
        self.sync_id
    }

    /// Threads in the submitting call chain, innermost first.
    #[must_use]
    pub fn origin_chain(&self) -> &[ThreadId] {
        &self.origin_chain
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("location", &self.location)
            .field("sync_id", &self.sync_id)
            .field("origin_chain", &self.origin_chain)
            .finish_non_exhaustive()
    }
}
