//! FIFO task-queue primitive.
//!
//! Workers own their queue exclusively; the only cross-thread touches are
//! explicit and locked. [`FifoQueue`] is the built-in in-memory
//! implementation; the SDK's production engines supply their own
//! [`TaskQueue`] wired into their event loops.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::ThreadId;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::warn;

use crate::core::error::WorkerError;
use crate::core::task::Task;

/// Point-in-time view of a queue's performance counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounters {
    /// Tasks accepted for delivery.
    pub enqueued: u64,
    /// Tasks handed to an executing thread.
    pub executed: u64,
    /// Tasks dropped without running (cancel, close, overflow).
    pub discarded: u64,
    /// Tasks currently waiting.
    pub pending: usize,
}

/// The FIFO task-queue primitive a worker pumps.
pub trait TaskQueue: Send + Sync {
    /// Enqueue a task for execution on the owning worker's thread.
    fn async_call(&self, task: Task) -> Result<(), WorkerError>;

    /// Close the queue: refuse new submissions, keep already-queued tasks
    /// available for the final drain.
    fn close(&self);

    /// Execute, on the *calling* thread, every pending task whose
    /// origin chain contains `thread`. Used during cancel-time cycle
    /// handling, when the canceller must pump the target's queue on its
    /// behalf instead of waiting passively. Returns how many tasks ran.
    fn poll_tasks(&self, thread: ThreadId) -> usize;

    /// Block until the queue reports empty or the timeout elapses.
    /// Returns whether it was observed empty.
    fn wait_empty(&self, timeout: Duration) -> bool;

    /// Bound the number of pending tasks; `0` means unbounded.
    fn set_capacity(&self, capacity: usize);

    /// Discard every pending task without running it. Returns the count.
    fn discard_pending(&self) -> usize;

    /// Current counter snapshot.
    fn counters(&self) -> QueueCounters;
}

/// Outcome of a blocking dequeue attempt.
#[derive(Debug)]
pub(crate) enum Dequeue {
    /// A task is ready to run.
    Task(Task),
    /// Woken without a task; re-check loop conditions.
    Woken,
    /// Queue closed and fully drained.
    Closed,
}

struct FifoInner {
    tasks: VecDeque<Task>,
    closed: bool,
    capacity: usize,
    wake_seq: u64,
}

/// In-memory FIFO queue backed by a mutex-protected deque and a condvar.
pub struct FifoQueue {
    inner: Mutex<FifoInner>,
    cond: Condvar,
    enqueued: AtomicU64,
    executed: AtomicU64,
    discarded: AtomicU64,
}

impl FifoQueue {
    /// Create an open, unbounded queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(FifoInner {
                tasks: VecDeque::new(),
                closed: false,
                capacity: 0,
                wake_seq: 0,
            }),
            cond: Condvar::new(),
            enqueued: AtomicU64::new(0),
            executed: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    /// Block until a task arrives, a wake is requested, or the queue is
    /// closed and drained.
    pub(crate) fn take(&self) -> Dequeue {
        let mut inner = self.inner.lock();
        loop {
            if let Some(task) = inner.tasks.pop_front() {
                self.executed.fetch_add(1, Ordering::Relaxed);
                if inner.tasks.is_empty() {
                    self.cond.notify_all();
                }
                return Dequeue::Task(task);
            }
            if inner.closed {
                return Dequeue::Closed;
            }
            let seq = inner.wake_seq;
            self.cond.wait(&mut inner);
            if inner.wake_seq != seq {
                return Dequeue::Woken;
            }
        }
    }

    /// Dequeue without blocking.
    pub(crate) fn try_take(&self) -> Option<Task> {
        let mut inner = self.inner.lock();
        let task = inner.tasks.pop_front();
        if task.is_some() {
            self.executed.fetch_add(1, Ordering::Relaxed);
            if inner.tasks.is_empty() {
                self.cond.notify_all();
            }
        }
        task
    }

    /// Wake any thread blocked in [`FifoQueue::take`] so it can re-check
    /// its loop conditions (engine break, shutdown).
    pub(crate) fn wake(&self) {
        let mut inner = self.inner.lock();
        inner.wake_seq = inner.wake_seq.wrapping_add(1);
        self.cond.notify_all();
    }
}

impl Default for FifoQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue for FifoQueue {
    fn async_call(&self, task: Task) -> Result<(), WorkerError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(WorkerError::NotInitialized);
        }
        if inner.capacity > 0 && inner.tasks.len() >= inner.capacity {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            warn!(
                capacity = inner.capacity,
                location = %task.location(),
                "task queue capacity exceeded, rejecting submission"
            );
            return Err(WorkerError::Internal(format!(
                "queue capacity {} exceeded",
                inner.capacity
            )));
        }
        inner.tasks.push_back(task);
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        self.cond.notify_all();
        Ok(())
    }

    fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        self.cond.notify_all();
    }

    fn poll_tasks(&self, thread: ThreadId) -> usize {
        let picked: Vec<Task> = {
            let mut inner = self.inner.lock();
            let mut keep = VecDeque::with_capacity(inner.tasks.len());
            let mut picked = Vec::new();
            while let Some(task) = inner.tasks.pop_front() {
                if task.origin_chain().contains(&thread) {
                    picked.push(task);
                } else {
                    keep.push_back(task);
                }
            }
            inner.tasks = keep;
            if inner.tasks.is_empty() && !picked.is_empty() {
                self.cond.notify_all();
            }
            picked
        };
        let count = picked.len();
        for task in picked {
            self.executed.fetch_add(1, Ordering::Relaxed);
            task.run();
        }
        count
    }

    fn wait_empty(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        while !inner.tasks.is_empty() {
            if self.cond.wait_until(&mut inner, deadline).timed_out() {
                return inner.tasks.is_empty();
            }
        }
        true
    }

    fn set_capacity(&self, capacity: usize) {
        self.inner.lock().capacity = capacity;
    }

    fn discard_pending(&self) -> usize {
        let dropped: Vec<Task> = {
            let mut inner = self.inner.lock();
            let dropped = inner.tasks.drain(..).collect();
            self.cond.notify_all();
            dropped
        };
        let count = dropped.len();
        self.discarded.fetch_add(count as u64, Ordering::Relaxed);
        // Dropping outside the lock lets sync-call completion guards abort
        // their slots without contending on the queue.
        drop(dropped);
        count
    }

    fn counters(&self) -> QueueCounters {
        QueueCounters {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            executed: self.executed.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            pending: self.inner.lock().tasks.len(),
        }
    }
}
