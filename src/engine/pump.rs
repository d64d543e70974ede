//! Event-loop engine abstraction and the built-in pump implementation.
//!
//! Production builds inject libevent-backed engines through
//! [`EngineFactory`]; [`PumpEngine`] is the dependency-free default that
//! pumps a [`FifoQueue`] on the worker's thread and services delayed tasks
//! from a lazily-spawned timer thread.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::WorkerPriority;
use crate::core::task::Task;
use crate::engine::queue::{Dequeue, FifoQueue, TaskQueue};

/// The event-loop engine a worker thread runs.
///
/// `run` blocks on the worker's thread until [`EventEngine::break_loop`];
/// the remaining methods are callable from any thread.
pub trait EventEngine: Send + Sync {
    /// Pump tasks until the loop is broken or the queue closes.
    fn run(&self);

    /// Pump currently-available tasks without blocking, then return.
    /// Used by externally-driven workers (e.g. a UI loop).
    fn run_nonblock(&self);

    /// Make `run` return after the task it is currently executing.
    fn break_loop(&self);

    /// Schedule `task` for delivery to the worker's queue after `delay`.
    fn create_timer(&self, delay: Duration, task: Task);

    /// Apply the worker's scheduling priority to the loop's thread.
    fn set_priorities(&self, priority: WorkerPriority);
}

/// Constructor for a worker's queue/engine pair, invoked once per worker
/// with the worker's name.
pub type EngineFactory =
    Box<dyn FnOnce(&str) -> (Arc<dyn TaskQueue>, Arc<dyn EventEngine>) + Send>;

/// Factory producing the built-in [`FifoQueue`] + [`PumpEngine`] pair.
#[must_use]
pub fn default_engine_factory() -> EngineFactory {
    Box::new(|name| {
        let queue = Arc::new(FifoQueue::new());
        let engine = Arc::new(PumpEngine::new(Arc::clone(&queue), name));
        (queue, engine)
    })
}

/// Built-in engine: a blocking pump over a [`FifoQueue`].
pub struct PumpEngine {
    queue: Arc<FifoQueue>,
    name: String,
    stop: AtomicBool,
    timer_tx: Mutex<Option<Sender<TimerCmd>>>,
    timer_seq: AtomicU64,
}

enum TimerCmd {
    Schedule { due: Instant, seq: u64, task: Task },
}

struct TimerEntry {
    due: Instant,
    seq: u64,
    task: Task,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reversed so the BinaryHeap yields the earliest deadline first.
        other.due.cmp(&self.due).then(other.seq.cmp(&self.seq))
    }
}

impl PumpEngine {
    /// Create an engine pumping `queue`.
    #[must_use]
    pub fn new(queue: Arc<FifoQueue>, name: &str) -> Self {
        Self {
            queue,
            name: name.to_owned(),
            stop: AtomicBool::new(false),
            timer_tx: Mutex::new(None),
            timer_seq: AtomicU64::new(0),
        }
    }

    fn timer_sender(&self) -> Sender<TimerCmd> {
        let mut timer_tx = self.timer_tx.lock();
        if let Some(tx) = timer_tx.as_ref() {
            return tx.clone();
        }
        let (tx, rx) = unbounded::<TimerCmd>();
        let queue = Arc::clone(&self.queue);
        let name = self.name.clone();
        let spawned = thread::Builder::new()
            .name(format!("rtcw-timer-{name}"))
            .spawn(move || {
                let mut pending: BinaryHeap<TimerEntry> = BinaryHeap::new();
                loop {
                    let message = match pending.peek() {
                        Some(next) => {
                            let wait = next.due.saturating_duration_since(Instant::now());
                            rx.recv_timeout(wait)
                        }
                        None => rx
                            .recv()
                            .map_err(|_| RecvTimeoutError::Disconnected),
                    };
                    match message {
                        Ok(TimerCmd::Schedule { due, seq, task }) => {
                            pending.push(TimerEntry { due, seq, task });
                        }
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                    let now = Instant::now();
                    loop {
                        match pending.peek() {
                            Some(entry) if entry.due <= now => {}
                            _ => break,
                        }
                        if let Some(entry) = pending.pop() {
                            if let Err(error) = queue.async_call(entry.task) {
                                debug!(engine = %name, %error, "dropping expired timer task");
                            }
                        }
                    }
                }
                debug!(engine = %name, "timer thread exiting");
            });
        match spawned {
            Ok(_) => {
                *timer_tx = Some(tx.clone());
                tx
            }
            Err(error) => {
                warn!(engine = %self.name, %error, "failed to spawn timer thread");
                // Keep the receiver-less sender; sends become no-ops.
                tx
            }
        }
    }
}

impl EventEngine for PumpEngine {
    fn run(&self) {
        loop {
            if self.stop.load(Ordering::Acquire) {
                break;
            }
            match self.queue.take() {
                Dequeue::Task(task) => task.run(),
                Dequeue::Woken => {}
                Dequeue::Closed => break,
            }
        }
        debug!(engine = %self.name, "pump loop exited");
    }

    fn run_nonblock(&self) {
        while !self.stop.load(Ordering::Acquire) {
            match self.queue.try_take() {
                Some(task) => task.run(),
                None => break,
            }
        }
    }

    fn break_loop(&self) {
        self.stop.store(true, Ordering::Release);
        self.queue.wake();
    }

    fn create_timer(&self, delay: Duration, task: Task) {
        let seq = self.timer_seq.fetch_add(1, Ordering::Relaxed);
        let cmd = TimerCmd::Schedule {
            due: Instant::now() + delay,
            seq,
            task,
        };
        if self.timer_sender().send(cmd).is_err() {
            warn!(engine = %self.name, "timer thread unavailable, dropping delayed task");
        }
    }

    fn set_priorities(&self, priority: WorkerPriority) {
        // OS thread priorities are left to the embedder's engine; the pump
        // only records the request.
        debug!(engine = %self.name, ?priority, "thread priority requested");
    }
}
