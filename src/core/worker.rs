//! Worker lifecycle and the async/sync/invoke submission protocol.
//!
//! A [`Worker`] owns one logical thread of execution: a dedicated OS thread
//! pumping an injected event-loop engine over a FIFO task queue, or an
//! externally-driven loop (e.g. a UI thread) that pumps the worker itself.
//! A worker never executes two tasks concurrently; reentrancy exists only
//! through the explicit backlog drain performed while parked inside a sync
//! call.
//!
//! # Sync-call protocol
//!
//! `sync_call` from a foreign thread registers a potential invoker on the
//! target, runs the cycle check, delivers the task through the normal queue
//! or (on a detected cycle) the target's backlog, then blocks on a dual
//! wait: its own backlog wake and the call's completion. Whenever the
//! backlog wakes, the parked caller drains it inline, which is what keeps a
//! ring of mutually-waiting workers making forward progress.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::core::audit::{TaskRecord, WorkerAuditor};
use crate::core::backlog::Backlog;
use crate::core::error::WorkerError;
use crate::core::invoker::{
    invocation_chain, invoker_contains, Invoker, InvokerTracker, PotentialGuard,
};
use crate::core::location::Location;
use crate::core::task::{Task, TaskFn};
use crate::engine::event::Event;
use crate::engine::pump::{default_engine_factory, EngineFactory, EventEngine};
use crate::engine::queue::{QueueCounters, TaskQueue};
use crate::util::clock::now_ms;

thread_local! {
    static CURRENT_WORKER: RefCell<Option<Weak<WorkerCore>>> = const { RefCell::new(None) };
}

/// The worker the current thread belongs to, if any.
pub(crate) fn current_worker() -> Option<Arc<WorkerCore>> {
    CURRENT_WORKER.with(|cell| cell.borrow().as_ref().and_then(Weak::upgrade))
}

fn set_current_worker(worker: Option<Weak<WorkerCore>>) {
    CURRENT_WORKER.with(|cell| *cell.borrow_mut() = worker);
}

/// Lifecycle of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerState {
    /// Constructed but unusable (no engine factory, or spawn failed).
    Created,
    /// Accepting and executing tasks.
    Running,
    /// `cancel` in progress; returns to `Running` afterwards.
    Cancelling,
    /// One-shot `stop` in progress.
    Stopping,
    /// Terminal.
    Stopped,
}

/// Hooks and flags applied at worker creation.
pub struct WorkerOptions {
    /// Worker configuration (name, priority, budgets).
    pub config: WorkerConfig,
    /// Runs first on the worker's thread, before any task.
    pub on_start: Option<TaskFn>,
    /// Runs last on the worker's thread during `stop`.
    pub on_stop: Option<TaskFn>,
    /// Do not spawn a thread; an outside driver pumps the worker.
    pub external_thread: bool,
}

impl WorkerOptions {
    /// Default options for a worker with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            config: WorkerConfig::new(name),
            on_start: None,
            on_stop: None,
            external_thread: false,
        }
    }
}

pub(crate) struct WorkerCore {
    pub(crate) name: String,
    config: WorkerConfig,
    state: Mutex<WorkerState>,
    queue: Option<Arc<dyn TaskQueue>>,
    engine: Option<Arc<dyn EventEngine>>,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
    thread_id: RwLock<Option<ThreadId>>,
    external: bool,
    on_start: Mutex<Option<TaskFn>>,
    on_stop: Mutex<Option<TaskFn>>,
    pub(crate) invokers: InvokerTracker,
    backlog: Backlog,
    auditor: Mutex<WorkerAuditor>,
    sync_seq: AtomicU64,
    active_depth: AtomicU32,
    drain_depth: AtomicU32,
    rerouted: AtomicU64,
}

/// Result slot a sync call parks on.
struct SyncSlot<R> {
    state: Mutex<SlotState<R>>,
    done: Event,
}

struct SlotState<R> {
    value: Option<R>,
    completed: bool,
    aborted: bool,
}

enum SlotPoll<R> {
    Done(R),
    Aborted,
    Pending,
}

impl<R> SyncSlot<R> {
    fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                value: None,
                completed: false,
                aborted: false,
            }),
            done: Event::new(),
        }
    }

    fn complete(&self, value: R) {
        {
            let mut state = self.state.lock();
            state.value = Some(value);
            state.completed = true;
        }
        self.done.set();
    }

    fn abort(&self) {
        {
            let mut state = self.state.lock();
            if state.completed {
                return;
            }
            state.aborted = true;
        }
        self.done.set();
    }

    fn poll(&self) -> SlotPoll<R> {
        let mut state = self.state.lock();
        if let Some(value) = state.value.take() {
            SlotPoll::Done(value)
        } else if state.aborted {
            SlotPoll::Aborted
        } else {
            SlotPoll::Pending
        }
    }

    fn done_event(&self) -> &Event {
        &self.done
    }
}

/// Signals abandonment to the parked caller if the task is dropped without
/// running (queue discarded or closed).
struct SlotGuard<R>(Arc<SyncSlot<R>>);

impl<R> Drop for SlotGuard<R> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Restores invoker and execution bookkeeping on every exit path of a task
/// body, panics included.
struct RunGuard<'a> {
    core: &'a WorkerCore,
    pop_actual: bool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if self.pop_actual {
            self.core.invokers.pop_actual();
        }
        self.core.active_depth.fetch_sub(1, Ordering::SeqCst);
    }
}

impl WorkerCore {
    fn dead(config: WorkerConfig) -> Self {
        Self {
            name: config.name.clone(),
            config,
            state: Mutex::new(WorkerState::Created),
            queue: None,
            engine: None,
            thread: Mutex::new(None),
            thread_id: RwLock::new(None),
            external: false,
            on_start: Mutex::new(None),
            on_stop: Mutex::new(None),
            invokers: InvokerTracker::default(),
            backlog: Backlog::new(),
            auditor: Mutex::new(WorkerAuditor::default()),
            sync_seq: AtomicU64::new(1),
            active_depth: AtomicU32::new(0),
            drain_depth: AtomicU32::new(0),
            rerouted: AtomicU64::new(0),
        }
    }

    fn queue(&self) -> Result<&Arc<dyn TaskQueue>, WorkerError> {
        self.queue.as_ref().ok_or(WorkerError::NotInitialized)
    }

    fn is_valid(&self) -> bool {
        if self.queue.is_none() {
            return false;
        }
        if !matches!(
            *self.state.lock(),
            WorkerState::Running | WorkerState::Cancelling
        ) {
            return false;
        }
        self.external || self.thread.lock().is_some()
    }

    fn ensure_valid(&self) -> Result<(), WorkerError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(WorkerError::NotInitialized)
        }
    }

    fn is_current_thread(&self) -> bool {
        *self.thread_id.read() == Some(thread::current().id())
    }

    /// Execute one task body with full bookkeeping: execution depth, actual
    /// invoker push/pop, audit record, and the post-task backlog sweep.
    fn run_task(&self, location: &Location, invoker: Option<Invoker>, body: impl FnOnce()) {
        let queued_for = Duration::from_millis(u64::try_from(location.age_ms()).unwrap_or(u64::MAX));
        self.active_depth.fetch_add(1, Ordering::SeqCst);
        let pop_actual = invoker.is_some();
        if let Some(invoker) = invoker {
            self.invokers.push_actual(invoker);
        }
        let started = Instant::now();
        {
            let _guard = RunGuard {
                core: self,
                pop_actual,
            };
            body();
        }
        self.auditor.lock().record(TaskRecord {
            location: location.clone(),
            queued_for,
            ran_for: started.elapsed(),
            finished_at_ms: now_ms(),
        });
        // Sweep entries rerouted here while this task ran. Only ever on the
        // owning thread.
        if self.is_current_thread() {
            self.drain_backlog();
        }
    }

    /// Run all backlogged tasks, in order, on the owning thread. Nested
    /// drains (a drained task issuing its own sync call) are bounded by the
    /// configured depth; entries beyond it wait for the outer pass.
    fn drain_backlog(&self) {
        if !self.is_current_thread() {
            return;
        }
        let depth = self.drain_depth.fetch_add(1, Ordering::SeqCst);
        if depth >= self.config.backlog_drain_depth {
            self.drain_depth.fetch_sub(1, Ordering::SeqCst);
            return;
        }
        loop {
            let batch = self.backlog.take_all();
            if batch.is_empty() {
                break;
            }
            debug!(worker = %self.name, count = batch.len(), "draining backlog");
            for task in batch {
                task.run();
            }
        }
        self.drain_depth.fetch_sub(1, Ordering::SeqCst);
    }

    fn wrap_async<F>(core: &Arc<Self>, location: Location, body: F) -> Task
    where
        F: FnOnce() + Send + 'static,
    {
        let weak = Arc::downgrade(core);
        let run_location = location.clone();
        Task::new(location, move || {
            if let Some(core) = weak.upgrade() {
                core.run_task(&run_location, None, body);
            }
        })
    }

    fn wrap_sync<R, F>(
        core: &Arc<Self>,
        location: Location,
        call_id: u64,
        invoker: Invoker,
        origin_chain: Vec<ThreadId>,
        slot: Arc<SyncSlot<R>>,
        body: F,
    ) -> Task
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        let weak = Arc::downgrade(core);
        let run_location = location.clone();
        let guard = SlotGuard(slot);
        Task::for_sync_call(location, call_id, origin_chain, move || {
            match weak.upgrade() {
                Some(target) => target.run_task(&run_location, Some(invoker), move || {
                    let value = body();
                    guard.0.complete(value);
                }),
                // Worker gone; the guard aborts the slot on drop.
                None => drop(guard),
            }
        })
    }

    /// Bounded, best-effort wait for the queue to empty and in-flight work
    /// to finish. When the target's thread is already transitively waiting
    /// on the caller, waiting passively would deadlock symmetrically, so
    /// the caller pumps the target's queue on its behalf instead.
    fn wait_inflights(&self) {
        if self.is_current_thread() {
            return;
        }
        let Some(queue) = self.queue.as_ref() else {
            return;
        };
        let me = thread::current().id();
        let helper = match (current_worker(), *self.thread_id.read()) {
            (Some(mine), Some(target)) => invoker_contains(&mine, target),
            _ => false,
        };
        let sleep = Duration::from_millis(self.config.cancel_wait_sleep_ms);
        for _ in 0..self.config.cancel_wait_attempts {
            if helper {
                let _ = queue.poll_tasks(me);
            }
            if queue.counters().pending == 0 && self.active_depth.load(Ordering::SeqCst) == 0 {
                return;
            }
            if helper {
                thread::sleep(sleep);
            } else {
                let _ = queue.wait_empty(sleep);
            }
        }
        warn!(
            worker = %self.name,
            "in-flight tasks did not drain within the cancel budget, proceeding"
        );
    }
}

impl Drop for WorkerCore {
    fn drop(&mut self) {
        let state = *self.state.lock();
        if matches!(state, WorkerState::Running | WorkerState::Cancelling) {
            if let Some(queue) = &self.queue {
                queue.close();
            }
            if let Some(engine) = &self.engine {
                engine.break_loop();
            }
            debug!(worker = %self.name, "worker dropped without stop, detaching thread");
        }
    }
}

/// Owner of one logical thread of execution and its task queue.
///
/// Cheap to clone; clones share the same underlying worker.
#[derive(Clone)]
pub struct Worker {
    core: Arc<WorkerCore>,
}

impl Worker {
    /// Create a worker.
    ///
    /// Spawns a dedicated thread running the injected engine until stopped,
    /// unless `options.external_thread` is set, in which case an outside
    /// driver pumps the worker via [`Worker::run_on_current_thread`] or
    /// [`Worker::pump`].
    ///
    /// Without an engine factory the worker is permanently unusable: every
    /// later call reports [`WorkerError::NotInitialized`].
    #[must_use]
    pub fn create(factory: Option<EngineFactory>, options: WorkerOptions) -> Self {
        let WorkerOptions {
            config,
            on_start,
            on_stop,
            external_thread,
        } = options;
        let Some(factory) = factory else {
            warn!(
                worker = %config.name,
                "no engine factory supplied, worker is permanently unusable"
            );
            return Self {
                core: Arc::new(WorkerCore::dead(config)),
            };
        };

        let (queue, engine) = factory(&config.name);
        queue.set_capacity(config.queue_capacity);
        engine.set_priorities(config.priority);

        let core = Arc::new(WorkerCore {
            name: config.name.clone(),
            config,
            state: Mutex::new(WorkerState::Created),
            queue: Some(queue),
            engine: Some(engine.clone()),
            thread: Mutex::new(None),
            thread_id: RwLock::new(None),
            external: external_thread,
            on_start: Mutex::new(on_start),
            on_stop: Mutex::new(on_stop),
            invokers: InvokerTracker::default(),
            backlog: Backlog::new(),
            auditor: Mutex::new(WorkerAuditor::default()),
            sync_seq: AtomicU64::new(1),
            active_depth: AtomicU32::new(0),
            drain_depth: AtomicU32::new(0),
            rerouted: AtomicU64::new(0),
        });

        if external_thread {
            *core.state.lock() = WorkerState::Running;
            return Self { core };
        }

        let ready = Event::new();
        let thread_ready = ready.clone();
        let weak = Arc::downgrade(&core);
        let spawned = thread::Builder::new()
            .name(format!("rtcw-{}", core.name))
            .spawn(move || {
                if let Some(core) = weak.upgrade() {
                    *core.thread_id.write() = Some(thread::current().id());
                }
                set_current_worker(Some(weak.clone()));
                thread_ready.set();
                let on_start = weak.upgrade().and_then(|core| core.on_start.lock().take());
                if let Some(hook) = on_start {
                    hook();
                }
                debug!("worker thread started");
                engine.run();
                set_current_worker(None);
                debug!("worker thread exiting");
            });
        match spawned {
            Ok(handle) => {
                *core.thread.lock() = Some(handle);
                *core.state.lock() = WorkerState::Running;
                // Make the thread id visible before the first submission.
                ready.wait(Some(Duration::from_secs(5)));
            }
            Err(error) => {
                warn!(worker = %core.name, %error, "failed to spawn worker thread");
            }
        }
        Self { core }
    }

    /// Create a worker named `name` with the built-in queue and pump engine.
    #[must_use]
    pub fn spawn(name: &str) -> Self {
        Self::create(Some(default_engine_factory()), WorkerOptions::new(name))
    }

    /// The worker the current thread belongs to, if any.
    #[must_use]
    pub fn current() -> Option<Self> {
        current_worker().map(|core| Self { core })
    }

    /// Enqueue a task and return immediately.
    ///
    /// Tasks submitted through the normal queue execute in FIFO order
    /// relative to each other, exactly once, on the worker's thread.
    pub fn async_call<F>(&self, location: Location, body: F) -> Result<(), WorkerError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.core.ensure_valid()?;
        let task = WorkerCore::wrap_async(&self.core, location, body);
        self.core.queue()?.async_call(task)
    }

    /// Run `body` on the worker's thread and block until it yields a value.
    ///
    /// Issued from the worker's own thread, the body executes inline with
    /// no enqueue and no block. Waits forever; see
    /// [`Worker::sync_call_timeout`] for a deadline.
    pub fn sync_call<R, F>(&self, location: Location, body: F) -> Result<R, WorkerError>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        self.sync_call_inner(location, body, None)
    }

    /// [`Worker::sync_call`] with a deadline.
    ///
    /// On timeout the already-delivered task is *not* retracted: it may
    /// still execute later, observed by no one. Callers must expect that
    /// asymmetry.
    pub fn sync_call_timeout<R, F>(
        &self,
        location: Location,
        body: F,
        timeout: Duration,
    ) -> Result<R, WorkerError>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        self.sync_call_inner(location, body, Some(timeout))
    }

    /// Run `body` inline when called from the worker's own thread,
    /// otherwise exactly like [`Worker::async_call`].
    ///
    /// Fire-and-forget either way; not a blocking call. Easy to confuse
    /// with [`Worker::sync_call`], which does block.
    pub fn invoke<F>(&self, location: Location, body: F) -> Result<(), WorkerError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.core.ensure_valid()?;
        if self.core.is_current_thread() {
            body();
            return Ok(());
        }
        self.async_call(location, body)
    }

    /// Schedule a fire-and-forget task after `delay`, via the injected
    /// timer. Outside the sync/backlog protocol entirely.
    pub fn delayed_async_call<F>(
        &self,
        location: Location,
        body: F,
        delay: Duration,
    ) -> Result<(), WorkerError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.core.ensure_valid()?;
        let engine = self.core.engine.as_ref().ok_or(WorkerError::NotInitialized)?;
        let task = WorkerCore::wrap_async(&self.core, location, body);
        engine.create_timer(delay, task);
        Ok(())
    }

    fn sync_call_inner<R, F>(
        &self,
        location: Location,
        body: F,
        timeout: Option<Duration>,
    ) -> Result<R, WorkerError>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        let core = &self.core;
        core.ensure_valid()?;
        if core.is_current_thread() {
            return Ok(body());
        }

        let call_id = core.sync_seq.fetch_add(1, Ordering::Relaxed);
        let caller = current_worker();
        let caller_thread = thread::current().id();
        let invoker = Invoker {
            location: location.clone(),
            thread: caller_thread,
            worker: caller.as_ref().map_or_else(Weak::new, Arc::downgrade),
        };

        // Registered for the whole call; the guard removes it exactly once
        // on every exit path.
        core.invokers.add_potential(call_id, invoker.clone());
        let _potential = PotentialGuard::new(&core.invokers, call_id);

        let mut origin_chain = vec![caller_thread];
        origin_chain.extend(invocation_chain(caller.as_ref()));

        let slot = Arc::new(SyncSlot::new());
        let task = WorkerCore::wrap_sync(
            core,
            location,
            call_id,
            invoker,
            origin_chain,
            Arc::clone(&slot),
            body,
        );

        let cycle = match (&caller, *core.thread_id.read()) {
            (Some(mine), Some(target)) => invoker_contains(mine, target),
            _ => false,
        };
        if cycle {
            core.rerouted.fetch_add(1, Ordering::Relaxed);
            debug!(
                worker = %core.name,
                location = %task.location(),
                "rerouting sync call to backlog to avoid wait cycle"
            );
            core.backlog.push(task);
        } else {
            core.queue()?.async_call(task)?;
        }

        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            match slot.poll() {
                SlotPoll::Done(value) => return Ok(value),
                SlotPoll::Aborted => {
                    return Err(WorkerError::Internal(
                        "task discarded before execution".into(),
                    ))
                }
                SlotPoll::Pending => {}
            }
            let remaining = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(WorkerError::Timeout);
                    }
                    Some(deadline - now)
                }
                None => None,
            };
            match &caller {
                Some(mine) => {
                    let woke = Event::wait_any(
                        &[slot.done_event(), mine.backlog.wake_event()],
                        remaining,
                    );
                    match woke {
                        // Work was rerouted to us while parked; run it here.
                        Some(1) => mine.drain_backlog(),
                        Some(_) => {}
                        None => return Err(WorkerError::Timeout),
                    }
                }
                None => {
                    if !slot.done_event().wait(remaining) {
                        return Err(WorkerError::Timeout);
                    }
                }
            }
        }
    }

    /// Discard every pending (undelivered) task, then wait, bounded, for
    /// in-flight work to finish. Reentrant-safe; the worker stays usable.
    ///
    /// A running task is never interrupted, and exhausting the wait budget
    /// is logged, not reported as an error.
    pub fn cancel(&self) {
        let core = &self.core;
        {
            let mut state = core.state.lock();
            match *state {
                WorkerState::Running => *state = WorkerState::Cancelling,
                _ => return,
            }
        }
        if let Some(queue) = &core.queue {
            let discarded = queue.discard_pending();
            debug!(worker = %core.name, discarded, "cancel discarded pending tasks");
        }
        core.wait_inflights();
        let mut state = core.state.lock();
        if *state == WorkerState::Cancelling {
            *state = WorkerState::Running;
        }
    }

    /// One-shot shutdown: drain like [`Worker::cancel`], run the stop hook
    /// on the worker's thread, break the loop, close the queue, and join
    /// the thread (skipped when called from the worker itself or for
    /// external-thread workers). Repeated calls are no-ops.
    pub fn stop(&self) {
        let core = &self.core;
        {
            let mut state = core.state.lock();
            match *state {
                WorkerState::Stopping | WorkerState::Stopped => return,
                WorkerState::Created => {
                    *state = WorkerState::Stopped;
                    return;
                }
                _ => *state = WorkerState::Stopping,
            }
        }
        info!(worker = %core.name, "stopping worker");
        if let Some(queue) = &core.queue {
            let discarded = queue.discard_pending();
            if discarded > 0 {
                debug!(worker = %core.name, discarded, "stop discarded pending tasks");
            }
        }
        core.wait_inflights();

        let hook = core.on_stop.lock().take();
        if let (Some(queue), Some(engine)) = (&core.queue, &core.engine) {
            let breaker = Arc::clone(engine);
            let stop_task = Task::new(Location::capture(), move || {
                if let Some(hook) = hook {
                    hook();
                }
                breaker.break_loop();
            });
            if queue.async_call(stop_task).is_err() {
                engine.break_loop();
            }
        } else if let Some(engine) = &core.engine {
            engine.break_loop();
        }

        let self_call = core.is_current_thread();
        if !core.external && !self_call {
            let handle = core.thread.lock().take();
            if let Some(handle) = handle {
                if handle.join().is_err() {
                    warn!(worker = %core.name, "worker thread panicked");
                }
            }
        }
        if let Some(queue) = &core.queue {
            queue.close();
        }
        *core.state.lock() = WorkerState::Stopped;
    }

    /// Drive an external-thread worker: attach the current thread as the
    /// worker's thread, run the start hook, and pump the engine until the
    /// worker is stopped.
    pub fn run_on_current_thread(&self) -> Result<(), WorkerError> {
        let core = &self.core;
        if !core.external {
            return Err(WorkerError::InvalidArgument(
                "worker owns its own thread".into(),
            ));
        }
        core.ensure_valid()?;
        let engine = core.engine.as_ref().ok_or(WorkerError::NotInitialized)?;
        *core.thread_id.write() = Some(thread::current().id());
        set_current_worker(Some(Arc::downgrade(core)));
        if let Some(hook) = core.on_start.lock().take() {
            hook();
        }
        engine.run();
        set_current_worker(None);
        Ok(())
    }

    /// Pump an external-thread worker once without blocking: run currently
    /// queued tasks and return. For drivers that own their own loop.
    pub fn pump(&self) -> Result<(), WorkerError> {
        let core = &self.core;
        if !core.external {
            return Err(WorkerError::InvalidArgument(
                "worker owns its own thread".into(),
            ));
        }
        core.ensure_valid()?;
        let engine = core.engine.as_ref().ok_or(WorkerError::NotInitialized)?;
        if core.thread_id.read().is_none() {
            *core.thread_id.write() = Some(thread::current().id());
        }
        set_current_worker(Some(Arc::downgrade(core)));
        engine.run_nonblock();
        core.drain_backlog();
        Ok(())
    }

    /// Queue present, started, and (for owned-thread workers) the thread
    /// handle is present. Permanently false for factory-less workers and
    /// after `stop`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.core.is_valid()
    }

    /// [`Worker::is_valid`], and additionally the OS thread has not exited.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        if !self.core.is_valid() {
            return false;
        }
        if self.core.external {
            return true;
        }
        self.core
            .thread
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Whether the current thread is this worker's thread.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.core.is_current_thread()
    }

    /// Whether `thread` has a task body executing on this worker right now.
    /// Thread-assertion helper backed by the live actual-invoker stack.
    #[must_use]
    pub fn is_invoked_by(&self, thread: ThreadId) -> bool {
        self.core.invokers.invoker_is(thread)
    }

    /// Live sync-call nesting depth on this worker.
    #[must_use]
    pub fn sync_nesting_depth(&self) -> usize {
        self.core.invokers.actual_depth()
    }

    /// Number of in-flight sync calls currently targeting this worker.
    #[must_use]
    pub fn pending_sync_invokers(&self) -> usize {
        self.core.invokers.potential_len()
    }

    /// Number of sync calls delivered through the backlog instead of the
    /// normal queue since creation.
    #[must_use]
    pub fn rerouted_calls(&self) -> u64 {
        self.core.rerouted.load(Ordering::Relaxed)
    }

    /// Tasks currently parked in the backlog.
    #[must_use]
    pub fn backlog_len(&self) -> usize {
        self.core.backlog.len()
    }

    /// Queue performance counters, when the worker has a queue.
    #[must_use]
    pub fn queue_counters(&self) -> Option<QueueCounters> {
        self.core.queue.as_ref().map(|queue| queue.counters())
    }

    /// Worker name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// The worker's thread id, once known.
    #[must_use]
    pub fn thread_id(&self) -> Option<ThreadId> {
        *self.core.thread_id.read()
    }

    /// Recent task history, oldest first.
    #[must_use]
    pub fn task_history(&self) -> Vec<TaskRecord> {
        self.core.auditor.lock().history()
    }

    /// Longest-running tasks seen so far, slowest first.
    #[must_use]
    pub fn longest_tasks(&self) -> Vec<TaskRecord> {
        self.core.auditor.lock().longest()
    }

    /// Submission sites of the recent history, oldest first.
    #[must_use]
    pub fn call_sequence(&self) -> Vec<Location> {
        self.core.auditor.lock().call_sequence()
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.core.name)
            .field("state", &*self.core.state.lock())
            .field("external", &self.core.external)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_spawn_sync_async_stop() {
        let worker = Worker::spawn("unit");
        assert!(worker.is_valid());
        assert!(worker.is_alive());

        let counter = Arc::new(AtomicUsize::new(0));
        let inc = Arc::clone(&counter);
        worker
            .async_call(Location::capture(), move || {
                inc.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        let value = worker.sync_call(Location::capture(), || 40 + 2).unwrap();
        assert_eq!(value, 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        worker.stop();
        assert!(!worker.is_valid());
        assert!(matches!(
            worker.sync_call(Location::capture(), || 0),
            Err(WorkerError::NotInitialized)
        ));
    }

    #[test]
    fn test_missing_factory_is_permanently_unusable() {
        let worker = Worker::create(None, WorkerOptions::new("dead"));
        assert!(!worker.is_valid());
        assert!(!worker.is_alive());
        assert!(matches!(
            worker.async_call(Location::capture(), || {}),
            Err(WorkerError::NotInitialized)
        ));
        assert!(matches!(
            worker.delayed_async_call(Location::capture(), || {}, Duration::from_millis(1)),
            Err(WorkerError::NotInitialized)
        ));
        worker.stop();
    }

    #[test]
    fn test_tasks_run_on_worker_thread() {
        let worker = Worker::spawn("thread-check");
        let expected = worker.thread_id().unwrap();
        let observed = worker
            .sync_call(Location::capture(), || thread::current().id())
            .unwrap();
        assert_eq!(observed, expected);
        let current = worker
            .sync_call(Location::capture(), || {
                Worker::current().map(|w| w.name().to_owned())
            })
            .unwrap();
        assert_eq!(current.as_deref(), Some("thread-check"));
        worker.stop();
    }

    #[test]
    fn test_invoker_bookkeeping_returns_to_baseline() {
        let worker = Worker::spawn("invokers");
        assert_eq!(worker.pending_sync_invokers(), 0);
        let me = thread::current().id();
        let probe = worker.clone();
        let seen = worker
            .sync_call(Location::capture(), move || {
                // While the body runs, the caller is a live actual invoker.
                probe.is_invoked_by(me)
            })
            .unwrap();
        assert!(seen);
        assert_eq!(worker.pending_sync_invokers(), 0);
        assert!(!worker.is_invoked_by(me));
        assert_eq!(worker.sync_nesting_depth(), 0);
        worker.stop();
    }

    #[test]
    fn test_audit_records_tasks() {
        let worker = Worker::spawn("audited");
        for _ in 0..3 {
            worker.sync_call(Location::capture(), || {}).unwrap();
        }
        assert_eq!(worker.task_history().len(), 3);
        assert!(!worker.longest_tasks().is_empty());
        assert_eq!(worker.call_sequence().len(), 3);
        worker.stop();
    }

    #[test]
    fn test_stop_hook_runs_on_worker_thread() {
        let hook_thread = Arc::new(Mutex::new(None));
        let record = Arc::clone(&hook_thread);
        let mut options = WorkerOptions::new("hooked");
        options.on_stop = Some(Box::new(move || {
            *record.lock() = Some(thread::current().id());
        }));
        let worker = Worker::create(Some(default_engine_factory()), options);
        let worker_thread = worker.thread_id().unwrap();
        worker.stop();
        assert_eq!(*hook_thread.lock(), Some(worker_thread));
    }
}
