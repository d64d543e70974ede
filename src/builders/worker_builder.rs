//! Fluent construction of configured workers.

use std::time::Duration;

use crate::config::{WorkerConfig, WorkerPriority};
use crate::core::error::WorkerError;
use crate::core::task::TaskFn;
use crate::core::worker::{Worker, WorkerOptions};
use crate::engine::pump::{default_engine_factory, EngineFactory};

/// Builder for a [`Worker`] with non-default configuration.
///
/// ```rust
/// use rtc_workers::builders::WorkerBuilder;
/// use rtc_workers::config::WorkerPriority;
///
/// let worker = WorkerBuilder::new("media")
///     .priority(WorkerPriority::Realtime)
///     .queue_capacity(1024)
///     .build()
///     .unwrap();
/// worker.stop();
/// ```
pub struct WorkerBuilder {
    config: WorkerConfig,
    on_start: Option<TaskFn>,
    on_stop: Option<TaskFn>,
    external_thread: bool,
    factory: Option<EngineFactory>,
}

impl WorkerBuilder {
    /// Start building a worker with the given name and default settings.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            config: WorkerConfig::new(name),
            on_start: None,
            on_stop: None,
            external_thread: false,
            factory: None,
        }
    }

    /// Start from an already-assembled configuration.
    #[must_use]
    pub fn from_config(config: WorkerConfig) -> Self {
        Self {
            config,
            on_start: None,
            on_stop: None,
            external_thread: false,
            factory: None,
        }
    }

    /// Requested thread priority.
    #[must_use]
    pub fn priority(mut self, priority: WorkerPriority) -> Self {
        self.config.priority = priority;
        self
    }

    /// Task-queue capacity; `0` means unbounded.
    #[must_use]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Cancel-time drain budget: attempts and per-attempt sleep.
    #[must_use]
    pub fn cancel_budget(mut self, attempts: u32, sleep: Duration) -> Self {
        self.config.cancel_wait_attempts = attempts;
        self.config.cancel_wait_sleep_ms = u64::try_from(sleep.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Maximum nesting depth of backlog drains.
    #[must_use]
    pub fn backlog_drain_depth(mut self, depth: u32) -> Self {
        self.config.backlog_drain_depth = depth;
        self
    }

    /// Hook run first on the worker's thread, before any task.
    #[must_use]
    pub fn on_start(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_start = Some(Box::new(hook));
        self
    }

    /// Hook run last on the worker's thread during `stop`.
    #[must_use]
    pub fn on_stop(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_stop = Some(Box::new(hook));
        self
    }

    /// Do not spawn a thread; the caller drives the worker via
    /// [`Worker::run_on_current_thread`] or [`Worker::pump`].
    #[must_use]
    pub fn external_thread(mut self) -> Self {
        self.external_thread = true;
        self
    }

    /// Inject a custom engine factory instead of the built-in queue/pump.
    #[must_use]
    pub fn engine_factory(mut self, factory: EngineFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Validate the configuration and create the worker.
    pub fn build(self) -> Result<Worker, WorkerError> {
        self.config
            .validate()
            .map_err(WorkerError::InvalidArgument)?;
        let factory = self.factory.unwrap_or_else(default_engine_factory);
        let options = WorkerOptions {
            config: self.config,
            on_start: self.on_start,
            on_stop: self.on_stop,
            external_thread: self.external_thread,
        };
        Ok(Worker::create(Some(factory), options))
    }
}
