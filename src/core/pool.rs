//! Named worker registry.
//!
//! The SDK keeps one long-lived pool and hands subsystems their workers by
//! name, so "the signaling worker" means the same thread everywhere.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::core::error::WorkerError;
use crate::core::worker::{Worker, WorkerOptions};
use crate::engine::pump::default_engine_factory;

/// Registry of named workers with lazy creation.
///
/// Dropping the pool drops its workers; threads detach and wind down on
/// their own unless [`WorkerPool::stop_all`] was called first.
#[derive(Default)]
pub struct WorkerPool {
    workers: RwLock<HashMap<String, Worker>>,
}

impl WorkerPool {
    /// Create an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The worker registered under `name`, spawning it with the built-in
    /// engine on first use.
    pub fn get_or_spawn(&self, name: &str) -> Result<Worker, WorkerError> {
        if name.is_empty() {
            return Err(WorkerError::InvalidArgument(
                "worker name must not be empty".into(),
            ));
        }
        if let Some(worker) = self.workers.read().get(name) {
            return Ok(worker.clone());
        }
        let mut workers = self.workers.write();
        // Double-check: another thread may have spawned it meanwhile.
        if let Some(worker) = workers.get(name) {
            return Ok(worker.clone());
        }
        debug!(worker = name, "spawning pool worker");
        let worker = Worker::create(Some(default_engine_factory()), WorkerOptions::new(name));
        workers.insert(name.to_owned(), worker.clone());
        Ok(worker)
    }

    /// The worker registered under `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Worker> {
        self.workers.read().get(name).cloned()
    }

    /// Names of all registered workers, unordered.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.workers.read().keys().cloned().collect()
    }

    /// Number of registered workers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.workers.read().len()
    }

    /// Whether the pool has no workers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workers.read().is_empty()
    }

    /// Stop and deregister every worker. Safe to call more than once.
    pub fn stop_all(&self) {
        let workers: Vec<Worker> = {
            let mut map = self.workers.write();
            map.drain().map(|(_, worker)| worker).collect()
        };
        if workers.is_empty() {
            return;
        }
        info!(count = workers.len(), "stopping worker pool");
        for worker in workers {
            worker.stop();
        }
    }
}
