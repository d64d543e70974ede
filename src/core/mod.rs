//! Worker lifecycle, submission protocol, and diagnostics.

/// Task auditing: bounded history and longest-task leaderboard.
pub mod audit;
pub(crate) mod backlog;
/// Error types shared across the crate.
pub mod error;
pub(crate) mod invoker;
/// Call-site provenance attached to tasks.
pub mod location;
/// Named worker registry.
pub mod pool;
/// Task closures and their scheduling metadata.
pub mod task;
/// Workers and the async/sync/invoke submission protocol.
pub mod worker;

pub use audit::{TaskRecord, WorkerAuditor};
pub use error::{AppResult, WorkerError};
pub use location::Location;
pub use pool::WorkerPool;
pub use task::{Task, TaskFn};
pub use worker::{Worker, WorkerOptions};
