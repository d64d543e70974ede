//! Error types for worker operations.

use thiserror::Error;

/// Errors produced by the scheduling core.
///
/// Task bodies return their own results through the sync-call slot; those are
/// opaque to the scheduler and never surface here.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Caller supplied an unusable argument (empty name, zero budget, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The worker is unusable: never started, already stopped, or its queue
    /// was never constructed. Construction failures are permanent; every
    /// later call reports this instead of crashing.
    #[error("worker not initialized")]
    NotInitialized,
    /// A sync call exceeded its deadline. The delivered task is not
    /// retracted and may still complete later, observed by no one.
    #[error("sync call timed out")]
    Timeout,
    /// Internal failure (task discarded before execution, queue overflow,
    /// worker thread gone).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
