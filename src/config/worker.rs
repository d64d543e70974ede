//! Worker configuration structures.

use serde::{Deserialize, Serialize};

/// Scheduling priority requested for a worker's thread.
///
/// Applying it is the engine's job; the built-in pump only logs the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerPriority {
    /// Background work (telemetry, cache maintenance).
    Low,
    /// Default for most subsystems.
    Normal,
    /// Latency-sensitive control traffic (signaling).
    High,
    /// Media-path threads.
    Realtime,
}

/// Per-worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Worker name, used for the thread name and diagnostics.
    pub name: String,
    /// Requested thread priority.
    pub priority: WorkerPriority,
    /// Task-queue capacity; `0` means unbounded.
    pub queue_capacity: usize,
    /// Cancel-time drain budget: number of wait attempts.
    pub cancel_wait_attempts: u32,
    /// Cancel-time drain budget: sleep between attempts, milliseconds.
    pub cancel_wait_sleep_ms: u64,
    /// Maximum nesting depth of backlog drains; entries beyond the limit
    /// stay queued for the outer drain pass.
    pub backlog_drain_depth: u32,
}

impl WorkerConfig {
    /// Default configuration for a worker with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: WorkerPriority::Normal,
            queue_capacity: 0,
            cancel_wait_attempts: 100,
            cancel_wait_sleep_ms: 10,
            backlog_drain_depth: 8,
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("name must not be empty".into());
        }
        if self.cancel_wait_attempts == 0 {
            return Err("cancel_wait_attempts must be greater than 0".into());
        }
        if self.backlog_drain_depth == 0 {
            return Err("backlog_drain_depth must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse a worker configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: WorkerConfig =
            serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
