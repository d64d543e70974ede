//! Per-worker task auditing.
//!
//! Diagnostic, not load-bearing: a bounded history of executed tasks and a
//! leaderboard of the longest-running ones, snapshotted by support tooling
//! when a worker misbehaves in the field.

use std::collections::VecDeque;
use std::time::Duration;

use crate::core::location::Location;

/// One executed task, as remembered by the auditor.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    /// Where the task was submitted from.
    pub location: Location,
    /// Time spent queued before execution started.
    pub queued_for: Duration,
    /// Execution duration of the task body.
    pub ran_for: Duration,
    /// Wall-clock completion time, milliseconds since the Unix epoch.
    pub finished_at_ms: u128,
}

/// Records task history and longest-running tasks for one worker.
pub struct WorkerAuditor {
    history: VecDeque<TaskRecord>,
    max_history: usize,
    longest: Vec<TaskRecord>,
    max_longest: usize,
}

impl WorkerAuditor {
    /// Create an auditor with bounded history and leaderboard sizes.
    #[must_use]
    pub fn new(max_history: usize, max_longest: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(max_history),
            max_history,
            longest: Vec::with_capacity(max_longest),
            max_longest,
        }
    }

    /// Record one executed task.
    pub fn record(&mut self, record: TaskRecord) {
        if self.history.len() >= self.max_history {
            self.history.pop_front();
        }
        self.history.push_back(record.clone());

        let position = self
            .longest
            .partition_point(|entry| entry.ran_for >= record.ran_for);
        if position < self.max_longest {
            self.longest.insert(position, record);
            self.longest.truncate(self.max_longest);
        }
    }

    /// Snapshot of the recent task history, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<TaskRecord> {
        self.history.iter().cloned().collect()
    }

    /// Longest-running tasks seen so far, slowest first.
    #[must_use]
    pub fn longest(&self) -> Vec<TaskRecord> {
        self.longest.clone()
    }

    /// Submission sites of the recent history, oldest first.
    #[must_use]
    pub fn call_sequence(&self) -> Vec<Location> {
        self.history
            .iter()
            .map(|record| record.location.clone())
            .collect()
    }
}

impl Default for WorkerAuditor {
    fn default() -> Self {
        Self::new(128, 10)
    }
}
