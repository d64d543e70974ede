//! Call-site provenance attached to every task.
//!
//! A [`Location`] records where a task was submitted from, when, and from
//! which thread. It is carried for diagnostics only: audit history, longest
//! task reports, and log lines. Nothing load-bearing reads it.

use std::fmt;

use crate::util::clock::now_ms;

/// Immutable, cheap-to-clone description of a submission site.
#[derive(Debug, Clone)]
pub struct Location {
    /// Source file of the call site.
    pub file: &'static str,
    /// Line of the call site.
    pub line: u32,
    /// Wall-clock capture time, milliseconds since the Unix epoch.
    pub created_at_ms: u128,
    /// Name of the thread that captured this location, if it has one.
    pub origin_thread: Option<String>,
}

impl Location {
    /// Capture the caller's source location, the current time, and the
    /// current thread's name.
    #[must_use]
    #[track_caller]
    pub fn capture() -> Self {
        let caller = std::panic::Location::caller();
        Self {
            file: caller.file(),
            line: caller.line(),
            created_at_ms: now_ms(),
            origin_thread: std::thread::current().name().map(str::to_owned),
        }
    }

    /// Milliseconds elapsed since this location was captured, saturating.
    #[must_use]
    pub fn age_ms(&self) -> u128 {
        now_ms().saturating_sub(self.created_at_ms)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} @ {}",
            self.file,
            self.line,
            self.origin_thread.as_deref().unwrap_or("<unnamed>")
        )
    }
}
