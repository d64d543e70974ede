//! # rtc-workers
//!
//! Cross-thread task-scheduling core of the RTC client SDK.
//!
//! Every subsystem of the SDK (signaling, media transport, telemetry, DNS,
//! caching) serializes its own state on a dedicated single-thread [`Worker`].
//! Subsystems still need to issue *synchronous* calls into each other's
//! threads, a design that normally produces mutual-wait deadlocks. This crate
//! provides the machinery that makes those calls safe:
//!
//! - **Workers**: one OS thread each (or an externally-driven loop), pumping a
//!   FIFO task queue through an injected event-loop engine.
//! - **Submission protocol**: fire-and-forget [`Worker::async_call`], blocking
//!   [`Worker::sync_call`], inline-or-async [`Worker::invoke`], and timer-based
//!   [`Worker::delayed_async_call`].
//! - **Cycle detection**: every in-flight sync call registers an invoker on
//!   its target; before delivering a new sync task the caller walks the
//!   invoker chain to decide whether blocking would close a wait cycle.
//! - **Backlog**: when a cycle is detected the task is rerouted into the
//!   target's backlog, which the target drains on its own thread even while
//!   parked inside a nested sync-call wait. Forward progress without ever
//!   running two tasks concurrently on one worker.
//! - **Cancellation/draining**: cooperative, bounded, best-effort; a worker
//!   stays usable after `cancel` and becomes permanently unusable only after
//!   the one-shot `stop`.
//!
//! [`Worker`]: core::Worker
//! [`Worker::async_call`]: core::Worker::async_call
//! [`Worker::sync_call`]: core::Worker::sync_call
//! [`Worker::invoke`]: core::Worker::invoke
//! [`Worker::delayed_async_call`]: core::Worker::delayed_async_call
//!
//! ## Example
//!
//! ```rust
//! use rtc_workers::core::{Location, Worker};
//!
//! let worker = Worker::spawn("signaling");
//! worker.async_call(Location::capture(), || {
//!     // runs on the worker thread
//! }).unwrap();
//! let answer = worker.sync_call(Location::capture(), || 41 + 1).unwrap();
//! assert_eq!(answer, 42);
//! worker.stop();
//! ```
//!
//! ## Injected collaborators
//!
//! The event-loop engine and the task-queue primitive are consumed through
//! the narrow traits in [`engine`]; the built-in [`engine::PumpEngine`] and
//! [`engine::FifoQueue`] make the crate usable stand-alone, while the SDK
//! injects its libevent-backed engines in production.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]

/// Worker lifecycle, submission protocol, invoker tracking, and diagnostics.
pub mod core;
/// Injected-collaborator surface: event-loop engine, task queue, wait events.
pub mod engine;
/// Configuration models for workers and scheduling budgets.
pub mod config;
/// Builders to construct workers from configuration.
pub mod builders;
/// Shared utilities.
pub mod util;
