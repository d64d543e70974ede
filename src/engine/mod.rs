//! Injected-collaborator surface.
//!
//! The scheduling core touches its environment through three narrow seams:
//! an event-loop engine ([`EventEngine`]), a FIFO task queue ([`TaskQueue`]),
//! and waitable events ([`Event`]) supporting the dual wait a parked sync
//! call performs. Built-in implementations ([`PumpEngine`], [`FifoQueue`])
//! keep the crate usable without the SDK's production engines.

pub mod event;
pub mod pump;
pub mod queue;

pub use event::Event;
pub use pump::{default_engine_factory, EngineFactory, EventEngine, PumpEngine};
pub use queue::{FifoQueue, QueueCounters, TaskQueue};
