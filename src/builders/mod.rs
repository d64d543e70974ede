//! Builders to construct workers from configuration.

/// Fluent worker construction.
pub mod worker_builder;

pub use worker_builder::WorkerBuilder;
