//! Configuration models for workers and scheduling budgets.

pub mod worker;

pub use worker::{WorkerConfig, WorkerPriority};
