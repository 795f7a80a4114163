// src/exec/mod.rs

//! Build execution layer.
//!
//! This module actually runs tasks and reports back to the orchestration
//! runtime via `RuntimeEvent`s.
//!
//! - [`task_runner`] walks a task's prerequisites and runs each one.
//! - [`build`] runs one asset class: discovery, freshness, pipeline, write.
//! - [`backend`] provides the `ExecutorBackend` trait and a concrete
//!   `RealExecutorBackend` that the runtime uses in production, and which
//!   tests can replace with a fake implementation.

pub mod backend;
pub mod build;
pub mod task_runner;

pub use backend::{ExecutorBackend, RealExecutorBackend};
pub use build::build_class;
pub use task_runner::{TaskContext, execute_scheduled, run_task};
