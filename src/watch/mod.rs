// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Compiling each watched class's globs into a per-task profile.
//! - Wiring up a cross-platform filesystem watcher (`notify`).
//! - Turning create/modify events into task-level triggers.
//!
//! It does **not** know about the DAG; prerequisites of a triggered task are
//! handled when the task runs.

pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use patterns::{TaskWatchProfile, build_profiles_from_config};
pub use watcher::{NotifyLauncher, WatcherHandle, spawn_watcher};
