// src/dag/mod.rs

//! Task graph: named tasks, declared prerequisites, validated ordering.

pub mod graph;

pub use graph::{TaskAction, TaskGraph, TaskSpec};
