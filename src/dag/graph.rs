// src/dag/graph.rs

//! Named tasks and their prerequisites.
//!
//! The graph is validated when it is built: unknown prerequisites,
//! self-dependencies and cycles are configuration errors. Execution order is
//! a depth-first post-order that follows each task's prerequisites in the
//! order they were declared.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::ConfigFile;
use crate::errors::{AssetdagError, Result};
use crate::types::{AssetKind, CLEAN_TASK, DEFAULT_TASK, TaskName, canonical_task_name};

/// What running a task does once its prerequisites are done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAction {
    /// Remove the output root.
    Clean,
    /// Build one asset class.
    Build(AssetKind),
    /// Nothing of its own; exists to group prerequisites.
    Group,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub name: TaskName,
    pub after: Vec<TaskName>,
    pub action: TaskAction,
}

impl TaskSpec {
    pub fn new(name: impl Into<TaskName>, after: Vec<TaskName>, action: TaskAction) -> Self {
        Self {
            name: name.into(),
            after,
            action,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaskGraph {
    tasks: BTreeMap<TaskName, TaskSpec>,
}

impl TaskGraph {
    /// Build and validate a graph from explicit specs.
    pub fn new(specs: Vec<TaskSpec>) -> Result<Self> {
        let mut tasks = BTreeMap::new();
        for spec in specs {
            if tasks.contains_key(&spec.name) {
                return Err(AssetdagError::ConfigError(format!(
                    "task '{}' is declared twice",
                    spec.name
                )));
            }
            tasks.insert(spec.name.clone(), spec);
        }

        let graph = Self { tasks };
        graph.validate()?;
        Ok(graph)
    }

    /// The built-in task set for a configuration.
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        let mut specs = vec![TaskSpec::new(CLEAN_TASK, Vec::new(), TaskAction::Clean)];
        for class in cfg.classes() {
            specs.push(TaskSpec::new(
                class.name.clone(),
                class.after.clone(),
                TaskAction::Build(class.kind),
            ));
        }
        specs.push(TaskSpec::new(
            DEFAULT_TASK,
            cfg.default_tasks().to_vec(),
            TaskAction::Group,
        ));
        Self::new(specs)
    }

    fn validate(&self) -> Result<()> {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for name in self.tasks.keys() {
            graph.add_node(name.as_str());
        }

        for (name, spec) in self.tasks.iter() {
            for dep in spec.after.iter() {
                if !self.tasks.contains_key(dep) {
                    return Err(AssetdagError::ConfigError(format!(
                        "task '{}' has unknown dependency '{}'",
                        name, dep
                    )));
                }
                if dep == name {
                    return Err(AssetdagError::ConfigError(format!(
                        "task '{}' cannot depend on itself",
                        name
                    )));
                }
                graph.add_edge(dep.as_str(), name.as_str(), ());
            }
        }

        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => Err(AssetdagError::DagCycle(format!(
                "cycle detected in task DAG involving task '{}'",
                cycle.node_id()
            ))),
        }
    }

    /// Look up a task by name or alias.
    pub fn resolve(&self, name: &str) -> Result<&TaskSpec> {
        let canonical = canonical_task_name(name);
        self.tasks
            .get(&canonical)
            .ok_or_else(|| AssetdagError::TaskNotFound(name.to_string()))
    }

    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(|s| s.as_str())
    }

    /// Direct prerequisites of a task, in declared order.
    pub fn dependencies_of(&self, name: &str) -> &[TaskName] {
        self.tasks
            .get(name)
            .map(|spec| spec.after.as_slice())
            .unwrap_or(&[])
    }

    /// Every task `name` needs, prerequisites first, each exactly once,
    /// ending with `name` itself.
    pub fn run_order(&self, name: &str) -> Result<Vec<TaskName>> {
        let root = self.resolve(name)?.name.clone();
        let mut order = Vec::new();
        let mut visited = BTreeSet::new();
        self.visit(&root, &mut visited, &mut order);
        Ok(order)
    }

    fn visit(&self, name: &str, visited: &mut BTreeSet<TaskName>, order: &mut Vec<TaskName>) {
        if !visited.insert(name.to_string()) {
            return;
        }
        for dep in self.dependencies_of(name) {
            self.visit(dep, visited, order);
        }
        order.push(name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str, after: &[&str]) -> TaskSpec {
        TaskSpec::new(
            name,
            after.iter().map(|s| s.to_string()).collect(),
            TaskAction::Group,
        )
    }

    #[test]
    fn shared_prerequisite_runs_once_and_first() {
        let graph = TaskGraph::new(vec![
            spec("imguri", &[]),
            spec("sass", &["imguri"]),
            spec("html", &[]),
            spec("default", &["html", "sass", "imguri"]),
        ])
        .unwrap();

        let order = graph.run_order("default").unwrap();
        assert_eq!(order, vec!["html", "imguri", "sass", "default"]);
    }

    #[test]
    fn cycle_is_rejected() {
        let err = TaskGraph::new(vec![spec("a", &["b"]), spec("b", &["a"])]).unwrap_err();
        assert!(matches!(err, AssetdagError::DagCycle(msg) if msg.contains("cycle detected")));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let err = TaskGraph::new(vec![spec("a", &["ghost"])]).unwrap_err();
        assert!(matches!(err, AssetdagError::ConfigError(msg) if msg.contains("ghost")));
    }

    #[test]
    fn unknown_task_is_not_found() {
        let graph = TaskGraph::new(vec![spec("a", &[])]).unwrap();
        assert!(matches!(
            graph.run_order("zzz"),
            Err(AssetdagError::TaskNotFound(name)) if name == "zzz"
        ));
    }
}
