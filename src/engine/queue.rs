// src/engine/queue.rs

use std::collections::BTreeSet;

use tracing::debug;

use super::TaskName;

/// Per-task rebuild bookkeeping.
///
/// Semantics:
/// - A task is either idle or has exactly one run in flight.
/// - A request for an in-flight task marks one follow-up run. Further
///   requests before the follow-up starts coalesce into it.
/// - When the in-flight run completes, a marked follow-up starts
///   immediately and the mark is cleared.
#[derive(Debug, Default)]
pub struct RebuildQueue {
    in_flight: BTreeSet<TaskName>,
    follow_up: BTreeSet<TaskName>,
}

impl RebuildQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request. Returns true when the caller should dispatch the
    /// task now.
    pub fn request(&mut self, task: &str) -> bool {
        if self.in_flight.contains(task) {
            let fresh = self.follow_up.insert(task.to_string());
            debug!(task, fresh, "task in flight; follow-up recorded");
            return false;
        }
        self.in_flight.insert(task.to_string());
        true
    }

    /// Record completion. Returns true when a follow-up run should be
    /// dispatched now; the task then stays in flight.
    pub fn complete(&mut self, task: &str) -> bool {
        if self.follow_up.remove(task) {
            debug!(task, "starting follow-up run");
            self.in_flight.insert(task.to_string());
            return true;
        }
        self.in_flight.remove(task);
        false
    }

    pub fn is_in_flight(&self, task: &str) -> bool {
        self.in_flight.contains(task)
    }

    pub fn has_follow_up(&self, task: &str) -> bool {
        self.follow_up.contains(task)
    }

    /// Returns true if nothing is running.
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_while_running_yields_exactly_one_follow_up() {
        let mut q = RebuildQueue::new();
        assert!(q.request("sass"));
        assert!(!q.request("sass"));
        assert!(!q.request("sass"));
        assert!(!q.request("sass"));

        assert!(q.complete("sass"));
        assert!(q.is_in_flight("sass"));
        assert!(!q.has_follow_up("sass"));

        assert!(!q.complete("sass"));
        assert!(q.is_idle());
    }

    #[test]
    fn tasks_are_tracked_independently() {
        let mut q = RebuildQueue::new();
        assert!(q.request("sass"));
        assert!(q.request("js"));
        assert!(!q.request("sass"));

        assert!(!q.complete("js"));
        assert!(q.complete("sass"));
        assert!(!q.is_idle());
    }
}
