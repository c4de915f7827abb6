//! Node identity and per-node bookkeeping

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::task::TaskId;

/// Stable identifier for a tree node, assigned at creation and never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tier of a node in the delegation tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Root,
    SubCoordinator,
    Splitter,
    Worker,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Root => "root",
            Role::SubCoordinator => "sub_coordinator",
            Role::Splitter => "splitter",
            Role::Worker => "worker",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How many recently handled task ids a node keeps for status reporting
const HISTORY_LIMIT: usize = 32;

/// Live counters shared between a node and the hierarchy registry.
///
/// Atomics plus a short-lived mutex on the history ring, so the status walk
/// never waits on an in-flight dispatch.
#[derive(Debug, Default)]
pub struct NodeVitals {
    completed: AtomicUsize,
    pending: AtomicUsize,
    recent: Mutex<VecDeque<TaskId>>,
}

impl NodeVitals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a task was dispatched to this node.
    pub fn task_started(&self, task_id: TaskId) {
        self.pending.fetch_add(1, Ordering::SeqCst);

        let mut recent = self.recent.lock();
        if recent.len() == HISTORY_LIMIT {
            recent.pop_front();
        }
        recent.push_back(task_id);
    }

    /// Record that a dispatched task finished, successfully or not.
    pub fn task_finished(&self) {
        self.pending.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn completed_tasks(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn pending_tasks(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Recently handled task ids, oldest first.
    pub fn recent_tasks(&self) -> Vec<TaskId> {
        self.recent.lock().iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vitals_counts() {
        let vitals = NodeVitals::new();
        let task_id = TaskId::new();

        vitals.task_started(task_id);
        assert_eq!(vitals.pending_tasks(), 1);
        assert_eq!(vitals.completed_tasks(), 0);

        vitals.task_finished();
        assert_eq!(vitals.pending_tasks(), 0);
        assert_eq!(vitals.completed_tasks(), 1);
        assert_eq!(vitals.recent_tasks(), vec![task_id]);
    }

    #[test]
    fn test_vitals_history_is_bounded() {
        let vitals = NodeVitals::new();

        let ids: Vec<TaskId> = (0..HISTORY_LIMIT + 5).map(|_| TaskId::new()).collect();
        for id in &ids {
            vitals.task_started(*id);
            vitals.task_finished();
        }

        let recent = vitals.recent_tasks();
        assert_eq!(recent.len(), HISTORY_LIMIT);
        // Oldest entries evicted first
        assert_eq!(recent.first(), Some(&ids[5]));
        assert_eq!(recent.last(), Some(ids.last().unwrap()));
    }

    #[test]
    fn test_node_ids_are_unique() {
        let a = NodeId::new();
        let b = NodeId::new();
        assert_ne!(a, b);
    }
}
