//! Resource sizing from task attributes

use serde::{Deserialize, Serialize};

use crate::task::Task;

/// Sub-coordinator count under the root. Fixed by policy, never derived
/// from task attributes.
pub const SUB_COORDINATOR_COUNT: usize = 2;

/// Node counts required at each tier for one task.
///
/// Computed fresh per task and never stored on the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePlan {
    pub sub_coordinators: usize,
    pub splitters_per_sub: usize,
    pub workers_per_splitter: usize,
}

impl ResourcePlan {
    pub fn total_splitters(&self) -> usize {
        self.sub_coordinators * self.splitters_per_sub
    }

    pub fn total_workers(&self) -> usize {
        self.total_splitters() * self.workers_per_splitter
    }
}

/// Compute the tree shape for a task.
///
/// Pure and deterministic. Missing or non-positive attributes count as 1,
/// and the per-tier floors keep every count positive:
/// `splitters_per_sub = max(1, complexity * scope / 3)`,
/// `workers_per_splitter = max(2, complexity * scope * urgency / 2)`.
pub fn plan(task: &Task) -> ResourcePlan {
    let complexity = task.complexity();
    let scope = task.scope();
    let urgency = task.urgency();

    ResourcePlan {
        sub_coordinators: SUB_COORDINATOR_COUNT,
        splitters_per_sub: ((complexity * scope) / 3).max(1) as usize,
        workers_per_splitter: ((complexity * scope * urgency) / 2).max(2) as usize,
    }
}
