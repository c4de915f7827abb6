//! Outcome values bubbled up through the tree

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::node::NodeId;
use crate::planner::ResourcePlan;
use crate::task::TaskId;

/// Success or failure marker on an [`Outcome`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Failure { error: String },
}

impl OutcomeStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeStatus::Success)
    }
}

/// Result of one node processing one task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub node_id: NodeId,
    pub task_id: TaskId,
    pub payload: Value,
    pub status: OutcomeStatus,
}

impl Outcome {
    pub fn success(node_id: NodeId, task_id: TaskId, payload: Value) -> Self {
        Self {
            node_id,
            task_id,
            payload,
            status: OutcomeStatus::Success,
        }
    }

    pub fn failure(node_id: NodeId, task_id: TaskId, error: impl Into<String>) -> Self {
        Self {
            node_id,
            task_id,
            payload: Value::Null,
            status: OutcomeStatus::Failure {
                error: error.into(),
            },
        }
    }
}

/// One splitter's worker outcomes, in dispatch order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitterOutcome {
    pub splitter_id: NodeId,
    pub task_id: TaskId,
    pub workers: Vec<Outcome>,
}

/// One sub-coordinator's splitter outcomes, in dispatch order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubCoordinatorOutcome {
    pub sub_coordinator_id: NodeId,
    pub task_id: TaskId,
    pub splitters: Vec<SplitterOutcome>,
}

/// The full nested outcome tree of one delegation pass.
///
/// Tier outcomes are passed upward unchanged, never reduced, so divergence
/// detection at the root sees every leaf's raw payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationOutcome {
    pub task_id: TaskId,
    pub plan: ResourcePlan,
    pub sub_coordinators: Vec<SubCoordinatorOutcome>,
}

impl DelegationOutcome {
    /// Every leaf outcome in dispatch order.
    pub fn leaf_outcomes(&self) -> impl Iterator<Item = &Outcome> {
        self.sub_coordinators
            .iter()
            .flat_map(|sub| sub.splitters.iter())
            .flat_map(|splitter| splitter.workers.iter())
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_outcomes().count()
    }
}
