//! Task values submitted to the delegation tree

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// Unique identifier for a submitted task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unit of work for the tree.
///
/// Attributes are a free-form JSON object. The planner reads `complexity`,
/// `scope` and `urgency` (positive integers, each defaulting to 1), and
/// worker creation reads the optional `type` tag to pick a specialization.
/// Tasks are immutable once created; reconciliation derives a new task
/// instead of mutating the original.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub attributes: Value,
    /// Set only on reconciliation tasks; the task whose leaf outcomes
    /// diverged.
    pub parent: Option<TaskId>,
}

impl Task {
    pub fn new(attributes: Value) -> Self {
        Self {
            id: TaskId::new(),
            attributes,
            parent: None,
        }
    }

    /// Derive the follow-up task for a diverged round.
    ///
    /// Carries the divergent grouping in its attributes and no sizing
    /// attributes, so the planner degrades it to the floor plan.
    pub fn reconciliation(parent: TaskId, grouping: Value) -> Self {
        Self {
            id: TaskId::new(),
            attributes: json!({
                "type": "reconciliation",
                "original_task": parent.to_string(),
                "different_results": grouping,
            }),
            parent: Some(parent),
        }
    }

    fn positive_attr(&self, name: &str) -> u64 {
        self.attributes
            .get(name)
            .and_then(Value::as_u64)
            .filter(|v| *v > 0)
            .unwrap_or(1)
    }

    pub fn complexity(&self) -> u64 {
        self.positive_attr("complexity")
    }

    pub fn scope(&self) -> u64 {
        self.positive_attr("scope")
    }

    pub fn urgency(&self) -> u64 {
        self.positive_attr("urgency")
    }

    /// The `type` attribute, when present and a string.
    pub fn type_tag(&self) -> Option<&str> {
        self.attributes.get("type").and_then(Value::as_str)
    }
}
