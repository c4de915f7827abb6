//! Leaf worker - executes a task through its capability

use std::sync::Arc;

use serde_json::json;
use tracing::debug;

use crate::activity::{Activity, ActivitySink, ActivityStatus};
use crate::capability::{Capability, Specialization};
use crate::error::CadreError;
use crate::hierarchy::Hierarchy;
use crate::node::{NodeId, NodeVitals, Role};
use crate::outcome::{Outcome, OutcomeStatus};
use crate::task::Task;

/// Leaf executor.
///
/// Holds the specialization chosen at creation and the capability resolved
/// for it, both permanent for the node's lifetime. Adds no business logic
/// beyond recording the task, wrapping the capability's payload or failure
/// into an [`Outcome`], and reporting the activity.
pub struct WorkerNode {
    id: NodeId,
    parent: NodeId,
    specialization: Specialization,
    capability: Arc<dyn Capability>,
    vitals: Arc<NodeVitals>,
    sink: Arc<dyn ActivitySink>,
}

impl WorkerNode {
    /// Create a worker under `parent` and register it in the tree.
    pub(crate) fn create(
        parent: NodeId,
        specialization: Specialization,
        capability: Arc<dyn Capability>,
        hierarchy: &Hierarchy,
        sink: Arc<dyn ActivitySink>,
    ) -> Result<Arc<Self>, CadreError> {
        let worker = Arc::new(Self {
            id: NodeId::new(),
            parent,
            specialization,
            capability,
            vitals: Arc::new(NodeVitals::new()),
            sink,
        });

        hierarchy.register(
            worker.id,
            Role::Worker,
            parent,
            Some(specialization),
            Arc::clone(&worker.vitals),
        )?;

        debug!(
            node_id = %worker.id,
            parent = %parent,
            specialization = %specialization,
            "created worker"
        );

        Ok(worker)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent_id(&self) -> NodeId {
        self.parent
    }

    pub fn specialization(&self) -> Specialization {
        self.specialization
    }

    /// Execute a task through the capability and wrap the result.
    ///
    /// Never raises: a capability error becomes a failed outcome, so one
    /// worker cannot abort a fan-out in progress.
    pub async fn execute(&self, task: &Task) -> Outcome {
        self.vitals.task_started(task.id);

        let outcome = match self.capability.execute(task).await {
            Ok(payload) => Outcome::success(self.id, task.id, payload),
            Err(err) => Outcome::failure(self.id, task.id, err.to_string()),
        };

        self.vitals.task_finished();

        let (status, error) = match &outcome.status {
            OutcomeStatus::Success => (ActivityStatus::Success, None),
            OutcomeStatus::Failure { error } => (ActivityStatus::Failure, Some(error.clone())),
        };
        self.sink.record(Activity {
            node_id: self.id,
            role: Role::Worker,
            activity_type: self.specialization.as_str().to_string(),
            details: json!({ "task_type": task.type_tag() }),
            task_id: Some(task.id),
            status,
            error,
        });

        outcome
    }
}
