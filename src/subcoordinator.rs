//! Sub-coordinator - owns a splitter set, one fan-out level above it

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;
use tracing::{debug, instrument};

use crate::activity::{Activity, ActivitySink, ActivityStatus};
use crate::capability::CapabilityRegistry;
use crate::error::CadreError;
use crate::hierarchy::{ensure_children, Hierarchy};
use crate::node::{NodeId, NodeVitals, Role};
use crate::outcome::SubCoordinatorOutcome;
use crate::planner::ResourcePlan;
use crate::splitter::SplitterNode;
use crate::task::Task;

/// Second tier under the root, owning a lazily grown set of splitters.
pub struct SubCoordinatorNode {
    id: NodeId,
    parent: NodeId,
    splitters: Mutex<Vec<Arc<SplitterNode>>>,
    capabilities: Arc<CapabilityRegistry>,
    hierarchy: Arc<Hierarchy>,
    vitals: Arc<NodeVitals>,
    sink: Arc<dyn ActivitySink>,
}

impl SubCoordinatorNode {
    /// Create a sub-coordinator under `parent` and register it in the tree.
    pub(crate) fn create(
        parent: NodeId,
        capabilities: Arc<CapabilityRegistry>,
        hierarchy: Arc<Hierarchy>,
        sink: Arc<dyn ActivitySink>,
    ) -> Result<Arc<Self>, CadreError> {
        let sub = Arc::new(Self {
            id: NodeId::new(),
            parent,
            splitters: Mutex::new(Vec::new()),
            capabilities,
            hierarchy: Arc::clone(&hierarchy),
            vitals: Arc::new(NodeVitals::new()),
            sink,
        });

        hierarchy.register(
            sub.id,
            Role::SubCoordinator,
            parent,
            None,
            Arc::clone(&sub.vitals),
        )?;

        Ok(sub)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent_id(&self) -> NodeId {
        self.parent
    }

    pub fn splitter_count(&self) -> usize {
        self.splitters.lock().len()
    }

    fn ensure_splitters(&self, required: usize) -> Result<Vec<Arc<SplitterNode>>, CadreError> {
        ensure_children(&self.splitters, required, |_| {
            SplitterNode::create(
                self.id,
                Arc::clone(&self.capabilities),
                Arc::clone(&self.hierarchy),
                Arc::clone(&self.sink),
            )
        })
    }

    /// Fan the task out to every splitter and gather their nested
    /// outcomes, in splitter creation order.
    #[instrument(skip_all, fields(node_id = %self.id, task_id = %task.id))]
    pub async fn delegate(
        &self,
        task: &Task,
        plan: ResourcePlan,
    ) -> Result<SubCoordinatorOutcome, CadreError> {
        self.vitals.task_started(task.id);

        let splitters = self.ensure_splitters(plan.splitters_per_sub)?;
        debug!(splitter_count = splitters.len(), "sub-coordinator dispatching");

        let handles: Vec<_> = splitters
            .iter()
            .map(|splitter| {
                let splitter = Arc::clone(splitter);
                let task = task.clone();
                tokio::spawn(async move { splitter.delegate(&task, plan).await })
            })
            .collect();

        // Gather every splitter before surfacing any structural error, so
        // a fatal failure never leaves siblings mid-flight.
        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(
                handle
                    .await
                    .map_err(|err| CadreError::DispatchFailure(err.to_string())),
            );
        }

        let mut splitter_outcomes = Vec::with_capacity(results.len());
        for result in results {
            splitter_outcomes.push(result??);
        }

        self.vitals.task_finished();
        self.sink.record(Activity {
            node_id: self.id,
            role: Role::SubCoordinator,
            activity_type: "delegation".into(),
            details: json!({ "splitter_count": splitter_outcomes.len() }),
            task_id: Some(task.id),
            status: ActivityStatus::Success,
            error: None,
        });

        Ok(SubCoordinatorOutcome {
            sub_coordinator_id: self.id,
            task_id: task.id,
            splitters: splitter_outcomes,
        })
    }
}
