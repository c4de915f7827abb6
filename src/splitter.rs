//! Mid-tier splitter - owns a worker set and fans tasks across it

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;
use tracing::{debug, instrument};

use crate::activity::{Activity, ActivitySink, ActivityStatus};
use crate::capability::{CapabilityRegistry, Specialization};
use crate::error::CadreError;
use crate::hierarchy::{ensure_children, Hierarchy};
use crate::node::{NodeId, NodeVitals, Role};
use crate::outcome::{Outcome, SplitterOutcome};
use crate::planner::ResourcePlan;
use crate::task::Task;
use crate::worker::WorkerNode;

/// Mid-tier node owning a lazily grown set of workers.
pub struct SplitterNode {
    id: NodeId,
    parent: NodeId,
    workers: Mutex<Vec<Arc<WorkerNode>>>,
    capabilities: Arc<CapabilityRegistry>,
    hierarchy: Arc<Hierarchy>,
    vitals: Arc<NodeVitals>,
    sink: Arc<dyn ActivitySink>,
}

impl SplitterNode {
    /// Create a splitter under `parent` and register it in the tree.
    pub(crate) fn create(
        parent: NodeId,
        capabilities: Arc<CapabilityRegistry>,
        hierarchy: Arc<Hierarchy>,
        sink: Arc<dyn ActivitySink>,
    ) -> Result<Arc<Self>, CadreError> {
        let splitter = Arc::new(Self {
            id: NodeId::new(),
            parent,
            workers: Mutex::new(Vec::new()),
            capabilities,
            hierarchy: Arc::clone(&hierarchy),
            vitals: Arc::new(NodeVitals::new()),
            sink,
        });

        hierarchy.register(
            splitter.id,
            Role::Splitter,
            parent,
            None,
            Arc::clone(&splitter.vitals),
        )?;

        Ok(splitter)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent_id(&self) -> NodeId {
        self.parent
    }

    pub fn worker_count(&self) -> usize {
        self.workers.lock().len()
    }

    /// Grow the worker set to the plan's size and return the first
    /// `required` workers in creation order.
    ///
    /// New workers take their specialization from the task's `type` tag,
    /// chosen here once and permanent for the worker's lifetime.
    fn ensure_workers(
        &self,
        required: usize,
        task: &Task,
    ) -> Result<Vec<Arc<WorkerNode>>, CadreError> {
        let specialization = Specialization::from_tag(task.type_tag());
        ensure_children(&self.workers, required, |_| {
            WorkerNode::create(
                self.id,
                specialization,
                self.capabilities.resolve(specialization),
                &self.hierarchy,
                Arc::clone(&self.sink),
            )
        })
    }

    /// Fan the task out to every worker and gather one outcome per worker.
    ///
    /// Outcomes are reported in worker creation order regardless of
    /// completion order, and the gather waits for every worker. A panicked
    /// worker task is recorded as a failed outcome; siblings keep running.
    #[instrument(skip_all, fields(node_id = %self.id, task_id = %task.id))]
    pub async fn delegate(
        &self,
        task: &Task,
        plan: ResourcePlan,
    ) -> Result<SplitterOutcome, CadreError> {
        self.vitals.task_started(task.id);

        let workers = self.ensure_workers(plan.workers_per_splitter, task)?;
        debug!(worker_count = workers.len(), "splitter dispatching");

        let handles: Vec<_> = workers
            .iter()
            .map(|worker| {
                let worker = Arc::clone(worker);
                let task = task.clone();
                tokio::spawn(async move { worker.execute(&task).await })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (worker, handle) in workers.iter().zip(handles) {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(err) => Outcome::failure(
                    worker.id(),
                    task.id,
                    format!("worker task died: {err}"),
                ),
            };
            outcomes.push(outcome);
        }

        self.vitals.task_finished();
        self.sink.record(Activity {
            node_id: self.id,
            role: Role::Splitter,
            activity_type: "delegation".into(),
            details: json!({ "worker_count": outcomes.len() }),
            task_id: Some(task.id),
            status: ActivityStatus::Success,
            error: None,
        });

        Ok(SplitterOutcome {
            splitter_id: self.id,
            task_id: task.id,
            workers: outcomes,
        })
    }
}
