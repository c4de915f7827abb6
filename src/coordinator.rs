//! Root coordinator - plans, delegates, reconciles

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::activity::{Activity, ActivitySink, ActivityStatus, TracingSink};
use crate::capability::CapabilityRegistry;
use crate::error::CadreError;
use crate::hierarchy::{ensure_children, Hierarchy, NodeStatus};
use crate::node::{NodeId, NodeVitals, Role};
use crate::outcome::DelegationOutcome;
use crate::planner::{self, SUB_COORDINATOR_COUNT};
use crate::reconcile::{evaluate, ReconciliationRound, RoundStatus, DEFAULT_MAX_RECONCILE_ROUNDS};
use crate::subcoordinator::SubCoordinatorNode;
use crate::task::Task;

/// Final result of one submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SubmissionOutcome {
    /// Reconciliation off: the nested outcome tree, unreduced
    Completed(DelegationOutcome),
    /// Consensus: every leaf agreed on one payload
    Matched {
        payload: Value,
        /// Reconciliation rounds it took to get there (0 = first pass)
        rounds: usize,
        outcome: DelegationOutcome,
    },
    /// The round cap was hit while leaves still disagreed
    Exhausted {
        rounds: usize,
        last_round: ReconciliationRound,
    },
}

/// Root of the delegation tree.
///
/// Computes the resource plan for each submitted task, grows the tree to
/// match (never shrinking it), fans the task out through its two
/// sub-coordinators, and - when reconciliation is enabled - drives the
/// round loop over divergent leaf outcomes.
pub struct RootCoordinator {
    id: NodeId,
    sub_coordinators: Mutex<Vec<Arc<SubCoordinatorNode>>>,
    capabilities: Arc<CapabilityRegistry>,
    hierarchy: Arc<Hierarchy>,
    vitals: Arc<NodeVitals>,
    sink: Arc<dyn ActivitySink>,
    max_reconcile_rounds: usize,
}

impl RootCoordinator {
    /// Create a coordinator with the given capability table and activity
    /// sink.
    pub fn new(capabilities: CapabilityRegistry, sink: Arc<dyn ActivitySink>) -> Self {
        let id = NodeId::new();
        let vitals = Arc::new(NodeVitals::new());
        let hierarchy = Arc::new(Hierarchy::with_root(id, Role::Root, Arc::clone(&vitals)));

        info!(node_id = %id, "created root coordinator");

        Self {
            id,
            sub_coordinators: Mutex::new(Vec::new()),
            capabilities: Arc::new(capabilities),
            hierarchy,
            vitals,
            sink,
            max_reconcile_rounds: DEFAULT_MAX_RECONCILE_ROUNDS,
        }
    }

    /// Coordinator with placeholder capabilities and the tracing sink.
    pub fn with_defaults() -> Self {
        Self::new(CapabilityRegistry::with_placeholders(), Arc::new(TracingSink))
    }

    /// Override the reconciliation round cap.
    pub fn with_max_reconcile_rounds(mut self, rounds: usize) -> Self {
        self.max_reconcile_rounds = rounds;
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Total node count of the tree, root included.
    pub fn node_count(&self) -> usize {
        self.hierarchy.len()
    }

    /// Read-only view of the tree registry.
    pub fn hierarchy(&self) -> Arc<Hierarchy> {
        Arc::clone(&self.hierarchy)
    }

    /// Snapshot of the whole tree for an external monitor. Never waits on
    /// an in-flight dispatch.
    pub fn status(&self) -> NodeStatus {
        self.hierarchy.status()
    }

    fn ensure_sub_coordinators(&self) -> Result<Vec<Arc<SubCoordinatorNode>>, CadreError> {
        ensure_children(&self.sub_coordinators, SUB_COORDINATOR_COUNT, |_| {
            SubCoordinatorNode::create(
                self.id,
                Arc::clone(&self.capabilities),
                Arc::clone(&self.hierarchy),
                Arc::clone(&self.sink),
            )
        })
    }

    /// Run one delegation pass: plan, grow, fan out, gather.
    #[instrument(skip_all, fields(node_id = %self.id, task_id = %task.id))]
    pub async fn delegate(&self, task: &Task) -> Result<DelegationOutcome, CadreError> {
        let plan = planner::plan(task);
        self.vitals.task_started(task.id);

        info!(
            sub_coordinators = plan.sub_coordinators,
            splitters_per_sub = plan.splitters_per_sub,
            workers_per_splitter = plan.workers_per_splitter,
            "delegating task"
        );

        let subs = self.ensure_sub_coordinators()?;
        let handles: Vec<_> = subs
            .iter()
            .map(|sub| {
                let sub = Arc::clone(sub);
                let task = task.clone();
                tokio::spawn(async move { sub.delegate(&task, plan).await })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(
                handle
                    .await
                    .map_err(|err| CadreError::DispatchFailure(err.to_string())),
            );
        }

        let mut sub_outcomes = Vec::with_capacity(results.len());
        for result in results {
            sub_outcomes.push(result??);
        }

        self.vitals.task_finished();
        self.sink.record(Activity {
            node_id: self.id,
            role: Role::Root,
            activity_type: "delegation".into(),
            details: json!({
                "sub_coordinator_count": sub_outcomes.len(),
                "total_workers": plan.total_workers(),
            }),
            task_id: Some(task.id),
            status: ActivityStatus::Success,
            error: None,
        });

        Ok(DelegationOutcome {
            task_id: task.id,
            plan,
            sub_coordinators: sub_outcomes,
        })
    }

    /// Submit a task through the tree.
    ///
    /// With `reconcile` off the nested outcome tree is returned as-is,
    /// individual failed leaves included. With it on, leaf outcomes are
    /// grouped by canonical payload; divergence derives a reconciliation
    /// task (parented to the diverging one) and resubmits it through the
    /// full pipeline, strictly one round at a time, until consensus or the
    /// configured round cap.
    #[instrument(skip_all, fields(task_id = %task.id, reconcile))]
    pub async fn submit(
        &self,
        task: Task,
        reconcile: bool,
    ) -> Result<SubmissionOutcome, CadreError> {
        let mut task = task;
        let mut outcome = self.delegate(&task).await?;

        if !reconcile {
            return Ok(SubmissionOutcome::Completed(outcome));
        }

        let mut rounds = 0;
        loop {
            let round = evaluate(task.id, &outcome);
            match round.status {
                RoundStatus::Matched => {
                    let payload = round
                        .groups
                        .first()
                        .map(|group| group.payload.clone())
                        .unwrap_or(Value::Null);

                    info!(rounds, "leaf outcomes matched");
                    return Ok(SubmissionOutcome::Matched {
                        payload,
                        rounds,
                        outcome,
                    });
                }
                RoundStatus::Diverged => {
                    if rounds >= self.max_reconcile_rounds {
                        warn!(rounds, groups = round.groups.len(), "reconciliation exhausted");
                        return Ok(SubmissionOutcome::Exhausted {
                            rounds,
                            last_round: round,
                        });
                    }

                    rounds += 1;
                    debug!(
                        round = rounds,
                        groups = round.groups.len(),
                        "leaf outcomes diverged, resubmitting"
                    );

                    task = Task::reconciliation(task.id, round.grouping_value());
                    outcome = self.delegate(&task).await?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ActivityFilter, MemorySink};
    use crate::capability::{Capability, Specialization};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sized_task(complexity: u64, scope: u64, urgency: u64) -> Task {
        Task::new(json!({
            "complexity": complexity,
            "scope": scope,
            "urgency": urgency,
        }))
    }

    fn completed(outcome: SubmissionOutcome) -> DelegationOutcome {
        match outcome {
            SubmissionOutcome::Completed(delegation) => delegation,
            other => panic!("expected completed outcome, got {other:?}"),
        }
    }

    /// Alternates payloads between calls and remembers every task it saw.
    #[derive(Default)]
    struct DivergentCapability {
        calls: AtomicUsize,
        tasks: Mutex<Vec<Task>>,
        settle_after: Option<usize>,
    }

    #[async_trait]
    impl Capability for DivergentCapability {
        async fn execute(&self, task: &Task) -> anyhow::Result<Value> {
            self.tasks.lock().push(task.clone());
            let call = self.calls.fetch_add(1, Ordering::SeqCst);

            match self.settle_after {
                Some(threshold) if call >= threshold => Ok(json!({"value": "agreed"})),
                _ => Ok(json!({"value": call % 2})),
            }
        }
    }

    #[tokio::test]
    async fn test_minimal_task_builds_minimal_tree() {
        let sink = Arc::new(MemorySink::new());
        let coordinator = RootCoordinator::new(
            CapabilityRegistry::with_placeholders(),
            Arc::clone(&sink) as Arc<dyn ActivitySink>,
        );

        let task = Task::new(json!({
            "complexity": 1,
            "scope": 1,
            "urgency": 1,
            "type": "testing",
        }));
        let delegation = completed(coordinator.submit(task, false).await.unwrap());

        assert_eq!(delegation.sub_coordinators.len(), 2);
        assert!(delegation
            .sub_coordinators
            .iter()
            .all(|sub| sub.splitters.len() == 1));
        assert_eq!(delegation.leaf_count(), 4);
        assert!(delegation
            .leaf_outcomes()
            .all(|o| o.payload == json!({"test_result": "Tests completed"})));

        let status = coordinator.status();
        assert_eq!(status.count_role(Role::SubCoordinator), 2);
        assert_eq!(status.count_role(Role::Splitter), 2);
        assert_eq!(status.count_role(Role::Worker), 4);

        // Every tier reported its activity
        let worker_records = sink.filtered(&ActivityFilter {
            activity_type: Some("testing".into()),
            ..Default::default()
        });
        assert_eq!(worker_records.len(), 4);
        let delegations = sink.filtered(&ActivityFilter {
            activity_type: Some("delegation".into()),
            ..Default::default()
        });
        assert_eq!(delegations.len(), 5); // 1 root + 2 subs + 2 splitters
    }

    #[tokio::test]
    async fn test_repeat_submission_reuses_the_tree() {
        let coordinator = RootCoordinator::with_defaults();

        let first = completed(
            coordinator
                .submit(sized_task(5, 5, 5), false)
                .await
                .unwrap(),
        );
        assert_eq!(first.plan.total_splitters(), 16);
        assert_eq!(first.leaf_count(), 992);

        let after_first = coordinator.node_count();
        assert_eq!(after_first, 1 + 2 + 16 + 992);

        let second = completed(
            coordinator
                .submit(sized_task(5, 5, 5), false)
                .await
                .unwrap(),
        );
        assert_eq!(second.leaf_count(), 992);
        assert_eq!(coordinator.node_count(), after_first);
    }

    #[tokio::test]
    async fn test_smaller_follow_up_never_shrinks_the_tree() {
        let coordinator = RootCoordinator::with_defaults();

        coordinator.submit(sized_task(3, 3, 2), false).await.unwrap();
        let grown = coordinator.node_count();

        let delegation = completed(
            coordinator
                .submit(sized_task(1, 1, 1), false)
                .await
                .unwrap(),
        );
        assert_eq!(delegation.leaf_count(), 4);
        assert_eq!(coordinator.node_count(), grown);
    }

    #[tokio::test]
    async fn test_concurrent_submissions_never_over_provision() {
        let coordinator = Arc::new(RootCoordinator::with_defaults());

        let a = coordinator.submit(sized_task(2, 3, 1), false);
        let b = coordinator.submit(sized_task(2, 3, 1), false);
        let (a, b) = tokio::join!(a, b);
        a.unwrap();
        b.unwrap();

        // 2 splitters per sub (6 / 3), 3 workers per splitter (6 / 2)
        assert_eq!(coordinator.node_count(), 1 + 2 + 4 + 12);
    }

    #[tokio::test]
    async fn test_consensus_on_matching_results() {
        let coordinator = RootCoordinator::with_defaults();

        let task = Task::new(json!({"type": "database"}));
        let outcome = coordinator.submit(task, true).await.unwrap();

        match outcome {
            SubmissionOutcome::Matched {
                payload,
                rounds,
                outcome,
            } => {
                assert_eq!(rounds, 0);
                assert_eq!(payload, json!({"database_result": "Operation completed"}));
                assert_eq!(outcome.leaf_count(), 4);
            }
            other => panic!("expected consensus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_divergence_issues_one_reconciliation_task_per_round() {
        let capability = Arc::new(DivergentCapability::default());
        let mut capabilities = CapabilityRegistry::with_placeholders();
        capabilities.register(
            Specialization::General,
            Arc::clone(&capability) as Arc<dyn Capability>,
        );

        let coordinator = RootCoordinator::new(capabilities, Arc::new(MemorySink::new()))
            .with_max_reconcile_rounds(1);

        let task = sized_task(1, 1, 1);
        let original_id = task.id;
        let outcome = coordinator.submit(task, true).await.unwrap();

        match outcome {
            SubmissionOutcome::Exhausted { rounds, last_round } => {
                assert_eq!(rounds, 1);
                assert_eq!(last_round.status, RoundStatus::Diverged);
                assert_eq!(last_round.groups.len(), 2);
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }

        // Exactly one reconciliation sub-task was dispatched, parented to
        // the original task
        let seen = capability.tasks.lock();
        let reconciliation_ids: std::collections::HashSet<_> = seen
            .iter()
            .filter(|t| t.parent.is_some())
            .map(|t| t.id)
            .collect();
        assert_eq!(reconciliation_ids.len(), 1);

        let reconciliation = seen.iter().find(|t| t.parent.is_some()).unwrap();
        assert_eq!(reconciliation.parent, Some(original_id));
        assert_eq!(reconciliation.type_tag(), Some("reconciliation"));
    }

    #[tokio::test]
    async fn test_reconciliation_settles_when_workers_agree() {
        let capability = Arc::new(DivergentCapability {
            calls: AtomicUsize::new(0),
            tasks: Mutex::new(Vec::new()),
            settle_after: Some(4),
        });
        let mut capabilities = CapabilityRegistry::with_placeholders();
        capabilities.register(
            Specialization::General,
            Arc::clone(&capability) as Arc<dyn Capability>,
        );

        let coordinator = RootCoordinator::new(capabilities, Arc::new(MemorySink::new()));

        let outcome = coordinator.submit(sized_task(1, 1, 1), true).await.unwrap();
        match outcome {
            SubmissionOutcome::Matched {
                payload, rounds, ..
            } => {
                assert_eq!(rounds, 1);
                assert_eq!(payload, json!({"value": "agreed"}));
            }
            other => panic!("expected consensus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_status_walk_reflects_completed_work() {
        let coordinator = RootCoordinator::with_defaults();
        coordinator.submit(sized_task(1, 1, 1), false).await.unwrap();
        coordinator.submit(sized_task(1, 1, 1), false).await.unwrap();

        let status = coordinator.status();
        assert_eq!(status.completed_tasks, 2);
        assert_eq!(status.pending_tasks, 0);
        assert_eq!(status.child_count, 2);

        fn walk(status: &NodeStatus) {
            assert_eq!(status.completed_tasks, 2);
            assert_eq!(status.pending_tasks, 0);
            for child in &status.children {
                walk(child);
            }
        }
        walk(&status);
    }
}
