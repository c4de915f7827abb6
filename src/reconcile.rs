//! Leaf outcome grouping and consensus detection

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::node::NodeId;
use crate::outcome::{DelegationOutcome, Outcome};
use crate::task::TaskId;

/// Rounds attempted before a submission gives up on consensus.
///
/// Persistently divergent workers would otherwise recurse forever; hitting
/// the cap is surfaced to the caller, never resolved silently.
pub const DEFAULT_MAX_RECONCILE_ROUNDS: usize = 8;

/// Consensus state after grouping one round's leaf outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    Matched,
    Diverged,
}

/// Leaf outcomes that produced the same payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeGroup {
    /// Canonical serialization of the payload; the grouping key
    pub key: String,
    pub payload: Value,
    /// Producing node ids, in dispatch order
    pub producers: Vec<NodeId>,
}

impl OutcomeGroup {
    pub fn size(&self) -> usize {
        self.producers.len()
    }
}

/// One comparison cycle over a task's leaf outcomes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationRound {
    pub task_id: TaskId,
    /// Groups ordered by their first-seen producer, so identical outcome
    /// sets always report identical group order
    pub groups: Vec<OutcomeGroup>,
    pub status: RoundStatus,
}

impl ReconciliationRound {
    /// The grouping as a JSON object (canonical payload -> producer ids),
    /// the shape a reconciliation task carries in its attributes.
    pub fn grouping_value(&self) -> Value {
        let mut map = Map::new();
        for group in &self.groups {
            map.insert(
                group.key.clone(),
                Value::Array(
                    group
                        .producers
                        .iter()
                        .map(|id| Value::String(id.to_string()))
                        .collect(),
                ),
            );
        }
        Value::Object(map)
    }
}

/// Canonical form of a payload used as the grouping key.
///
/// `serde_json` keeps object keys sorted, so structurally equal payloads
/// serialize identically.
pub fn canonical_key(payload: &Value) -> String {
    serde_json::to_string(payload).unwrap_or_default()
}

/// Group a delegation pass's leaf outcomes by canonical payload.
pub fn evaluate(task_id: TaskId, outcome: &DelegationOutcome) -> ReconciliationRound {
    group_leaves(task_id, outcome.leaf_outcomes())
}

/// Group leaf outcomes by canonical payload.
///
/// Zero leaves or a single group is consensus; anything else is
/// divergence. Failed outcomes participate with their payload, so a
/// failing minority forces divergence rather than vanishing.
pub fn group_leaves<'a>(
    task_id: TaskId,
    leaves: impl Iterator<Item = &'a Outcome>,
) -> ReconciliationRound {
    let mut groups: Vec<OutcomeGroup> = Vec::new();

    for leaf in leaves {
        let key = canonical_key(&leaf.payload);
        match groups.iter_mut().find(|g| g.key == key) {
            Some(group) => group.producers.push(leaf.node_id),
            None => groups.push(OutcomeGroup {
                key,
                payload: leaf.payload.clone(),
                producers: vec![leaf.node_id],
            }),
        }
    }

    let status = if groups.len() <= 1 {
        RoundStatus::Matched
    } else {
        RoundStatus::Diverged
    };

    ReconciliationRound {
        task_id,
        groups,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leaf(task_id: TaskId, payload: Value) -> Outcome {
        Outcome::success(NodeId::new(), task_id, payload)
    }

    #[test]
    fn test_matching_outcomes() {
        let task_id = TaskId::new();
        let leaves = vec![
            leaf(task_id, json!({"answer": 42})),
            leaf(task_id, json!({"answer": 42})),
            leaf(task_id, json!({"answer": 42})),
        ];

        let round = group_leaves(task_id, leaves.iter());

        assert_eq!(round.status, RoundStatus::Matched);
        assert_eq!(round.groups.len(), 1);
        assert_eq!(round.groups[0].size(), 3);
        assert_eq!(round.groups[0].payload, json!({"answer": 42}));
    }

    #[test]
    fn test_divergent_outcomes() {
        let task_id = TaskId::new();
        let leaves = vec![
            leaf(task_id, json!({"answer": 42})),
            leaf(task_id, json!({"answer": 42})),
            leaf(task_id, json!({"answer": 7})),
        ];

        let round = group_leaves(task_id, leaves.iter());

        assert_eq!(round.status, RoundStatus::Diverged);
        assert_eq!(round.groups.len(), 2);
        let sizes: Vec<usize> = round.groups.iter().map(OutcomeGroup::size).collect();
        assert_eq!(sizes, vec![2, 1]);
    }

    #[test]
    fn test_group_order_follows_first_seen_producer() {
        let task_id = TaskId::new();
        let a = leaf(task_id, json!("a"));
        let b = leaf(task_id, json!("b"));
        let a2 = leaf(task_id, json!("a"));

        let round = group_leaves(task_id, [&a, &b, &a2].into_iter());

        assert_eq!(round.groups[0].producers, vec![a.node_id, a2.node_id]);
        assert_eq!(round.groups[1].producers, vec![b.node_id]);
    }

    #[test]
    fn test_zero_leaves_is_consensus() {
        let round = group_leaves(TaskId::new(), std::iter::empty());
        assert_eq!(round.status, RoundStatus::Matched);
        assert!(round.groups.is_empty());
    }

    #[test]
    fn test_canonical_key_ignores_construction_order() {
        let mut first = Map::new();
        first.insert("x".into(), json!(1));
        first.insert("y".into(), json!(2));

        let mut second = Map::new();
        second.insert("y".into(), json!(2));
        second.insert("x".into(), json!(1));

        assert_eq!(
            canonical_key(&Value::Object(first)),
            canonical_key(&Value::Object(second))
        );
    }

    #[test]
    fn test_failed_outcomes_group_separately() {
        let task_id = TaskId::new();
        let ok = leaf(task_id, json!({"answer": 42}));
        let failed = Outcome::failure(NodeId::new(), task_id, "boom");

        let round = group_leaves(task_id, [&ok, &failed].into_iter());
        assert_eq!(round.status, RoundStatus::Diverged);
    }

    #[test]
    fn test_grouping_value_shape() {
        let task_id = TaskId::new();
        let a = leaf(task_id, json!(1));
        let b = leaf(task_id, json!(2));

        let round = group_leaves(task_id, [&a, &b].into_iter());
        let grouping = round.grouping_value();

        assert_eq!(grouping["1"], json!([a.node_id.to_string()]));
        assert_eq!(grouping["2"], json!([b.node_id.to_string()]));
    }
}
