//! Delegation tree registry and status reporting

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::capability::Specialization;
use crate::error::CadreError;
use crate::node::{NodeId, NodeVitals, Role};

/// Registry entry for one node
struct HierarchyNode {
    role: Role,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    specialization: Option<Specialization>,
    vitals: Arc<NodeVitals>,
}

/// Id-indexed arena over the delegation tree.
///
/// Children ids are kept in insertion order and the parent id is a
/// non-owning back-reference, so no ownership cycle exists. Edges are set
/// exactly once, at registration; registering an id twice is an invariant
/// violation.
pub struct Hierarchy {
    inner: RwLock<HierarchyInner>,
}

struct HierarchyInner {
    nodes: HashMap<NodeId, HierarchyNode>,
    root: NodeId,
}

impl Hierarchy {
    /// Build a registry around its root node.
    pub(crate) fn with_root(id: NodeId, role: Role, vitals: Arc<NodeVitals>) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            id,
            HierarchyNode {
                role,
                parent: None,
                children: Vec::new(),
                specialization: None,
                vitals,
            },
        );

        Self {
            inner: RwLock::new(HierarchyInner { nodes, root: id }),
        }
    }

    /// Register a node under its parent.
    ///
    /// Fails when the id is already present (a node has exactly one parent
    /// for its lifetime) or the parent is unknown.
    pub(crate) fn register(
        &self,
        id: NodeId,
        role: Role,
        parent: NodeId,
        specialization: Option<Specialization>,
        vitals: Arc<NodeVitals>,
    ) -> Result<(), CadreError> {
        let mut inner = self.inner.write();

        if inner.nodes.contains_key(&id) {
            return Err(CadreError::InvariantViolation(format!(
                "node {id} registered twice"
            )));
        }

        let parent_node = inner.nodes.get_mut(&parent).ok_or_else(|| {
            CadreError::InvariantViolation(format!("parent {parent} not registered"))
        })?;
        parent_node.children.push(id);

        inner.nodes.insert(
            id,
            HierarchyNode {
                role,
                parent: Some(parent),
                children: Vec::new(),
                specialization,
                vitals,
            },
        );

        Ok(())
    }

    pub fn root(&self) -> NodeId {
        self.inner.read().root
    }

    pub fn parent(&self, id: &NodeId) -> Option<NodeId> {
        self.inner.read().nodes.get(id).and_then(|n| n.parent)
    }

    /// Children of a node, in creation order.
    pub fn children(&self, id: &NodeId) -> Vec<NodeId> {
        self.inner
            .read()
            .nodes
            .get(id)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Total node count, root included.
    pub fn len(&self) -> usize {
        self.inner.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().nodes.is_empty()
    }

    /// Snapshot of the whole tree for an external monitor.
    ///
    /// Reads the registry and the per-node counters only, never a dispatch
    /// lock, so it cannot wait on an in-flight fan-out.
    pub fn status(&self) -> NodeStatus {
        let inner = self.inner.read();
        Self::status_node(&inner, inner.root)
    }

    fn status_node(inner: &HierarchyInner, id: NodeId) -> NodeStatus {
        let node = &inner.nodes[&id];
        NodeStatus {
            id,
            role: node.role,
            completed_tasks: node.vitals.completed_tasks(),
            pending_tasks: node.vitals.pending_tasks(),
            child_count: node.children.len(),
            specialization: node.specialization,
            children: node
                .children
                .iter()
                .map(|child| Self::status_node(inner, *child))
                .collect(),
        }
    }
}

/// Status-walk snapshot of one node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStatus {
    pub id: NodeId,
    pub role: Role,
    pub completed_tasks: usize,
    pub pending_tasks: usize,
    pub child_count: usize,
    pub specialization: Option<Specialization>,
    pub children: Vec<NodeStatus>,
}

impl NodeStatus {
    /// Nodes in this subtree with the given role.
    pub fn count_role(&self, role: Role) -> usize {
        let own = usize::from(self.role == role);
        own + self.children.iter().map(|c| c.count_role(role)).sum::<usize>()
    }
}

/// Grow a node's owned child list up to `required` members.
///
/// Returns the first `required` children in creation order, creating only
/// the deficit through `factory`. The mutex serializes growth for that
/// node, so two concurrent submissions never both decide to create the
/// same deficit. The returned snapshot lets dispatch proceed lock-free.
pub(crate) fn ensure_children<T, F>(
    slots: &Mutex<Vec<Arc<T>>>,
    required: usize,
    mut factory: F,
) -> Result<Vec<Arc<T>>, CadreError>
where
    F: FnMut(usize) -> Result<Arc<T>, CadreError>,
{
    let mut children = slots.lock();
    while children.len() < required {
        let child = factory(children.len())?;
        children.push(child);
    }
    Ok(children.iter().take(required).cloned().collect())
}
