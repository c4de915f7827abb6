//! Activity side channel - what nodes report after executing

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::node::{NodeId, Role};
use crate::task::TaskId;

/// Success marker on an activity record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Success,
    Failure,
}

/// One node-level execution record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub node_id: NodeId,
    pub role: Role,
    pub activity_type: String,
    pub details: Value,
    pub task_id: Option<TaskId>,
    pub status: ActivityStatus,
    pub error: Option<String>,
}

/// Consumer of activity records.
///
/// Recording is infallible by contract: a sink that cannot deliver must
/// swallow the record rather than surface anything into the dispatch path.
pub trait ActivitySink: Send + Sync {
    fn record(&self, activity: Activity);
}

/// Default sink - forwards records to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ActivitySink for TracingSink {
    fn record(&self, activity: Activity) {
        match &activity.error {
            Some(err) => error!(
                node_id = %activity.node_id,
                role = %activity.role,
                activity_type = %activity.activity_type,
                error = %err,
                "node activity failed"
            ),
            None => info!(
                node_id = %activity.node_id,
                role = %activity.role,
                activity_type = %activity.activity_type,
                "node activity"
            ),
        }
    }
}

/// Filters for [`MemorySink::filtered`]; unset fields match everything
#[derive(Debug, Default, Clone)]
pub struct ActivityFilter {
    pub node_id: Option<NodeId>,
    pub activity_type: Option<String>,
    pub task_id: Option<TaskId>,
    pub status: Option<ActivityStatus>,
}

/// In-memory sink with filtered retrieval, for tests and activity feeds
#[derive(Default)]
pub struct MemorySink {
    activities: Mutex<Vec<Activity>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activities(&self) -> Vec<Activity> {
        self.activities.lock().clone()
    }

    /// Records matching every set filter field.
    pub fn filtered(&self, filter: &ActivityFilter) -> Vec<Activity> {
        self.activities
            .lock()
            .iter()
            .filter(|a| filter.node_id.map_or(true, |id| a.node_id == id))
            .filter(|a| {
                filter
                    .activity_type
                    .as_deref()
                    .map_or(true, |t| a.activity_type == t)
            })
            .filter(|a| filter.task_id.map_or(true, |id| a.task_id == Some(id)))
            .filter(|a| filter.status.map_or(true, |s| a.status == s))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.activities.lock().clear();
    }
}

impl ActivitySink for MemorySink {
    fn record(&self, activity: Activity) {
        self.activities.lock().push(activity);
    }
}

/// Sink forwarding records over an unbounded channel to an external
/// consumer. A gone consumer drops records silently.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Activity>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Activity>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ActivitySink for ChannelSink {
    fn record(&self, activity: Activity) {
        let _ = self.tx.send(activity);
    }
}
