//! # Cadre
//!
//! Hierarchical task delegation and reconciliation engine - the chain of
//! command.
//!
//! A submitted task is sized into a resource plan, fanned out across a
//! lazily grown four-tier tree of workers, and the leaf results are
//! gathered back up unreduced. With reconciliation enabled, disagreeing
//! leaves trigger follow-up rounds through the same tree until consensus
//! or a configured round cap.
//!
//! ## Architecture
//!
//! ```text
//!                      ┌────────────────────────────┐
//!                      │      ROOT COORDINATOR       │
//!                      │  plan · grow · reconcile    │
//!                      └─────────────┬──────────────┘
//!                          ┌─────────┴─────────┐
//!                          ▼                   ▼
//!                  ┌──────────────┐    ┌──────────────┐
//!                  │ SubCoordinator│    │ SubCoordinator│
//!                  └──────┬───────┘    └──────┬───────┘
//!                    ┌────┴────┐          ┌───┴─────┐
//!                    ▼         ▼          ▼         ▼
//!                ┌───────┐ ┌───────┐  ┌───────┐ ┌───────┐
//!                │Splitter│ │Splitter│  │Splitter│ │Splitter│
//!                └───┬───┘ └───┬───┘  └───┬───┘ └───┬───┘
//!                 ┌──┴──┐   ┌──┴──┐    ┌──┴──┐   ┌──┴──┐
//!                 ▼     ▼   ▼     ▼    ▼     ▼   ▼     ▼
//!                ┌──┐  ┌──┐┌──┐  ┌──┐ ┌──┐  ┌──┐┌──┐  ┌──┐
//!                │W │  │W ││W │  │W │ │W │  │W ││W │  │W │
//!                └──┘  └──┘└──┘  └──┘ └──┘  └──┘└──┘  └──┘
//! ```
//!
//! ## Key Concepts
//!
//! - **Task**: an immutable unit of work with free-form JSON attributes
//! - **Resource plan**: the per-tier node counts computed for one task
//! - **Fan-out/gather**: concurrent dispatch to all children of a node,
//!   joined before anything is returned upward
//! - **Reconciliation round**: one cycle of grouping leaf outcomes and, on
//!   disagreement, resubmitting a derived task
//! - **Specialization**: the tag selecting which pluggable capability a
//!   worker invokes

pub mod activity;
pub mod capability;
pub mod coordinator;
pub mod error;
pub mod hierarchy;
pub mod node;
pub mod outcome;
pub mod planner;
pub mod reconcile;
pub mod splitter;
pub mod subcoordinator;
pub mod task;
pub mod worker;

pub use activity::{
    Activity, ActivityFilter, ActivitySink, ActivityStatus, ChannelSink, MemorySink, TracingSink,
};
pub use capability::{Capability, CapabilityRegistry, PlaceholderCapability, Specialization};
pub use coordinator::{RootCoordinator, SubmissionOutcome};
pub use error::CadreError;
pub use hierarchy::{Hierarchy, NodeStatus};
pub use node::{NodeId, NodeVitals, Role};
pub use outcome::{
    DelegationOutcome, Outcome, OutcomeStatus, SplitterOutcome, SubCoordinatorOutcome,
};
pub use planner::{plan, ResourcePlan, SUB_COORDINATOR_COUNT};
pub use reconcile::{
    OutcomeGroup, ReconciliationRound, RoundStatus, DEFAULT_MAX_RECONCILE_ROUNDS,
};
pub use splitter::SplitterNode;
pub use subcoordinator::SubCoordinatorNode;
pub use task::{Task, TaskId};
pub use worker::WorkerNode;
