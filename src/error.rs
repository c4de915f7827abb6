//! Cadre error types

use thiserror::Error;

/// Errors that can occur in the delegation engine.
///
/// Worker-level failures are not errors: they are contained at the leaf and
/// reported as failed outcomes. Only structural problems surface here.
#[derive(Debug, Error)]
pub enum CadreError {
    /// A structural invariant of the tree was violated (e.g. a node
    /// registered under two parents). Fatal for the submission that
    /// observed it.
    #[error("structural invariant violated: {0}")]
    InvariantViolation(String),

    /// A mid-tier dispatch task died before reporting its outcome.
    #[error("dispatch failure: {0}")]
    DispatchFailure(String),
}
