//! Error types for the provisioning core
//!
//! The load-bearing split is `GatewayError::Transient` vs `Permanent`:
//! transient failures may be retried by the caller, permanent failures
//! abort the run. Everything downstream of provisioning (identity wait
//! exhaustion, grant failures, verification findings) is absorbed into
//! the run report instead of unwinding.

use crate::spec::{ResourceId, ResourceKind};

/// Failure reported by the remote control plane.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    /// Network blips, quota pushback, not-yet-visible resources.
    #[error("transient provider failure: {0}")]
    Transient(String),

    /// Authorization denied or malformed definition. Not retryable.
    #[error("permanent provider failure: {0}")]
    Permanent(String),
}

impl GatewayError {
    /// Check if the caller may retry this failure.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Short class label for report text.
    #[must_use]
    pub fn class(&self) -> &'static str {
        match self {
            Self::Transient(_) => "transient",
            Self::Permanent(_) => "permanent",
        }
    }
}

/// Structural problems in a resource plan, detected before any provider call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// Two specs claim the same identifier
    #[error("duplicate resource id: {0}")]
    DuplicateId(ResourceId),

    /// A dependency references an id that is not in the plan
    #[error("{id} depends on unknown resource {dependency}")]
    UnknownDependency {
        id: ResourceId,
        dependency: ResourceId,
    },

    /// The dependency graph contains a cycle
    #[error("dependency cycle involving {0}")]
    CycleDetected(ResourceId),

    /// A dependency points sideways or upward in the creation order
    #[error("{id} ({kind}) cannot depend on {dependency} ({dependency_kind}): \
             base resources are created before tables, tables before models")]
    TierInversion {
        id: ResourceId,
        kind: ResourceKind,
        dependency: ResourceId,
        dependency_kind: ResourceKind,
    },
}

/// Errors that end a setup run without a normal report.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("invalid resource plan: {0}")]
    Plan(#[from] PlanError),

    /// Operator interrupt observed at a create/poll boundary.
    #[error("run cancelled")]
    Cancelled,
}
