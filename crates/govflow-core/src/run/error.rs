//! Run module error types.

use thiserror::Error;

use crate::error::ErrorKind;
use crate::work::WorkError;

/// Errors that can occur during run orchestration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunError {
    /// The target period is administratively locked.
    #[error("period {period} is locked for tenant {tenant_id}")]
    PeriodLocked {
        /// The tenant.
        tenant_id: String,
        /// The locked period key.
        period: String,
    },

    /// A run already exists for this (tenant, period).
    #[error("run already exists for period {period} in tenant {tenant_id}")]
    DuplicateRun {
        /// The tenant.
        tenant_id: String,
        /// The period key that already has a run.
        period: String,
    },

    /// Run not found.
    #[error("run not found: {run_id}")]
    RunNotFound {
        /// The run id that was not found.
        run_id: String,
    },

    /// The action is not legal from the run's current state.
    #[error("{action} is not allowed from state {from_state} for run {run_id}")]
    TransitionNotAllowed {
        /// The run id.
        run_id: String,
        /// The current state, canonical form.
        from_state: &'static str,
        /// The attempted action.
        action: &'static str,
    },

    /// The period descriptor is malformed.
    #[error("invalid period: {reason}")]
    InvalidPeriod {
        /// Why the period was rejected.
        reason: String,
    },

    /// A work-item operation failed while materializing the run.
    #[error(transparent)]
    Work(#[from] WorkError),
}

impl RunError {
    /// Returns the cross-cutting classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PeriodLocked { .. } => ErrorKind::Locked,
            Self::DuplicateRun { .. } => ErrorKind::Conflict,
            Self::RunNotFound { .. } => ErrorKind::NotFound,
            Self::TransitionNotAllowed { .. } | Self::InvalidPeriod { .. } => ErrorKind::Validation,
            Self::Work(e) => e.kind(),
        }
    }
}
