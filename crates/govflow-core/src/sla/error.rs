//! SLA module error types.

use thiserror::Error;

use crate::error::ErrorKind;
use crate::work::WorkError;

/// Errors that can occur during SLA evaluation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SlaError {
    /// Policy thresholds are not monotonically ordered.
    #[error(
        "invalid SLA thresholds: require grace ({grace_hours}) <= escal1 ({escal1_hours}) < escal2 ({escal2_hours})"
    )]
    InvalidThresholds {
        /// Grace window in hours.
        grace_hours: i64,
        /// First escalation threshold in hours.
        escal1_hours: i64,
        /// Second escalation threshold in hours.
        escal2_hours: i64,
    },

    /// A threshold is negative.
    #[error("negative SLA threshold: {field} = {value}")]
    NegativeThreshold {
        /// The offending field.
        field: &'static str,
        /// The offending value.
        value: i64,
    },

    /// Invalid severity string.
    #[error("invalid SLA severity: {value}")]
    InvalidSeverity {
        /// The invalid value.
        value: String,
    },

    /// Work-item store operation failed during a tick.
    #[error(transparent)]
    Work(#[from] WorkError),
}

impl SlaError {
    /// Returns the cross-cutting classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidThresholds { .. }
            | Self::NegativeThreshold { .. }
            | Self::InvalidSeverity { .. } => ErrorKind::Validation,
            Self::Work(e) => e.kind(),
        }
    }
}
