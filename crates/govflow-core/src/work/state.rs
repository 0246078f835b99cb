//! Work-item state model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::WorkError;
use crate::sla::SlaSeverity;

/// The kind of work a tracked item represents.
///
/// All kinds share the same lifecycle; the kind selects business context
/// (which template produced it, which subsystem references it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum WorkItemKind {
    /// Period-close checklist task.
    CloseTask,

    /// Attestation campaign task.
    AttestTask,

    /// Control execution run.
    ControlRun,

    /// SOX test plan.
    TestPlan,
}

impl WorkItemKind {
    /// Returns the canonical `SCREAMING_SNAKE_CASE` form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CloseTask => "CLOSE_TASK",
            Self::AttestTask => "ATTEST_TASK",
            Self::ControlRun => "CTRL_RUN",
            Self::TestPlan => "TEST_PLAN",
        }
    }

    /// Parses a work-item kind from a string.
    ///
    /// # Errors
    ///
    /// Returns `WorkError::InvalidKind` if the string is not recognized.
    pub fn parse(s: &str) -> Result<Self, WorkError> {
        match s.to_uppercase().as_str() {
            "CLOSE_TASK" => Ok(Self::CloseTask),
            "ATTEST_TASK" => Ok(Self::AttestTask),
            "CTRL_RUN" => Ok(Self::ControlRun),
            "TEST_PLAN" => Ok(Self::TestPlan),
            _ => Err(WorkError::InvalidKind {
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for WorkItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkItemState {
    /// Created, not yet picked up.
    Open,

    /// Being worked by the owner.
    InProgress,

    /// Awaiting approval.
    Submitted,

    /// Approved; absorbing.
    Approved,

    /// Sent back by the approver for rework.
    Returned,

    /// Terminally rejected; absorbing.
    Rejected,

    /// Administratively completed without approval flow; absorbing.
    Done,
}

impl WorkItemState {
    /// Returns the canonical `SCREAMING_SNAKE_CASE` form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::InProgress => "IN_PROGRESS",
            Self::Submitted => "SUBMITTED",
            Self::Approved => "APPROVED",
            Self::Returned => "RETURNED",
            Self::Rejected => "REJECTED",
            Self::Done => "DONE",
        }
    }

    /// Parses a work-item state from a string.
    ///
    /// # Errors
    ///
    /// Returns `WorkError::InvalidState` if the string is not recognized.
    pub fn parse(s: &str) -> Result<Self, WorkError> {
        match s.to_uppercase().as_str() {
            "OPEN" => Ok(Self::Open),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "SUBMITTED" => Ok(Self::Submitted),
            "APPROVED" => Ok(Self::Approved),
            "RETURNED" => Ok(Self::Returned),
            "REJECTED" => Ok(Self::Rejected),
            "DONE" => Ok(Self::Done),
            _ => Err(WorkError::InvalidState {
                value: s.to_string(),
            }),
        }
    }

    /// True for absorbing states that accept no further transitions.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Done)
    }

    /// True for states the SLA clock evaluates.
    ///
    /// Submitted items are awaiting someone else's action and closed items
    /// keep their severity frozen at its last value.
    #[must_use]
    pub const fn is_clock_evaluated(&self) -> bool {
        matches!(self, Self::Open | Self::InProgress)
    }
}

impl std::fmt::Display for WorkItemState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ordered approval authority.
///
/// `Manager < Controller < Cfo`; approving an item requires authority at or
/// above the item's required role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorityRole {
    /// Line manager.
    Manager,

    /// Corporate controller.
    Controller,

    /// Chief financial officer.
    Cfo,
}

impl AuthorityRole {
    /// Returns the canonical `SCREAMING_SNAKE_CASE` form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Manager => "MANAGER",
            Self::Controller => "CONTROLLER",
            Self::Cfo => "CFO",
        }
    }

    /// Parses an authority role from a string.
    ///
    /// # Errors
    ///
    /// Returns `WorkError::InvalidRole` if the string is not recognized.
    pub fn parse(s: &str) -> Result<Self, WorkError> {
        match s.to_uppercase().as_str() {
            "MANAGER" => Ok(Self::Manager),
            "CONTROLLER" => Ok(Self::Controller),
            "CFO" => Ok(Self::Cfo),
            _ => Err(WorkError::InvalidRole {
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for AuthorityRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A tracked work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Item id.
    pub item_id: String,

    /// Owning tenant.
    pub tenant_id: String,

    /// Parent run id; None for standalone control runs.
    pub run_id: Option<String>,

    /// What kind of work this is.
    pub kind: WorkItemKind,

    /// Short code (e.g. `REC-CASH`).
    pub code: String,

    /// Human-readable title.
    pub title: String,

    /// Actor responsible for performing the work.
    pub owner_id: String,

    /// Actor designated to review submissions.
    pub approver_id: String,

    /// Minimum authority required to approve or reject.
    pub required_role: AuthorityRole,

    /// SLA due timestamp; None exempts the item from clock evaluation.
    pub due_at: Option<DateTime<Utc>>,

    /// Current lifecycle state.
    pub state: WorkItemState,

    /// Current SLA severity.
    pub severity: SlaSeverity,

    /// When the severity last changed (drives the Late safety net).
    pub severity_changed_at: Option<DateTime<Utc>>,

    /// Whether submission requires at least one linked evidence record.
    pub evidence_required: bool,

    /// When the item was last submitted.
    pub submitted_at: Option<DateTime<Utc>>,

    /// When the item was approved.
    pub approved_at: Option<DateTime<Utc>>,

    /// Reason recorded by the approver on the last return.
    pub return_reason: Option<String>,

    /// When the item was created.
    pub created_at: DateTime<Utc>,
}

impl WorkItem {
    /// True for absorbing states.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
