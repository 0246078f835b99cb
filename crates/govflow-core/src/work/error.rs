//! Work module error types.

use thiserror::Error;

use super::state::{AuthorityRole, WorkItemState};
use crate::error::ErrorKind;

/// Errors that can occur during work lifecycle operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WorkError {
    /// Work item already exists.
    #[error("work item already exists: {item_id}")]
    ItemAlreadyExists {
        /// The item id that already exists.
        item_id: String,
    },

    /// Work item not found.
    #[error("work item not found: {item_id}")]
    ItemNotFound {
        /// The item id that was not found.
        item_id: String,
    },

    /// The action is not legal from the item's current state.
    #[error("{action} is not allowed from state {from_state} for item {item_id}")]
    TransitionNotAllowed {
        /// The item id.
        item_id: String,
        /// The current state.
        from_state: WorkItemState,
        /// The attempted action.
        action: &'static str,
    },

    /// The actor is not the item's assigned owner.
    #[error("actor {actor_id} is not the owner of item {item_id}")]
    NotOwner {
        /// The item id.
        item_id: String,
        /// The actor that attempted the action.
        actor_id: String,
    },

    /// The actor is not the item's designated approver.
    #[error("actor {actor_id} is not the approver of item {item_id}")]
    NotApprover {
        /// The item id.
        item_id: String,
        /// The actor that attempted the action.
        actor_id: String,
    },

    /// The actor's authority is below the item's required approval role.
    #[error("approval of item {item_id} requires {required} authority, actor has {actual}")]
    InsufficientAuthority {
        /// The item id.
        item_id: String,
        /// The role the item requires.
        required: AuthorityRole,
        /// The role the actor holds.
        actual: AuthorityRole,
    },

    /// Submission requires at least one linked evidence record.
    #[error("cannot submit item {item_id} without linked evidence")]
    EvidenceRequired {
        /// The item id.
        item_id: String,
    },

    /// Invalid work state string.
    #[error("invalid work state: {value}")]
    InvalidState {
        /// The invalid state string.
        value: String,
    },

    /// Invalid work kind string.
    #[error("invalid work kind: {value}")]
    InvalidKind {
        /// The invalid kind string.
        value: String,
    },

    /// Invalid authority role string.
    #[error("invalid authority role: {value}")]
    InvalidRole {
        /// The invalid role string.
        value: String,
    },

    /// Storage backend error.
    #[error("work storage error: {message}")]
    Storage {
        /// Description of the failure.
        message: String,
    },
}

impl WorkError {
    /// Returns the cross-cutting classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ItemAlreadyExists { .. } => ErrorKind::Conflict,
            Self::ItemNotFound { .. } => ErrorKind::NotFound,
            Self::TransitionNotAllowed { .. }
            | Self::EvidenceRequired { .. }
            | Self::InvalidState { .. }
            | Self::InvalidKind { .. }
            | Self::InvalidRole { .. } => ErrorKind::Validation,
            Self::NotOwner { .. } | Self::NotApprover { .. } | Self::InsufficientAuthority { .. } => {
                ErrorKind::Forbidden
            }
            Self::Storage { .. } => ErrorKind::Io,
        }
    }
}
