//! Work-item data model and lifecycle management.
//!
//! Work items are the trackable units of a governed run: close tasks,
//! attestation tasks, control runs, and test plans share one state-machine
//! core with kind-specific context carried as data.
//!
//! # Architecture
//!
//! ```text
//! Open --> InProgress --> Submitted --> Approved (absorbing)
//!             ^              |
//!             |              +--> Returned --> InProgress (resubmission loop)
//!             |              |
//!             +--------------+--> Rejected (absorbing)
//! ```
//!
//! # Key Concepts
//!
//! - **Owner**: the only actor allowed to begin/submit an item
//! - **Approver**: the designated actor for returns; approvals additionally
//!   require authority at or above the item's required role
//! - **Evidence gate**: items flagged `evidence_required` cannot be
//!   submitted without at least one linked evidence record
//! - **Atomic transitions**: guard, state write, and event emission happen
//!   inside one store critical section

mod error;
mod lifecycle;
mod state;

#[cfg(test)]
mod tests;

pub use error::WorkError;
pub use lifecycle::{
    ItemMutation, LifecycleManager, MemoryWorkItemStore, NewWorkItem, WorkItemStore,
};
pub use state::{AuthorityRole, WorkItem, WorkItemKind, WorkItemState};
