//! Work-item store and lifecycle manager.
//!
//! Every transition is atomic with respect to the store: the guard checks,
//! the state write, and the event emission all happen while the store's
//! write lock is held, so a failed guard leaves no partial write and no
//! stray event. A transactional database backend provides the same contract
//! with a transaction in place of the lock.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use super::error::WorkError;
use super::state::{AuthorityRole, WorkItem, WorkItemKind, WorkItemState};
use crate::events::{
    EVENT_WORK_ITEM_APPROVED, EVENT_WORK_ITEM_REJECTED, EVENT_WORK_ITEM_RETURNED,
    EVENT_WORK_ITEM_SUBMITTED, EventSink, GovernanceEvent,
};
use crate::evidence::RecordRegistry;
use crate::sla::SlaSeverity;

/// Parameters for creating a work item.
#[derive(Debug, Clone)]
pub struct NewWorkItem {
    /// Parent run id; None for standalone items.
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

    /// Whether submission requires linked evidence.
    pub evidence_required: bool,
}

impl NewWorkItem {
    /// Materializes the work item with a fresh id.
    #[must_use]
    pub fn into_item(self, tenant_id: &str, now: DateTime<Utc>) -> WorkItem {
        WorkItem {
            item_id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            run_id: self.run_id,
            kind: self.kind,
            code: self.code,
            title: self.title,
            owner_id: self.owner_id,
            approver_id: self.approver_id,
            required_role: self.required_role,
            due_at: self.due_at,
            state: WorkItemState::Open,
            severity: SlaSeverity::Ok,
            severity_changed_at: None,
            evidence_required: self.evidence_required,
            submitted_at: None,
            approved_at: None,
            return_reason: None,
            created_at: now,
        }
    }
}

/// Mutation callback run under the store's write lock.
///
/// Returns the events to emit inside the same critical section.
pub type ItemMutation<'a> =
    &'a mut dyn FnMut(&mut WorkItem) -> Result<Vec<GovernanceEvent>, WorkError>;

/// Repository seam for work items.
///
/// Implementations must make `with_item_mut` atomic: the mutation callback
/// runs with exclusive access, a callback error discards the write, and
/// returned events are emitted before the exclusivity ends.
pub trait WorkItemStore: Send + Sync {
    /// Inserts a new item.
    ///
    /// # Errors
    ///
    /// Returns `WorkError::ItemAlreadyExists` on id collision.
    fn insert(&self, item: WorkItem) -> Result<(), WorkError>;

    /// Returns one item.
    ///
    /// # Errors
    ///
    /// Returns `WorkError::ItemNotFound` when absent.
    fn get(&self, tenant_id: &str, item_id: &str) -> Result<WorkItem, WorkError>;

    /// Returns all items for a tenant, ordered by item id.
    fn list(&self, tenant_id: &str) -> Vec<WorkItem>;

    /// Returns all items attached to a run, ordered by item id.
    fn list_by_run(&self, tenant_id: &str, run_id: &str) -> Vec<WorkItem>;

    /// Returns items the SLA clock evaluates (`Open`/`InProgress`), ordered
    /// by item id.
    fn list_clock_evaluated(&self, tenant_id: &str) -> Vec<WorkItem>;

    /// Runs `mutate` on the item under the store's write lock, emitting the
    /// returned events into `sink` before the lock is released.
    ///
    /// # Errors
    ///
    /// Returns `WorkError::ItemNotFound` when the item is absent, or the
    /// mutation's own error, in which case no write and no emission occur.
    fn with_item_mut(
        &self,
        tenant_id: &str,
        item_id: &str,
        sink: &dyn EventSink,
        mutate: ItemMutation<'_>,
    ) -> Result<WorkItem, WorkError>;
}

/// In-memory work-item store.
#[derive(Debug, Default)]
pub struct MemoryWorkItemStore {
    items: Arc<RwLock<HashMap<(String, String), WorkItem>>>,
}

impl MemoryWorkItemStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(mut items: Vec<WorkItem>) -> Vec<WorkItem> {
        items.sort_by(|a, b| a.item_id.cmp(&b.item_id));
        items
    }
}

impl Clone for MemoryWorkItemStore {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl WorkItemStore for MemoryWorkItemStore {
    fn insert(&self, item: WorkItem) -> Result<(), WorkError> {
        let mut items = self.items.write().expect("lock poisoned");
        let key = (item.tenant_id.clone(), item.item_id.clone());
        if items.contains_key(&key) {
            return Err(WorkError::ItemAlreadyExists {
                item_id: item.item_id,
            });
        }
        items.insert(key, item);
        Ok(())
    }

    fn get(&self, tenant_id: &str, item_id: &str) -> Result<WorkItem, WorkError> {
        let items = self.items.read().expect("lock poisoned");
        items
            .get(&(tenant_id.to_string(), item_id.to_string()))
            .cloned()
            .ok_or_else(|| WorkError::ItemNotFound {
                item_id: item_id.to_string(),
            })
    }

    fn list(&self, tenant_id: &str) -> Vec<WorkItem> {
        let items = self.items.read().expect("lock poisoned");
        Self::sorted(
            items
                .values()
                .filter(|item| item.tenant_id == tenant_id)
                .cloned()
                .collect(),
        )
    }

    fn list_by_run(&self, tenant_id: &str, run_id: &str) -> Vec<WorkItem> {
        let items = self.items.read().expect("lock poisoned");
        Self::sorted(
            items
                .values()
                .filter(|item| {
                    item.tenant_id == tenant_id && item.run_id.as_deref() == Some(run_id)
                })
                .cloned()
                .collect(),
        )
    }

    fn list_clock_evaluated(&self, tenant_id: &str) -> Vec<WorkItem> {
        let items = self.items.read().expect("lock poisoned");
        Self::sorted(
            items
                .values()
                .filter(|item| item.tenant_id == tenant_id && item.state.is_clock_evaluated())
                .cloned()
                .collect(),
        )
    }

    fn with_item_mut(
        &self,
        tenant_id: &str,
        item_id: &str,
        sink: &dyn EventSink,
        mutate: ItemMutation<'_>,
    ) -> Result<WorkItem, WorkError> {
        let mut items = self.items.write().expect("lock poisoned");
        let key = (tenant_id.to_string(), item_id.to_string());
        let current = items.get(&key).ok_or_else(|| WorkError::ItemNotFound {
            item_id: item_id.to_string(),
        })?;

        // Mutate a clone so a guard failure discards the write entirely.
        let mut updated = current.clone();
        let events = mutate(&mut updated)?;

        items.insert(key, updated.clone());
        for event in events {
            sink.emit(event);
        }
        Ok(updated)
    }
}

/// Lifecycle manager enforcing the work-item state machine.
pub struct LifecycleManager {
    store: Arc<dyn WorkItemStore>,
    registry: RecordRegistry,
    sink: Arc<dyn EventSink>,
}

impl LifecycleManager {
    /// Creates a manager over a store, evidence registry, and event sink.
    pub fn new(
        store: Arc<dyn WorkItemStore>,
        registry: RecordRegistry,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            store,
            registry,
            sink,
        }
    }

    /// Moves an item into `InProgress`.
    ///
    /// Legal from `Open` (first pickup) and `Returned` (rework after a
    /// return). Owner only.
    ///
    /// # Errors
    ///
    /// `TransitionNotAllowed` from any other state; `NotOwner` for any
    /// other actor.
    pub fn begin(
        &self,
        tenant_id: &str,
        item_id: &str,
        actor_id: &str,
    ) -> Result<WorkItem, WorkError> {
        let updated = self.store.with_item_mut(
            tenant_id,
            item_id,
            self.sink.as_ref(),
            &mut |item| {
                if item.owner_id != actor_id {
                    return Err(WorkError::NotOwner {
                        item_id: item.item_id.clone(),
                        actor_id: actor_id.to_string(),
                    });
                }
                if !matches!(item.state, WorkItemState::Open | WorkItemState::Returned) {
                    return Err(WorkError::TransitionNotAllowed {
                        item_id: item.item_id.clone(),
                        from_state: item.state,
                        action: "begin",
                    });
                }
                item.state = WorkItemState::InProgress;
                Ok(Vec::new())
            },
        )?;
        debug!(tenant_id, item_id, "work item moved to IN_PROGRESS");
        Ok(updated)
    }

    /// Submits an item for approval.
    ///
    /// Legal from `Open` or `InProgress`; owner only; items flagged
    /// `evidence_required` must have at least one linked evidence record.
    /// Submission is the state-changing action that resets SLA severity.
    ///
    /// # Errors
    ///
    /// `TransitionNotAllowed`, `NotOwner`, or `EvidenceRequired` per the
    /// guards above.
    pub fn submit(
        &self,
        tenant_id: &str,
        item_id: &str,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> Result<WorkItem, WorkError> {
        let registry = &self.registry;
        let updated = self.store.with_item_mut(
            tenant_id,
            item_id,
            self.sink.as_ref(),
            &mut |item| {
                if item.owner_id != actor_id {
                    return Err(WorkError::NotOwner {
                        item_id: item.item_id.clone(),
                        actor_id: actor_id.to_string(),
                    });
                }
                if !matches!(item.state, WorkItemState::Open | WorkItemState::InProgress) {
                    return Err(WorkError::TransitionNotAllowed {
                        item_id: item.item_id.clone(),
                        from_state: item.state,
                        action: "submit",
                    });
                }
                if item.evidence_required
                    && registry.link_count(tenant_id, item.kind.as_str(), &item.item_id) == 0
                {
                    return Err(WorkError::EvidenceRequired {
                        item_id: item.item_id.clone(),
                    });
                }

                item.state = WorkItemState::Submitted;
                item.submitted_at = Some(now);
                item.severity = SlaSeverity::Ok;
                item.severity_changed_at = Some(now);

                Ok(vec![GovernanceEvent::new(
                    EVENT_WORK_ITEM_SUBMITTED,
                    tenant_id,
                    &item.item_id,
                    item.state.as_str(),
                    now,
                )])
            },
        )?;
        debug!(tenant_id, item_id, "work item submitted");
        Ok(updated)
    }

    /// Returns a submitted item to its owner for rework.
    ///
    /// Legal from `Submitted` only; designated approver only.
    ///
    /// # Errors
    ///
    /// `TransitionNotAllowed` or `NotApprover` per the guards above.
    pub fn return_item(
        &self,
        tenant_id: &str,
        item_id: &str,
        actor_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<WorkItem, WorkError> {
        let updated = self.store.with_item_mut(
            tenant_id,
            item_id,
            self.sink.as_ref(),
            &mut |item| {
                if item.state != WorkItemState::Submitted {
                    return Err(WorkError::TransitionNotAllowed {
                        item_id: item.item_id.clone(),
                        from_state: item.state,
                        action: "return",
                    });
                }
                if item.approver_id != actor_id {
                    return Err(WorkError::NotApprover {
                        item_id: item.item_id.clone(),
                        actor_id: actor_id.to_string(),
                    });
                }

                item.state = WorkItemState::Returned;
                item.return_reason = Some(reason.to_string());

                Ok(vec![GovernanceEvent::new(
                    EVENT_WORK_ITEM_RETURNED,
                    tenant_id,
                    &item.item_id,
                    item.state.as_str(),
                    now,
                )])
            },
        )?;
        debug!(tenant_id, item_id, reason, "work item returned");
        Ok(updated)
    }

    /// Approves a submitted item.
    ///
    /// Legal from `Submitted` only; requires actor authority at or above
    /// the item's required role. Severity freezes at its last value.
    ///
    /// # Errors
    ///
    /// `TransitionNotAllowed` or `InsufficientAuthority` per the guards
    /// above.
    pub fn approve(
        &self,
        tenant_id: &str,
        item_id: &str,
        actor_id: &str,
        actor_role: AuthorityRole,
        now: DateTime<Utc>,
    ) -> Result<WorkItem, WorkError> {
        let updated = self.store.with_item_mut(
            tenant_id,
            item_id,
            self.sink.as_ref(),
            &mut |item| {
                if item.state != WorkItemState::Submitted {
                    return Err(WorkError::TransitionNotAllowed {
                        item_id: item.item_id.clone(),
                        from_state: item.state,
                        action: "approve",
                    });
                }
                if actor_role < item.required_role {
                    return Err(WorkError::InsufficientAuthority {
                        item_id: item.item_id.clone(),
                        required: item.required_role,
                        actual: actor_role,
                    });
                }

                item.state = WorkItemState::Approved;
                item.approved_at = Some(now);

                Ok(vec![GovernanceEvent::new(
                    EVENT_WORK_ITEM_APPROVED,
                    tenant_id,
                    &item.item_id,
                    item.state.as_str(),
                    now,
                )])
            },
        )?;
        debug!(tenant_id, item_id, actor_id, "work item approved");
        Ok(updated)
    }

    /// Terminally rejects a submitted item.
    ///
    /// Same guards as [`approve`](Self::approve); `Rejected` is absorbing.
    ///
    /// # Errors
    ///
    /// `TransitionNotAllowed` or `InsufficientAuthority` per the guards.
    pub fn reject(
        &self,
        tenant_id: &str,
        item_id: &str,
        actor_id: &str,
        actor_role: AuthorityRole,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<WorkItem, WorkError> {
        let updated = self.store.with_item_mut(
            tenant_id,
            item_id,
            self.sink.as_ref(),
            &mut |item| {
                if item.state != WorkItemState::Submitted {
                    return Err(WorkError::TransitionNotAllowed {
                        item_id: item.item_id.clone(),
                        from_state: item.state,
                        action: "reject",
                    });
                }
                if actor_role < item.required_role {
                    return Err(WorkError::InsufficientAuthority {
                        item_id: item.item_id.clone(),
                        required: item.required_role,
                        actual: actor_role,
                    });
                }

                item.state = WorkItemState::Rejected;
                item.return_reason = Some(reason.to_string());

                Ok(vec![GovernanceEvent::new(
                    EVENT_WORK_ITEM_REJECTED,
                    tenant_id,
                    &item.item_id,
                    item.state.as_str(),
                    now,
                )])
            },
        )?;
        debug!(tenant_id, item_id, actor_id, reason, "work item rejected");
        Ok(updated)
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn WorkItemStore> {
        &self.store
    }
}
