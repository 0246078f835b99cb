//! Structured outbound governance events.
//!
//! The lifecycle manager, run orchestrator, and SLA clock emit structured
//! events onto an [`EventSink`]. Delivery (email, webhook, topic naming) is
//! the surrounding platform's concern; the engine only guarantees that an
//! event is emitted exactly once per observed transition, inside the same
//! critical section as the state write that caused it.
//!
//! Two sinks ship with the crate:
//!
//! - [`MemoryEventSink`]: in-memory buffer for tests and embedding
//! - [`crate::ledger::LedgerEventSink`]: durable append to the audit ledger

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event type for a work item entering `Submitted`.
pub const EVENT_WORK_ITEM_SUBMITTED: &str = "work_item.submitted";

/// Event type for a work item returned to its owner.
pub const EVENT_WORK_ITEM_RETURNED: &str = "work_item.returned";

/// Event type for a work item approved.
pub const EVENT_WORK_ITEM_APPROVED: &str = "work_item.approved";

/// Event type for a work item terminally rejected.
pub const EVENT_WORK_ITEM_REJECTED: &str = "work_item.rejected";

/// Event type for an SLA severity transition.
pub const EVENT_SLA_SEVERITY_CHANGED: &str = "sla.severity_changed";

/// Event type for a run starting.
pub const EVENT_RUN_STARTED: &str = "run.started";

/// Event type for a run closing.
pub const EVENT_RUN_CLOSED: &str = "run.closed";

/// A structured governance event.
///
/// `detail` carries the severity or state string the transition landed on,
/// e.g. `"SUBMITTED"` or `"LATE"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceEvent {
    /// Event type identifier (`work_item.submitted`, `sla.severity_changed`, ...).
    pub event_type: String,

    /// Tenant the event belongs to.
    pub tenant_id: String,

    /// The work item or run the event is about.
    pub subject_id: String,

    /// Severity or state the subject transitioned to.
    pub detail: String,

    /// When the transition was observed.
    pub timestamp: DateTime<Utc>,
}

impl GovernanceEvent {
    /// Creates a new event stamped with the given timestamp.
    #[must_use]
    pub fn new(
        event_type: impl Into<String>,
        tenant_id: impl Into<String>,
        subject_id: impl Into<String>,
        detail: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            tenant_id: tenant_id.into(),
            subject_id: subject_id.into(),
            detail: detail.into(),
            timestamp,
        }
    }

    /// Returns the canonical JSON bytes of this event.
    ///
    /// Field order is fixed by the struct definition, so the serialization
    /// is deterministic and suitable for hash chaining in the audit ledger.
    #[must_use]
    pub fn canonical_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }
}

/// Sink for outbound governance events.
///
/// Implementations must be cheap and non-blocking relative to the state
/// transitions that emit into them; durable fan-out belongs behind the sink,
/// not in front of it.
pub trait EventSink: Send + Sync {
    /// Emits one event.
    fn emit(&self, event: GovernanceEvent);
}

/// In-memory event sink for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Arc<RwLock<Vec<GovernanceEvent>>>,
}

impl MemoryEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all emitted events.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (indicates a thread panic).
    #[must_use]
    pub fn events(&self) -> Vec<GovernanceEvent> {
        self.events.read().expect("lock poisoned").clone()
    }

    /// Returns the number of emitted events.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (indicates a thread panic).
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().expect("lock poisoned").len()
    }

    /// Returns true if no events have been emitted.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (indicates a thread panic).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().expect("lock poisoned").is_empty()
    }

    /// Drops all buffered events.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (indicates a thread panic).
    pub fn clear(&self) {
        self.events.write().expect("lock poisoned").clear();
    }
}

impl Clone for MemoryEventSink {
    fn clone(&self) -> Self {
        Self {
            events: Arc::clone(&self.events),
        }
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&self, event: GovernanceEvent) {
        self.events.write().expect("lock poisoned").push(event);
    }
}
