//! The SLA escalation clock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::debug;

use super::error::SlaError;
use super::policy::{SlaPolicy, SlaSeverity};
use crate::events::{EVENT_SLA_SEVERITY_CHANGED, EventSink, GovernanceEvent};
use crate::work::{WorkItem, WorkItemStore};

/// Hours an item may sit at `Late` before the safety net promotes it to
/// `Escalated`, independent of policy thresholds.
///
/// Keeps escalation monotonic even when a tenant's `escal2` threshold is
/// misconfigured to something unreachable.
pub const LATE_ESCALATION_SAFETY_HOURS: i64 = 72;

/// Outcome of one clock tick for one tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickSummary {
    /// Tenant that was ticked.
    pub tenant_id: String,

    /// Number of items evaluated (open items with a due date).
    pub evaluated: usize,

    /// Number of severity transitions recorded (== events emitted).
    pub transitions: usize,
}

/// Periodic severity evaluator over open work items.
///
/// One instance serves all tenants; a per-tenant lock serializes concurrent
/// ticks for the same tenant while different tenants proceed in parallel.
pub struct SlaClock {
    store: Arc<dyn WorkItemStore>,
    sink: Arc<dyn EventSink>,
    tick_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SlaClock {
    /// Creates a clock over a work-item store and event sink.
    pub fn new(store: Arc<dyn WorkItemStore>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            store,
            sink,
            tick_locks: Mutex::new(HashMap::new()),
        }
    }

    fn tenant_lock(&self, tenant_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.tick_locks.lock().expect("lock poisoned");
        Arc::clone(
            locks
                .entry(tenant_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Computes the severity a single item lands on at `now`.
    ///
    /// Applies the policy ladder, the `Late` safety net, and the monotonic
    /// clamp against the stored severity. Items without a due date never
    /// leave `Ok`.
    #[must_use]
    pub fn evaluate_item(item: &WorkItem, policy: &SlaPolicy, now: DateTime<Utc>) -> SlaSeverity {
        let Some(due_at) = item.due_at else {
            return item.severity;
        };

        let hours_overdue = (now - due_at).num_hours().max(0);
        let mut resolved = policy.resolve_severity(hours_overdue);

        // Safety net: Late beyond the fixed window is promoted even if the
        // policy's escal2 threshold never triggers.
        if item.severity == SlaSeverity::Late {
            if let Some(changed_at) = item.severity_changed_at {
                if (now - changed_at).num_hours() > LATE_ESCALATION_SAFETY_HOURS {
                    resolved = SlaSeverity::Escalated;
                }
            }
        }

        // The clock never downgrades; only a state-changing action resets.
        resolved.max(item.severity)
    }

    /// Ticks one tenant: recomputes severity for every open item and emits
    /// an event per observed transition.
    ///
    /// Serialized per tenant; safe to invoke concurrently across tenants.
    /// Re-invoking with no elapsed time emits nothing.
    ///
    /// # Errors
    ///
    /// Propagates store failures; per-item evaluation itself is total.
    pub fn tick(
        &self,
        tenant_id: &str,
        policy: &SlaPolicy,
        now: DateTime<Utc>,
    ) -> Result<TickSummary, SlaError> {
        policy.validate()?;

        let guard = self.tenant_lock(tenant_id);
        let _serialized = guard.lock().expect("lock poisoned");

        let mut evaluated = 0usize;
        let mut transitions = 0usize;

        for item in self.store.list_clock_evaluated(tenant_id) {
            if item.due_at.is_none() {
                continue;
            }
            evaluated += 1;

            let next = Self::evaluate_item(&item, policy, now);
            if next == item.severity {
                continue;
            }

            let mut changed = false;
            self.store.with_item_mut(
                tenant_id,
                &item.item_id,
                self.sink.as_ref(),
                &mut |stored| {
                    // Re-derive under the store lock: the item may have been
                    // submitted or re-dated between the list and this write.
                    let next = Self::evaluate_item(stored, policy, now);
                    if next == stored.severity || !stored.state.is_clock_evaluated() {
                        return Ok(Vec::new());
                    }
                    stored.severity = next;
                    stored.severity_changed_at = Some(now);
                    changed = true;
                    Ok(vec![GovernanceEvent::new(
                        EVENT_SLA_SEVERITY_CHANGED,
                        tenant_id,
                        &stored.item_id,
                        next.as_str(),
                        now,
                    )])
                },
            )?;
            if changed {
                transitions += 1;
            }
        }

        debug!(tenant_id, evaluated, transitions, "sla tick complete");
        Ok(TickSummary {
            tenant_id: tenant_id.to_string(),
            evaluated,
            transitions,
        })
    }
}
