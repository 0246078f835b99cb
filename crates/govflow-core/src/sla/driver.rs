//! Periodic driver for the SLA clock.
//!
//! The driver owns the timer loop; the clock itself is synchronous. Each
//! firing ticks every configured tenant with its resolved policy. A failing
//! tenant is logged and skipped so its neighbors still tick.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use super::clock::{SlaClock, TickSummary};
use super::policy::SlaPolicy;

/// Timer-driven clock loop over a fixed tenant/policy table.
pub struct ClockDriver {
    clock: Arc<SlaClock>,
    /// Tenant policies, iterated in deterministic order.
    policies: BTreeMap<String, SlaPolicy>,
    interval: Duration,
}

impl ClockDriver {
    /// Creates a driver ticking `policies` every `interval`.
    pub fn new(
        clock: Arc<SlaClock>,
        policies: BTreeMap<String, SlaPolicy>,
        interval: Duration,
    ) -> Self {
        Self {
            clock,
            policies,
            interval,
        }
    }

    /// Ticks every configured tenant once, isolating per-tenant failures.
    ///
    /// Returns the summaries of the tenants that ticked successfully.
    /// Failures are logged as operational alerts, never surfaced to the
    /// other tenants' ticks.
    pub fn tick_all(&self) -> Vec<TickSummary> {
        let now = Utc::now();
        let mut summaries = Vec::with_capacity(self.policies.len());

        for (tenant_id, policy) in &self.policies {
            match self.clock.tick(tenant_id, policy, now) {
                Ok(summary) => summaries.push(summary),
                Err(error) => {
                    warn!(%tenant_id, %error, "sla tick failed; continuing with remaining tenants");
                }
            }
        }
        summaries
    }

    /// Runs the timer loop until the task is dropped.
    ///
    /// The first firing happens after one full interval, not immediately,
    /// so a freshly started service doesn't re-escalate before operators
    /// can see it come up.
    pub async fn run(self) {
        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        timer.tick().await; // consume the immediate first firing

        loop {
            timer.tick().await;
            let summaries = self.tick_all();
            let transitions: usize = summaries.iter().map(|s| s.transitions).sum();
            info!(
                tenants = summaries.len(),
                transitions, "sla clock pass complete"
            );
        }
    }
}
