//! SLA policy, severity derivation, and the escalation clock.
//!
//! The clock is a periodic evaluator: each tick recomputes the severity of
//! every open work item from elapsed time against the tenant's policy and
//! emits an event for each observed transition.
//!
//! # Severity Ladder
//!
//! ```text
//! hours_overdue <= grace   -> OK
//! hours_overdue <= escal1  -> DUE_SOON
//! hours_overdue <= escal2  -> LATE
//! else                     -> ESCALATED
//! ```
//!
//! # Key Properties
//!
//! - **Idempotent ticking**: re-running the clock with no elapsed time
//!   emits zero events (transitions fire only on change)
//! - **Monotonic escalation**: the clock alone never downgrades severity;
//!   only a state-changing action (submission) resets it
//! - **Safety net**: an item stuck at `LATE` beyond a fixed window is
//!   promoted to `ESCALATED` even under misconfigured policy thresholds
//! - **Tenant isolation**: ticks for different tenants run in parallel;
//!   the same tenant is serialized by a per-tenant lock, and one tenant's
//!   failure never aborts another's tick

mod clock;
mod driver;
mod error;
mod policy;


pub use clock::{LATE_ESCALATION_SAFETY_HOURS, SlaClock, TickSummary};
pub use driver::ClockDriver;
pub use error::SlaError;
pub use policy::{
    DEFAULT_ESCAL1_HOURS, DEFAULT_ESCAL2_HOURS, DEFAULT_GRACE_HOURS, SlaPolicy, SlaSeverity,
};
