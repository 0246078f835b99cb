//! Run state, templates, and the orchestrator.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::error::RunError;
use crate::events::{EVENT_RUN_CLOSED, EVENT_RUN_STARTED, EventSink, GovernanceEvent};
use crate::work::{AuthorityRole, NewWorkItem, WorkItem, WorkItemKind, WorkItemStore};

/// A compliance period: a calendar month or a named cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    /// Calendar month within a fiscal year.
    Month {
        /// Four-digit year.
        year: i32,
        /// Month 1..=12.
        month: u32,
    },

    /// Named cycle (e.g. `Q1-interim`, `year-end`).
    Cycle(String),
}

impl Period {
    /// Validates the period descriptor.
    ///
    /// # Errors
    ///
    /// Returns `RunError::InvalidPeriod` for out-of-range months or empty
    /// cycle names.
    pub fn validate(&self) -> Result<(), RunError> {
        match self {
            Self::Month { year, month } => {
                if !(1..=12).contains(month) {
                    return Err(RunError::InvalidPeriod {
                        reason: format!("month {month} out of range 1..=12"),
                    });
                }
                if !(2000..=2100).contains(year) {
                    return Err(RunError::InvalidPeriod {
                        reason: format!("year {year} out of range 2000..=2100"),
                    });
                }
                Ok(())
            }
            Self::Cycle(name) => {
                if name.is_empty() {
                    return Err(RunError::InvalidPeriod {
                        reason: "cycle name must not be empty".to_string(),
                    });
                }
                Ok(())
            }
        }
    }

    /// Returns the canonical key used for uniqueness and lock checks.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::Month { year, month } => format!("{year:04}-{month:02}"),
            Self::Cycle(name) => format!("cycle:{name}"),
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    /// Created, items not yet materialized.
    Draft,

    /// Started; items materialized and in flight.
    InProgress,

    /// Results published to reviewers.
    Published,

    /// Period closed; absorbing.
    Closed,
}

impl RunState {
    /// Returns the canonical `SCREAMING_SNAKE_CASE` form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::InProgress => "IN_PROGRESS",
            Self::Published => "PUBLISHED",
            Self::Closed => "CLOSED",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A period-scoped batch of work items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    /// Run id.
    pub run_id: String,

    /// Owning tenant.
    pub tenant_id: String,

    /// The compliance period this run covers.
    pub period: Period,

    /// Current state.
    pub state: RunState,

    /// Actor responsible for the run.
    pub owner_id: String,

    /// When the run was started.
    pub started_at: Option<DateTime<Utc>>,

    /// When the run was closed.
    pub closed_at: Option<DateTime<Utc>>,

    /// When the run was created.
    pub created_at: DateTime<Utc>,
}

/// Blueprint for one default work item in a run template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateItem {
    /// What kind of work to materialize.
    pub kind: WorkItemKind,

    /// Short code.
    pub code: String,

    /// Human-readable title.
    pub title: String,

    /// Owner of the materialized item.
    pub owner_id: String,

    /// Approver of the materialized item.
    pub approver_id: String,

    /// Minimum authority required to approve.
    pub required_role: AuthorityRole,

    /// Hours after run start when the item falls due; None for no deadline.
    pub due_offset_hours: Option<i64>,

    /// Whether submission requires linked evidence.
    pub evidence_required: bool,
}

/// A named set of default work items materialized when a run starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTemplate {
    /// Template name.
    pub name: String,

    /// Item blueprints.
    pub items: Vec<TemplateItem>,
}

#[derive(Debug, Default)]
struct OrchestratorInner {
    /// Runs keyed by `(tenant, run_id)`.
    runs: HashMap<(String, String), Run>,
    /// Period uniqueness index: `(tenant, period key) -> run_id`.
    by_period: HashMap<(String, String), String>,
    /// Administratively locked `(tenant, period key)` pairs.
    locked: HashSet<(String, String)>,
}

/// Creates runs, enforces period uniqueness and locks, and materializes
/// template work items on start.
pub struct RunOrchestrator {
    inner: Arc<RwLock<OrchestratorInner>>,
    items: Arc<dyn WorkItemStore>,
    sink: Arc<dyn EventSink>,
}

impl RunOrchestrator {
    /// Creates an orchestrator over a work-item store and event sink.
    pub fn new(items: Arc<dyn WorkItemStore>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(OrchestratorInner::default())),
            items,
            sink,
        }
    }

    /// Creates a draft run for a period.
    ///
    /// The lock check precedes the duplicate check: a locked period reports
    /// `Locked` even when a run already exists for it.
    ///
    /// # Errors
    ///
    /// `InvalidPeriod`, `PeriodLocked`, or `DuplicateRun` per the guards.
    pub fn create_run(
        &self,
        tenant_id: &str,
        period: Period,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Run, RunError> {
        period.validate()?;
        let period_key = period.key();

        let mut inner = self.inner.write().expect("lock poisoned");
        let lock_key = (tenant_id.to_string(), period_key.clone());
        if inner.locked.contains(&lock_key) {
            return Err(RunError::PeriodLocked {
                tenant_id: tenant_id.to_string(),
                period: period_key,
            });
        }
        if inner.by_period.contains_key(&lock_key) {
            return Err(RunError::DuplicateRun {
                tenant_id: tenant_id.to_string(),
                period: period_key,
            });
        }

        let run = Run {
            run_id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            period,
            state: RunState::Draft,
            owner_id: owner_id.to_string(),
            started_at: None,
            closed_at: None,
            created_at: now,
        };
        inner
            .by_period
            .insert(lock_key, run.run_id.clone());
        inner
            .runs
            .insert((tenant_id.to_string(), run.run_id.clone()), run.clone());
        debug!(tenant_id, run_id = %run.run_id, period = %run.period, "run created");
        Ok(run)
    }

    /// Starts a draft run, materializing the template's default work items.
    ///
    /// Starting an already-started run is a no-op that returns the run as
    /// it stands; items are not materialized twice.
    ///
    /// # Errors
    ///
    /// `RunNotFound` when absent; work store errors from materialization.
    pub fn start_run(
        &self,
        tenant_id: &str,
        run_id: &str,
        template: &RunTemplate,
        now: DateTime<Utc>,
    ) -> Result<Run, RunError> {
        let mut inner = self.inner.write().expect("lock poisoned");
        let key = (tenant_id.to_string(), run_id.to_string());
        let run = inner.runs.get_mut(&key).ok_or_else(|| RunError::RunNotFound {
            run_id: run_id.to_string(),
        })?;

        if run.state != RunState::Draft {
            return Ok(run.clone());
        }

        for blueprint in &template.items {
            let item = NewWorkItem {
                run_id: Some(run_id.to_string()),
                kind: blueprint.kind,
                code: blueprint.code.clone(),
                title: blueprint.title.clone(),
                owner_id: blueprint.owner_id.clone(),
                approver_id: blueprint.approver_id.clone(),
                required_role: blueprint.required_role,
                due_at: blueprint
                    .due_offset_hours
                    .map(|hours| now + Duration::hours(hours)),
                evidence_required: blueprint.evidence_required,
            }
            .into_item(tenant_id, now);
            self.items.insert(item)?;
        }

        run.state = RunState::InProgress;
        run.started_at = Some(now);
        let started = run.clone();

        self.sink.emit(GovernanceEvent::new(
            EVENT_RUN_STARTED,
            tenant_id,
            run_id,
            started.state.as_str(),
            now,
        ));
        info!(
            tenant_id,
            run_id,
            template = %template.name,
            items = template.items.len(),
            "run started"
        );
        Ok(started)
    }

    /// Publishes an in-progress run.
    ///
    /// # Errors
    ///
    /// `RunNotFound` or `TransitionNotAllowed`.
    pub fn publish_run(&self, tenant_id: &str, run_id: &str) -> Result<Run, RunError> {
        self.transition(tenant_id, run_id, RunState::InProgress, RunState::Published, "publish", None)
    }

    /// Closes a published run, stamping `closed_at`.
    ///
    /// # Errors
    ///
    /// `RunNotFound` or `TransitionNotAllowed`.
    pub fn close_run(
        &self,
        tenant_id: &str,
        run_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Run, RunError> {
        self.transition(tenant_id, run_id, RunState::Published, RunState::Closed, "close", Some(now))
    }

    fn transition(
        &self,
        tenant_id: &str,
        run_id: &str,
        expected: RunState,
        target: RunState,
        action: &'static str,
        closed_at: Option<DateTime<Utc>>,
    ) -> Result<Run, RunError> {
        let mut inner = self.inner.write().expect("lock poisoned");
        let key = (tenant_id.to_string(), run_id.to_string());
        let run = inner.runs.get_mut(&key).ok_or_else(|| RunError::RunNotFound {
            run_id: run_id.to_string(),
        })?;

        if run.state != expected {
            return Err(RunError::TransitionNotAllowed {
                run_id: run_id.to_string(),
                from_state: run.state.as_str(),
                action,
            });
        }

        run.state = target;
        if let Some(at) = closed_at {
            run.closed_at = Some(at);
        }
        let updated = run.clone();

        if target == RunState::Closed {
            self.sink.emit(GovernanceEvent::new(
                EVENT_RUN_CLOSED,
                tenant_id,
                run_id,
                updated.state.as_str(),
                closed_at.unwrap_or(updated.created_at),
            ));
        }
        Ok(updated)
    }

    /// Administratively locks a period, rejecting future run creation.
    pub fn lock_period(&self, tenant_id: &str, period: &Period) {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.locked.insert((tenant_id.to_string(), period.key()));
    }

    /// Removes a period lock.
    pub fn unlock_period(&self, tenant_id: &str, period: &Period) {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.locked.remove(&(tenant_id.to_string(), period.key()));
    }

    /// Returns whether a period is locked.
    #[must_use]
    pub fn is_locked(&self, tenant_id: &str, period: &Period) -> bool {
        let inner = self.inner.read().expect("lock poisoned");
        inner.locked.contains(&(tenant_id.to_string(), period.key()))
    }

    /// Returns one run.
    ///
    /// # Errors
    ///
    /// `RunNotFound` when absent.
    pub fn get_run(&self, tenant_id: &str, run_id: &str) -> Result<Run, RunError> {
        let inner = self.inner.read().expect("lock poisoned");
        inner
            .runs
            .get(&(tenant_id.to_string(), run_id.to_string()))
            .cloned()
            .ok_or_else(|| RunError::RunNotFound {
                run_id: run_id.to_string(),
            })
    }

    /// Returns the run covering a period, if any.
    #[must_use]
    pub fn find_by_period(&self, tenant_id: &str, period: &Period) -> Option<Run> {
        let inner = self.inner.read().expect("lock poisoned");
        let run_id = inner
            .by_period
            .get(&(tenant_id.to_string(), period.key()))?
            .clone();
        inner.runs.get(&(tenant_id.to_string(), run_id)).cloned()
    }

    /// Returns the work items materialized for a run, ordered by item id.
    #[must_use]
    pub fn run_items(&self, tenant_id: &str, run_id: &str) -> Vec<WorkItem> {
        self.items.list_by_run(tenant_id, run_id)
    }
}
