//! SLA severity and per-tenant escalation policy.

use serde::{Deserialize, Serialize};

use super::error::SlaError;

/// Default grace window in hours.
pub const DEFAULT_GRACE_HOURS: i64 = 0;

/// Default first escalation threshold in hours.
pub const DEFAULT_ESCAL1_HOURS: i64 = 24;

/// Default second escalation threshold in hours.
pub const DEFAULT_ESCAL2_HOURS: i64 = 72;

/// SLA escalation tier of a work item.
///
/// Ordered worse-ward: `Ok < DueSoon < Late < Escalated`. The clock clamps
/// recomputed severities against this order so evaluation alone never
/// downgrades an item.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlaSeverity {
    /// Within the grace window (or no due date).
    #[default]
    Ok,

    /// Past grace, within the first escalation threshold.
    DueSoon,

    /// Past the first escalation threshold.
    Late,

    /// Past the second escalation threshold (or safety-net promoted).
    Escalated,
}

impl SlaSeverity {
    /// Returns the canonical `SCREAMING_SNAKE_CASE` form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::DueSoon => "DUE_SOON",
            Self::Late => "LATE",
            Self::Escalated => "ESCALATED",
        }
    }

    /// Parses a severity from a string.
    ///
    /// # Errors
    ///
    /// Returns `SlaError::InvalidSeverity` if the string is not recognized.
    pub fn parse(s: &str) -> Result<Self, SlaError> {
        match s.to_uppercase().as_str() {
            "OK" => Ok(Self::Ok),
            "DUE_SOON" => Ok(Self::DueSoon),
            "LATE" => Ok(Self::Late),
            "ESCALATED" => Ok(Self::Escalated),
            _ => Err(SlaError::InvalidSeverity {
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for SlaSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-tenant SLA escalation policy.
///
/// Fetched once at the start of each tick and passed immutably through the
/// evaluation; the clock holds no policy state of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaPolicy {
    /// Policy code; one active policy per tenant per code.
    pub policy_code: String,

    /// IANA timezone name used when rendering deadlines to humans.
    /// Severity math itself is entirely UTC-elapsed-time based.
    pub timezone: String,

    /// Hours past the due date during which severity stays `Ok`.
    pub grace_hours: i64,

    /// Hours past the due date up to which severity is `DueSoon`.
    pub escal1_hours: i64,

    /// Hours past the due date up to which severity is `Late`; beyond this
    /// the item is `Escalated`.
    pub escal2_hours: i64,

    /// Identities notified on escalation (delivery is out of scope).
    pub escalation_targets: Vec<String>,
}

impl Default for SlaPolicy {
    fn default() -> Self {
        Self {
            policy_code: "DEFAULT".to_string(),
            timezone: "UTC".to_string(),
            grace_hours: DEFAULT_GRACE_HOURS,
            escal1_hours: DEFAULT_ESCAL1_HOURS,
            escal2_hours: DEFAULT_ESCAL2_HOURS,
            escalation_targets: Vec::new(),
        }
    }
}

impl SlaPolicy {
    /// Validates threshold ordering.
    ///
    /// Requires `0 <= grace <= escal1 < escal2`.
    ///
    /// # Errors
    ///
    /// Returns `NegativeThreshold` or `InvalidThresholds` accordingly.
    pub fn validate(&self) -> Result<(), SlaError> {
        for (field, value) in [
            ("grace_hours", self.grace_hours),
            ("escal1_hours", self.escal1_hours),
            ("escal2_hours", self.escal2_hours),
        ] {
            if value < 0 {
                return Err(SlaError::NegativeThreshold { field, value });
            }
        }
        if self.grace_hours > self.escal1_hours || self.escal1_hours >= self.escal2_hours {
            return Err(SlaError::InvalidThresholds {
                grace_hours: self.grace_hours,
                escal1_hours: self.escal1_hours,
                escal2_hours: self.escal2_hours,
            });
        }
        Ok(())
    }

    /// Resolves severity from hours overdue, first match wins.
    #[must_use]
    pub const fn resolve_severity(&self, hours_overdue: i64) -> SlaSeverity {
        if hours_overdue <= self.grace_hours {
            SlaSeverity::Ok
        } else if hours_overdue <= self.escal1_hours {
            SlaSeverity::DueSoon
        } else if hours_overdue <= self.escal2_hours {
            SlaSeverity::Late
        } else {
            SlaSeverity::Escalated
        }
    }
}
