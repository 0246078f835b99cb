//! Configuration parsing and management.
//!
//! This module handles parsing of governance configuration files (TOML)
//! that define the clock cadence, audit ledger location, default binder
//! format, and per-tenant SLA policies.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ErrorKind;
use crate::manifest::BinderFormat;
use crate::sla::{
    DEFAULT_ESCAL1_HOURS, DEFAULT_ESCAL2_HOURS, DEFAULT_GRACE_HOURS, SlaPolicy,
};

/// Errors that can occur during configuration handling.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Failed to serialize TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Semantic validation failed.
    #[error("invalid config: {0}")]
    Validation(String),
}

impl ConfigError {
    /// Returns the cross-cutting classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) | Self::Serialize(_) => ErrorKind::Io,
            Self::Parse(_) | Self::Validation(_) => ErrorKind::Validation,
        }
    }
}

/// Top-level governance configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GovernanceConfig {
    /// Clock driver configuration.
    #[serde(default)]
    pub clock: ClockConfig,

    /// Audit ledger configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Binder packaging configuration.
    #[serde(default)]
    pub binder: BinderConfig,

    /// Default SLA policy applied to tenants without an override.
    #[serde(default)]
    pub sla: SlaPolicyConfig,

    /// Per-tenant entries.
    #[serde(default)]
    pub tenants: Vec<TenantConfig>,
}

impl GovernanceConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails semantic
    /// validation (non-increasing SLA thresholds, zero tick interval,
    /// duplicate tenant entries).
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validates semantic constraints.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clock.tick_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "clock.tick_interval_secs must be nonzero".to_string(),
            ));
        }

        self.sla
            .to_policy()
            .validate()
            .map_err(|e| ConfigError::Validation(format!("sla: {e}")))?;

        let mut seen = std::collections::HashSet::new();
        for tenant in &self.tenants {
            if tenant.tenant_id.is_empty() {
                return Err(ConfigError::Validation(
                    "tenants entry with empty tenant_id".to_string(),
                ));
            }
            if !seen.insert(&tenant.tenant_id) {
                return Err(ConfigError::Validation(format!(
                    "duplicate tenants entry: {}",
                    tenant.tenant_id
                )));
            }
            if let Some(sla) = &tenant.sla {
                sla.to_policy()
                    .validate()
                    .map_err(|e| ConfigError::Validation(format!("tenant {}: {e}", tenant.tenant_id)))?;
            }
        }
        Ok(())
    }

    /// Resolves the effective policy table: one entry per configured
    /// tenant, falling back to the default policy.
    #[must_use]
    pub fn policies(&self) -> BTreeMap<String, SlaPolicy> {
        self.tenants
            .iter()
            .map(|tenant| {
                let policy = tenant
                    .sla
                    .as_ref()
                    .unwrap_or(&self.sla)
                    .to_policy();
                (tenant.tenant_id.clone(), policy)
            })
            .collect()
    }

    /// Resolves the effective policy for one tenant.
    #[must_use]
    pub fn policy_for(&self, tenant_id: &str) -> SlaPolicy {
        self.tenants
            .iter()
            .find(|tenant| tenant.tenant_id == tenant_id)
            .and_then(|tenant| tenant.sla.as_ref())
            .unwrap_or(&self.sla)
            .to_policy()
    }
}

/// Clock driver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Seconds between clock passes.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
        }
    }
}

const fn default_tick_interval() -> u64 {
    300
}

/// Audit ledger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Path to the ledger database.
    #[serde(default = "default_ledger_path")]
    pub path: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
        }
    }
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("govflow-audit.db")
}

/// Binder packaging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinderConfig {
    /// Default packaging format.
    #[serde(default = "default_binder_format")]
    pub format: BinderFormat,
}

impl Default for BinderConfig {
    fn default() -> Self {
        Self {
            format: default_binder_format(),
        }
    }
}

const fn default_binder_format() -> BinderFormat {
    BinderFormat::BundleGz
}

/// SLA policy fields as they appear in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaPolicyConfig {
    /// Policy code.
    #[serde(default = "default_policy_code")]
    pub policy_code: String,

    /// IANA timezone name.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Grace window in hours.
    #[serde(default = "default_grace")]
    pub grace_hours: i64,

    /// First escalation threshold in hours.
    #[serde(default = "default_escal1")]
    pub escal1_hours: i64,

    /// Second escalation threshold in hours.
    #[serde(default = "default_escal2")]
    pub escal2_hours: i64,

    /// Identities notified on escalation.
    #[serde(default)]
    pub escalation_targets: Vec<String>,
}

impl Default for SlaPolicyConfig {
    fn default() -> Self {
        Self {
            policy_code: default_policy_code(),
            timezone: default_timezone(),
            grace_hours: default_grace(),
            escal1_hours: default_escal1(),
            escal2_hours: default_escal2(),
            escalation_targets: Vec::new(),
        }
    }
}

impl SlaPolicyConfig {
    /// Materializes the runtime policy value.
    #[must_use]
    pub fn to_policy(&self) -> SlaPolicy {
        SlaPolicy {
            policy_code: self.policy_code.clone(),
            timezone: self.timezone.clone(),
            grace_hours: self.grace_hours,
            escal1_hours: self.escal1_hours,
            escal2_hours: self.escal2_hours,
            escalation_targets: self.escalation_targets.clone(),
        }
    }
}

fn default_policy_code() -> String {
    "DEFAULT".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

const fn default_grace() -> i64 {
    DEFAULT_GRACE_HOURS
}

const fn default_escal1() -> i64 {
    DEFAULT_ESCAL1_HOURS
}

const fn default_escal2() -> i64 {
    DEFAULT_ESCAL2_HOURS
}

/// Per-tenant configuration entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    /// The tenant id.
    pub tenant_id: String,

    /// SLA policy override; None falls back to the default policy.
    #[serde(default)]
    pub sla: Option<SlaPolicyConfig>,
}
