//! Crate-level error taxonomy.
//!
//! Every module defines its own `thiserror` enum with structured variants;
//! this module defines the cross-cutting [`ErrorKind`] taxonomy that each of
//! those enums maps into via a `kind()` accessor, plus the aggregated
//! [`GovernanceError`] returned by the service facade.
//!
//! The taxonomy is the contract with transport layers: an HTTP adapter maps
//! `Validation` to 400, `Forbidden` to 403, `NotFound` to 404, `Conflict`
//! and `Locked` to 409/423, `Integrity` to 422, and `Io` to 502 without ever
//! matching on error strings.

use thiserror::Error;

use crate::config::ConfigError;
use crate::evidence::EvidenceError;
use crate::ledger::LedgerError;
use crate::manifest::ManifestError;
use crate::run::RunError;
use crate::sla::SlaError;
use crate::work::WorkError;

/// Cross-cutting classification of governance errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Bad input: malformed ids, wrong lifecycle state, missing required
    /// evidence, malformed filters.
    Validation,

    /// The actor is not permitted to perform the transition.
    Forbidden,

    /// A uniqueness rule was violated (duplicate run for a period).
    Conflict,

    /// The target period is administratively locked.
    Locked,

    /// A referenced entity does not exist.
    NotFound,

    /// A hash or checksum did not match its expected value.
    Integrity,

    /// The storage or persistence layer failed.
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::Forbidden => "forbidden",
            Self::Conflict => "conflict",
            Self::Locked => "locked",
            Self::NotFound => "not_found",
            Self::Integrity => "integrity",
            Self::Io => "io",
        };
        write!(f, "{s}")
    }
}

/// Aggregated error type returned by the service facade.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GovernanceError {
    /// Evidence store or registry operation failed.
    #[error(transparent)]
    Evidence(#[from] EvidenceError),

    /// Work-item lifecycle operation failed.
    #[error(transparent)]
    Work(#[from] WorkError),

    /// SLA clock operation failed.
    #[error(transparent)]
    Sla(#[from] SlaError),

    /// Run orchestration operation failed.
    #[error(transparent)]
    Run(#[from] RunError),

    /// Manifest, binder, or attestation operation failed.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Audit ledger operation failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Configuration loading or validation failed.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl GovernanceError {
    /// Returns the cross-cutting classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Evidence(e) => e.kind(),
            Self::Work(e) => e.kind(),
            Self::Sla(e) => e.kind(),
            Self::Run(e) => e.kind(),
            Self::Manifest(e) => e.kind(),
            Self::Ledger(e) => e.kind(),
            Self::Config(e) => e.kind(),
        }
    }
}
