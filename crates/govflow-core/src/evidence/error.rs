//! Error types for evidence operations.

use thiserror::Error;

use crate::error::ErrorKind;

/// Errors that can occur during evidence operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EvidenceError {
    /// Empty content is not allowed.
    #[error("empty content is not allowed")]
    EmptyContent,

    /// Content exceeds maximum allowed size.
    #[error("content too large: {size} bytes exceeds maximum of {max_size} bytes")]
    ContentTooLarge {
        /// The actual size.
        size: usize,
        /// The maximum allowed size.
        max_size: usize,
    },

    /// Caller-declared hash does not match the computed content hash.
    #[error("content hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        /// The declared (expected) hash, hex-encoded.
        expected: String,
        /// The computed hash, hex-encoded.
        actual: String,
    },

    /// Content already exists under this hash with different bytes.
    ///
    /// Cryptographically infeasible with Blake3; checked anyway so a
    /// corrupted backend surfaces as an integrity failure rather than
    /// silently serving wrong bytes.
    #[error("content collision: hash {hash} already exists with different content")]
    Collision {
        /// The colliding hash, hex-encoded.
        hash: String,
    },

    /// No object stored under the given hash for the tenant.
    #[error("evidence object not found: {hash}")]
    ObjectNotFound {
        /// The hash that was not found, hex-encoded.
        hash: String,
    },

    /// No record with the given id for the tenant.
    #[error("evidence record not found: {record_id}")]
    RecordNotFound {
        /// The record id that was not found.
        record_id: String,
    },

    /// A record field failed validation.
    #[error("invalid evidence field {field}: {reason}")]
    InvalidField {
        /// The field that failed.
        field: &'static str,
        /// Why it failed.
        reason: String,
    },

    /// Invalid PII sensitivity level string.
    #[error("invalid PII level: {value}")]
    InvalidPiiLevel {
        /// The invalid value.
        value: String,
    },

    /// Storage backend error.
    #[error("evidence storage error: {message}")]
    Storage {
        /// Description of the failure.
        message: String,
    },
}

impl EvidenceError {
    /// Returns the cross-cutting classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyContent
            | Self::ContentTooLarge { .. }
            | Self::InvalidField { .. }
            | Self::InvalidPiiLevel { .. } => ErrorKind::Validation,
            Self::HashMismatch { .. } | Self::Collision { .. } => ErrorKind::Integrity,
            Self::ObjectNotFound { .. } | Self::RecordNotFound { .. } => ErrorKind::NotFound,
            Self::Storage { .. } => ErrorKind::Io,
        }
    }
}
