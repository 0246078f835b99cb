//! Error types for manifest, binder, and attestation operations.

use thiserror::Error;

use crate::crypto::SignerError;
use crate::error::ErrorKind;
use crate::evidence::EvidenceError;

/// Errors that can occur while building manifests, packaging binders, or
/// signing attestations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ManifestError {
    /// Manifest not found.
    #[error("manifest not found: {manifest_id}")]
    ManifestNotFound {
        /// The manifest id that was not found.
        manifest_id: String,
    },

    /// Binder not found.
    #[error("binder not found: {binder_id}")]
    BinderNotFound {
        /// The binder id that was not found.
        binder_id: String,
    },

    /// The filter specification is malformed.
    #[error("invalid manifest filter: {reason}")]
    InvalidFilter {
        /// Why the filter was rejected.
        reason: String,
    },

    /// Invalid binder format string.
    #[error("invalid binder format: {value}")]
    InvalidFormat {
        /// The invalid value.
        value: String,
    },

    /// The attestation statement is out of bounds.
    #[error("invalid attestation statement: {reason}")]
    InvalidStatement {
        /// Why the statement was rejected.
        reason: String,
    },

    /// A checksum failed re-verification.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// The stored checksum, hex-encoded.
        expected: String,
        /// The recomputed checksum, hex-encoded.
        actual: String,
    },

    /// Canonical serialization failed.
    #[error("canonical serialization failed: {message}")]
    Serialization {
        /// Description of the failure.
        message: String,
    },

    /// Writing the packaged artifact failed.
    #[error("binder packaging failed: {message}")]
    Package {
        /// Description of the failure.
        message: String,
    },

    /// Evidence store operation failed while resolving objects.
    #[error(transparent)]
    Evidence(#[from] EvidenceError),

    /// Signature creation or verification failed.
    #[error(transparent)]
    Signer(#[from] SignerError),
}

impl ManifestError {
    /// Returns the cross-cutting classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ManifestNotFound { .. } | Self::BinderNotFound { .. } => ErrorKind::NotFound,
            Self::InvalidFilter { .. }
            | Self::InvalidFormat { .. }
            | Self::InvalidStatement { .. } => ErrorKind::Validation,
            Self::ChecksumMismatch { .. } | Self::Signer(_) => ErrorKind::Integrity,
            Self::Serialization { .. } | Self::Package { .. } => ErrorKind::Io,
            Self::Evidence(e) => e.kind(),
        }
    }
}
