//! Manifest building: frozen, checksummed selections of evidence records.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::error::ManifestError;
use crate::crypto::{ContentHasher, hex_encode};
use crate::evidence::{EvidenceRecord, PiiLevel, RecordRegistry};

/// Domain separator for manifest checksums.
pub const MANIFEST_CHECKSUM_DOMAIN: &[u8] = b"govflow:manifest:v1\0";

/// Maximum number of tags in a filter's exclusion list.
const MAX_EXCLUDE_TAGS: usize = 64;

/// Redaction filter applied while selecting records into a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestFilter {
    /// Records above this PII level are excluded.
    pub max_pii_level: PiiLevel,

    /// Records carrying any of these tags are excluded.
    pub exclude_tags: BTreeSet<String>,
}

impl Default for ManifestFilter {
    fn default() -> Self {
        Self {
            max_pii_level: PiiLevel::High,
            exclude_tags: BTreeSet::new(),
        }
    }
}

impl ManifestFilter {
    /// Validates the filter.
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::InvalidFilter` when the exclusion list is
    /// oversized or contains empty tags.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.exclude_tags.len() > MAX_EXCLUDE_TAGS {
            return Err(ManifestError::InvalidFilter {
                reason: format!("more than {MAX_EXCLUDE_TAGS} excluded tags"),
            });
        }
        if self.exclude_tags.iter().any(String::is_empty) {
            return Err(ManifestError::InvalidFilter {
                reason: "excluded tags must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Returns whether a record passes the filter.
    #[must_use]
    pub fn admits(&self, record: &EvidenceRecord) -> bool {
        record.pii_level <= self.max_pii_level
            && record.tags.is_disjoint(&self.exclude_tags)
    }
}

/// One frozen line of a manifest: the record snapshot at build time.
///
/// Lines are copies, not joins; mutating the source record later never
/// changes a sealed manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestLine {
    /// Snapshot of the record id.
    pub record_id: String,

    /// Snapshot of the object hash, hex-encoded.
    pub object_hash: String,

    /// Snapshot of the object byte size.
    pub byte_size: u64,

    /// Snapshot of the record title.
    pub title: String,

    /// Snapshot of the record tags, sorted.
    pub tags: Vec<String>,
}

impl ManifestLine {
    fn from_record(record: &EvidenceRecord) -> Self {
        Self {
            record_id: record.record_id.clone(),
            object_hash: record.object_hash.clone(),
            byte_size: record.object_size,
            title: record.title.clone(),
            tags: record.tags.iter().cloned().collect(),
        }
    }
}

/// An immutable, point-in-time selection of evidence records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Manifest id.
    pub manifest_id: String,

    /// Owning tenant.
    pub tenant_id: String,

    /// Scope reference kind (e.g. `CLOSE_TASK`, `CTRL_RUN`).
    pub scope_kind: String,

    /// Scope reference id.
    pub scope_id: String,

    /// The filter that was applied, resolved at build time.
    pub filter: ManifestFilter,

    /// Ordered line snapshot.
    pub lines: Vec<ManifestLine>,

    /// Number of distinct objects referenced by the lines.
    pub object_count: u64,

    /// Sum of line byte sizes.
    pub total_bytes: u64,

    /// Blake3 checksum over the canonical line serialization, hex-encoded.
    pub checksum_hex: String,

    /// Actor that requested the build.
    pub built_by: String,

    /// When the manifest was built.
    pub built_at: DateTime<Utc>,
}

impl Manifest {
    /// Recomputes the checksum from the stored lines.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the lines cannot be canonicalized.
    pub fn compute_checksum(lines: &[ManifestLine]) -> Result<String, ManifestError> {
        let canonical = serde_json::to_vec(lines).map_err(|e| ManifestError::Serialization {
            message: e.to_string(),
        })?;
        Ok(hex_encode(&ContentHasher::hash_domain_separated(
            MANIFEST_CHECKSUM_DOMAIN,
            &canonical,
        )))
    }

    /// Verifies the stored checksum against the stored lines.
    ///
    /// # Errors
    ///
    /// Returns `ChecksumMismatch` when re-computation disagrees.
    pub fn verify(&self) -> Result<(), ManifestError> {
        let actual = Self::compute_checksum(&self.lines)?;
        if actual != self.checksum_hex {
            return Err(ManifestError::ChecksumMismatch {
                expected: self.checksum_hex.clone(),
                actual,
            });
        }
        Ok(())
    }
}

/// In-memory manifest store shared by the builder and the binder packager.
#[derive(Debug, Default)]
pub struct ManifestStore {
    manifests: Arc<RwLock<HashMap<(String, String), Manifest>>>,
}

impl ManifestStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a manifest (insert-once; manifests are never updated).
    pub fn insert(&self, manifest: Manifest) {
        let mut manifests = self.manifests.write().expect("lock poisoned");
        manifests.insert(
            (manifest.tenant_id.clone(), manifest.manifest_id.clone()),
            manifest,
        );
    }

    /// Returns one manifest.
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::ManifestNotFound` when absent.
    pub fn get(&self, tenant_id: &str, manifest_id: &str) -> Result<Manifest, ManifestError> {
        let manifests = self.manifests.read().expect("lock poisoned");
        manifests
            .get(&(tenant_id.to_string(), manifest_id.to_string()))
            .cloned()
            .ok_or_else(|| ManifestError::ManifestNotFound {
                manifest_id: manifest_id.to_string(),
            })
    }
}

impl Clone for ManifestStore {
    fn clone(&self) -> Self {
        Self {
            manifests: Arc::clone(&self.manifests),
        }
    }
}

/// Builds manifests by freezing filtered record selections.
pub struct ManifestBuilder {
    registry: RecordRegistry,
    store: ManifestStore,
}

impl ManifestBuilder {
    /// Creates a builder over a record registry and manifest store.
    pub fn new(registry: RecordRegistry, store: ManifestStore) -> Self {
        Self { registry, store }
    }

    /// Builds and persists a manifest for a scope.
    ///
    /// Records linked to the scope are resolved, filtered, and snapshotted
    /// into lines ordered by record id. An empty selection is legal and
    /// still produces the deterministic empty-list checksum.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed filter, or a
    /// serialization error if canonicalization fails.
    pub fn build(
        &self,
        tenant_id: &str,
        scope_kind: &str,
        scope_id: &str,
        filter: ManifestFilter,
        built_by: &str,
        now: DateTime<Utc>,
    ) -> Result<Manifest, ManifestError> {
        filter.validate()?;

        // query_by_ref returns records ordered by record id; the line order
        // inherits that and the checksum depends on it.
        let lines: Vec<ManifestLine> = self
            .registry
            .query_by_ref(tenant_id, scope_kind, scope_id)
            .iter()
            .filter(|record| filter.admits(record))
            .map(ManifestLine::from_record)
            .collect();

        let distinct_objects: HashSet<&str> =
            lines.iter().map(|line| line.object_hash.as_str()).collect();
        let total_bytes = lines.iter().map(|line| line.byte_size).sum();
        let checksum_hex = Manifest::compute_checksum(&lines)?;

        let manifest = Manifest {
            manifest_id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            scope_kind: scope_kind.to_string(),
            scope_id: scope_id.to_string(),
            filter,
            object_count: distinct_objects.len() as u64,
            total_bytes,
            checksum_hex,
            built_by: built_by.to_string(),
            built_at: now,
            lines,
        };

        self.store.insert(manifest.clone());
        debug!(
            tenant_id,
            manifest_id = %manifest.manifest_id,
            lines = manifest.lines.len(),
            checksum = %manifest.checksum_hex,
            "manifest built"
        );
        Ok(manifest)
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &ManifestStore {
        &self.store
    }
}
