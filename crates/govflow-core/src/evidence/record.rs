//! Evidence records and the record/link registry.
//!
//! Records are the logical layer over content-addressed objects: one object,
//! many records, each carrying the business context (source reference,
//! title, tags, PII sensitivity) for a different use of the same bytes.
//! Links associate records with work-item-shaped references.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::EvidenceError;

/// Maximum length for tenant, record, link, and reference ids.
pub const MAX_ID_LEN: usize = 256;

/// Maximum length for record titles.
pub const MAX_TITLE_LEN: usize = 512;

/// Maximum length for record notes.
pub const MAX_NOTE_LEN: usize = 4096;

/// Maximum number of tags per record.
pub const MAX_TAGS: usize = 32;

/// Maximum length of a single tag.
pub const MAX_TAG_LEN: usize = 64;

/// PII sensitivity level of an evidence record.
///
/// Ordered: `None < Low < Medium < High`. Manifest filters admit records
/// whose level is at or below the filter's maximum.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PiiLevel {
    /// No personally identifiable information.
    #[default]
    None,
    /// Indirect or low-risk identifiers.
    Low,
    /// Direct identifiers without financial/health detail.
    Medium,
    /// Direct identifiers with sensitive detail.
    High,
}

impl std::fmt::Display for PiiLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl PiiLevel {
    /// Returns the canonical `SCREAMING_SNAKE_CASE` form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }

    /// Parses a PII level from a string.
    ///
    /// Accepts both `SCREAMING_SNAKE_CASE` and lowercase forms.
    ///
    /// # Errors
    ///
    /// Returns `EvidenceError::InvalidPiiLevel` if the string is not a
    /// recognized level.
    pub fn parse(s: &str) -> Result<Self, EvidenceError> {
        match s.to_uppercase().as_str() {
            "NONE" => Ok(Self::None),
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            _ => Err(EvidenceError::InvalidPiiLevel {
                value: s.to_string(),
            }),
        }
    }
}

/// Caller-supplied metadata for creating or updating a record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Free-form source subsystem kind (e.g. `CLOSE_TASK`, `CTRL_RUN`).
    pub source_kind: String,

    /// Identifier within the source subsystem.
    pub source_id: String,

    /// Human-readable title.
    pub title: String,

    /// Optional free-form note.
    pub note: String,

    /// Tag set.
    pub tags: BTreeSet<String>,

    /// PII sensitivity level.
    pub pii_level: PiiLevel,
}

/// A logical evidence record over one stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    /// Record id.
    pub record_id: String,

    /// Owning tenant.
    pub tenant_id: String,

    /// Hash of the underlying object, hex-encoded.
    pub object_hash: String,

    /// Byte size of the underlying object.
    pub object_size: u64,

    /// Free-form source subsystem kind.
    pub source_kind: String,

    /// Identifier within the source subsystem.
    pub source_id: String,

    /// Human-readable title.
    pub title: String,

    /// Free-form note.
    pub note: String,

    /// Tag set (sorted).
    pub tags: BTreeSet<String>,

    /// PII sensitivity level.
    pub pii_level: PiiLevel,

    /// Actor that created the record.
    pub created_by: String,

    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

/// A join between a record and a work-item-shaped reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceLink {
    /// Link id.
    pub link_id: String,

    /// Owning tenant.
    pub tenant_id: String,

    /// Linked record id.
    pub record_id: String,

    /// Reference kind (e.g. `CLOSE_TASK`, `CTRL_RUN`).
    pub ref_kind: String,

    /// Reference id within the kind.
    pub ref_id: String,

    /// When the link was created.
    pub created_at: DateTime<Utc>,
}

fn validate_id(field: &'static str, value: &str) -> Result<(), EvidenceError> {
    if value.is_empty() {
        return Err(EvidenceError::InvalidField {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    if value.len() > MAX_ID_LEN {
        return Err(EvidenceError::InvalidField {
            field,
            reason: format!("exceeds {MAX_ID_LEN} characters"),
        });
    }
    Ok(())
}

fn validate_metadata(metadata: &RecordMetadata) -> Result<(), EvidenceError> {
    validate_id("source_kind", &metadata.source_kind)?;
    validate_id("source_id", &metadata.source_id)?;
    if metadata.title.is_empty() || metadata.title.len() > MAX_TITLE_LEN {
        return Err(EvidenceError::InvalidField {
            field: "title",
            reason: format!("must be 1..={MAX_TITLE_LEN} characters"),
        });
    }
    if metadata.note.len() > MAX_NOTE_LEN {
        return Err(EvidenceError::InvalidField {
            field: "note",
            reason: format!("exceeds {MAX_NOTE_LEN} characters"),
        });
    }
    if metadata.tags.len() > MAX_TAGS {
        return Err(EvidenceError::InvalidField {
            field: "tags",
            reason: format!("more than {MAX_TAGS} tags"),
        });
    }
    if let Some(tag) = metadata
        .tags
        .iter()
        .find(|t| t.is_empty() || t.len() > MAX_TAG_LEN)
    {
        return Err(EvidenceError::InvalidField {
            field: "tags",
            reason: format!("tag {tag:?} must be 1..={MAX_TAG_LEN} characters"),
        });
    }
    Ok(())
}

/// In-memory registry of evidence records and links.
///
/// Linking is idempotent: the same `(record, ref)` pair resolves to the
/// existing link rather than creating a duplicate row.
#[derive(Debug, Default)]
pub struct RecordRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    /// Records keyed by `(tenant, record_id)`.
    records: HashMap<(String, String), EvidenceRecord>,
    /// Links keyed by `(tenant, record_id, ref_kind, ref_id)`.
    links: HashMap<(String, String, String, String), EvidenceLink>,
}

impl RecordRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new logical record over a stored object.
    ///
    /// Always creates a new record, even when the object was deduplicated:
    /// distinct business contexts over the same file are intentional.
    ///
    /// # Errors
    ///
    /// Returns a validation error when metadata fields are out of bounds.
    pub fn create_record(
        &self,
        tenant_id: &str,
        object_hash: &str,
        object_size: u64,
        metadata: RecordMetadata,
        created_by: &str,
        now: DateTime<Utc>,
    ) -> Result<EvidenceRecord, EvidenceError> {
        validate_id("tenant_id", tenant_id)?;
        validate_metadata(&metadata)?;

        let record = EvidenceRecord {
            record_id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            object_hash: object_hash.to_ascii_lowercase(),
            object_size,
            source_kind: metadata.source_kind,
            source_id: metadata.source_id,
            title: metadata.title,
            note: metadata.note,
            tags: metadata.tags,
            pii_level: metadata.pii_level,
            created_by: created_by.to_string(),
            created_at: now,
        };

        let mut inner = self.inner.write().expect("lock poisoned");
        inner.records.insert(
            (tenant_id.to_string(), record.record_id.clone()),
            record.clone(),
        );
        Ok(record)
    }

    /// Returns one record.
    ///
    /// # Errors
    ///
    /// Returns `EvidenceError::RecordNotFound` when absent.
    pub fn get_record(
        &self,
        tenant_id: &str,
        record_id: &str,
    ) -> Result<EvidenceRecord, EvidenceError> {
        let inner = self.inner.read().expect("lock poisoned");
        inner
            .records
            .get(&(tenant_id.to_string(), record_id.to_string()))
            .cloned()
            .ok_or_else(|| EvidenceError::RecordNotFound {
                record_id: record_id.to_string(),
            })
    }

    /// Replaces a record's mutable metadata.
    ///
    /// The owning object and creation stamps are untouched. Sealed manifests
    /// are unaffected: they carry their own line snapshots.
    ///
    /// # Errors
    ///
    /// Returns `RecordNotFound` when absent, or a validation error when the
    /// new metadata is out of bounds.
    pub fn update_metadata(
        &self,
        tenant_id: &str,
        record_id: &str,
        metadata: RecordMetadata,
    ) -> Result<EvidenceRecord, EvidenceError> {
        validate_metadata(&metadata)?;

        let mut inner = self.inner.write().expect("lock poisoned");
        let record = inner
            .records
            .get_mut(&(tenant_id.to_string(), record_id.to_string()))
            .ok_or_else(|| EvidenceError::RecordNotFound {
                record_id: record_id.to_string(),
            })?;

        record.source_kind = metadata.source_kind;
        record.source_id = metadata.source_id;
        record.title = metadata.title;
        record.note = metadata.note;
        record.tags = metadata.tags;
        record.pii_level = metadata.pii_level;
        Ok(record.clone())
    }

    /// Links a record to a work-item-shaped reference.
    ///
    /// Idempotent: linking the same `(record, ref)` pair twice returns the
    /// existing link without creating a duplicate.
    ///
    /// # Errors
    ///
    /// Returns `RecordNotFound` when the record is absent, or a validation
    /// error for malformed reference components.
    pub fn link(
        &self,
        tenant_id: &str,
        record_id: &str,
        ref_kind: &str,
        ref_id: &str,
        now: DateTime<Utc>,
    ) -> Result<EvidenceLink, EvidenceError> {
        validate_id("ref_kind", ref_kind)?;
        validate_id("ref_id", ref_id)?;

        let mut inner = self.inner.write().expect("lock poisoned");
        if !inner
            .records
            .contains_key(&(tenant_id.to_string(), record_id.to_string()))
        {
            return Err(EvidenceError::RecordNotFound {
                record_id: record_id.to_string(),
            });
        }

        let key = (
            tenant_id.to_string(),
            record_id.to_string(),
            ref_kind.to_string(),
            ref_id.to_string(),
        );
        if let Some(existing) = inner.links.get(&key) {
            return Ok(existing.clone());
        }

        let link = EvidenceLink {
            link_id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            record_id: record_id.to_string(),
            ref_kind: ref_kind.to_string(),
            ref_id: ref_id.to_string(),
            created_at: now,
        };
        inner.links.insert(key, link.clone());
        Ok(link)
    }

    /// Removes a link. The record and object survive.
    ///
    /// Returns true when a link was removed, false when the pair was not
    /// linked.
    pub fn unlink(&self, tenant_id: &str, record_id: &str, ref_kind: &str, ref_id: &str) -> bool {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner
            .links
            .remove(&(
                tenant_id.to_string(),
                record_id.to_string(),
                ref_kind.to_string(),
                ref_id.to_string(),
            ))
            .is_some()
    }

    /// Returns all records linked to a reference, ordered by record id.
    ///
    /// The deterministic ordering feeds straight into manifest line order.
    #[must_use]
    pub fn query_by_ref(&self, tenant_id: &str, ref_kind: &str, ref_id: &str) -> Vec<EvidenceRecord> {
        let inner = self.inner.read().expect("lock poisoned");
        let mut records: Vec<EvidenceRecord> = inner
            .links
            .values()
            .filter(|link| {
                link.tenant_id == tenant_id && link.ref_kind == ref_kind && link.ref_id == ref_id
            })
            .filter_map(|link| {
                inner
                    .records
                    .get(&(tenant_id.to_string(), link.record_id.clone()))
                    .cloned()
            })
            .collect();
        records.sort_by(|a, b| a.record_id.cmp(&b.record_id));
        records
    }

    /// Returns the number of links attached to a reference.
    #[must_use]
    pub fn link_count(&self, tenant_id: &str, ref_kind: &str, ref_id: &str) -> usize {
        let inner = self.inner.read().expect("lock poisoned");
        inner
            .links
            .values()
            .filter(|link| {
                link.tenant_id == tenant_id && link.ref_kind == ref_kind && link.ref_id == ref_id
            })
            .count()
    }
}

impl Clone for RecordRegistry {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
