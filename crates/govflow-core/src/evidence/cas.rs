//! Content-addressed storage for evidence objects.
//!
//! Objects are stored by the Blake3 hash of their bytes, scoped per tenant:
//!
//! - Deduplication: identical bytes uploaded twice within a tenant resolve
//!   to one stored object, and the backend is written at most once
//! - Integrity: caller-declared hashes are verified before anything is
//!   persisted; stored bytes are re-verified on read
//! - Immutability: stored content is never mutated; a colliding write with
//!   different bytes is rejected
//!
//! The store is a trait so persistence backends can vary; [`MemoryObjectStore`]
//! is the in-memory reference implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::EvidenceError;
use crate::crypto::{ContentHasher, hex_encode};

/// Maximum evidence object size (100 MB).
pub const MAX_OBJECT_SIZE: usize = 100 * 1024 * 1024;

/// Metadata for one stored evidence object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Content hash, hex-encoded.
    pub hash_hex: String,

    /// Size of the object in bytes.
    pub size: u64,

    /// Declared MIME type of the content.
    pub mime_type: String,

    /// Backend-specific storage locator.
    pub locator: String,

    /// When the object was first uploaded.
    pub uploaded_at: DateTime<Utc>,

    /// Actor that first uploaded the object.
    pub uploaded_by: String,
}

/// Result of a `put` operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    /// Content hash, hex-encoded.
    pub hash_hex: String,

    /// Size of the content in bytes.
    pub size: u64,

    /// True when the upload resolved to an already-stored object.
    pub deduplicated: bool,
}

/// Trait for content-addressed evidence object backends.
///
/// Implementations must ensure:
/// 1. Identical bytes within a tenant deduplicate to one object
/// 2. A declared hash that doesn't match computed content is rejected with
///    nothing persisted
/// 3. Stored content is immutable and re-verified on read
pub trait ObjectStore: Send + Sync {
    /// Stores content for a tenant and returns its reference.
    ///
    /// If an object with the same hash already exists for the tenant, the
    /// existing object is returned with `deduplicated: true` and no backend
    /// write occurs.
    ///
    /// # Errors
    ///
    /// - [`EvidenceError::EmptyContent`] if content is empty
    /// - [`EvidenceError::ContentTooLarge`] if content exceeds the size limit
    /// - [`EvidenceError::Collision`] if the hash maps to different bytes
    fn put(
        &self,
        tenant_id: &str,
        content: &[u8],
        mime_type: &str,
        uploaded_by: &str,
        now: DateTime<Utc>,
    ) -> Result<ObjectRef, EvidenceError>;

    /// Stores content with a caller-declared hash.
    ///
    /// # Errors
    ///
    /// [`EvidenceError::HashMismatch`] when the declared hash does not equal
    /// the computed hash of `content`; the object is not persisted. All
    /// `put` errors otherwise.
    fn put_declared(
        &self,
        tenant_id: &str,
        content: &[u8],
        declared_hash_hex: &str,
        mime_type: &str,
        uploaded_by: &str,
        now: DateTime<Utc>,
    ) -> Result<ObjectRef, EvidenceError> {
        let computed = hex_encode(&ContentHasher::hash_content(content));
        if !declared_hash_hex.eq_ignore_ascii_case(&computed) {
            return Err(EvidenceError::HashMismatch {
                expected: declared_hash_hex.to_ascii_lowercase(),
                actual: computed,
            });
        }
        self.put(tenant_id, content, mime_type, uploaded_by, now)
    }

    /// Retrieves object bytes, verifying them against their address.
    ///
    /// # Errors
    ///
    /// - [`EvidenceError::ObjectNotFound`] if no object exists
    /// - [`EvidenceError::HashMismatch`] if stored bytes fail verification
    ///   (backend corruption)
    fn get(&self, tenant_id: &str, hash_hex: &str) -> Result<Vec<u8>, EvidenceError>;

    /// Returns the metadata for an object.
    ///
    /// # Errors
    ///
    /// [`EvidenceError::ObjectNotFound`] if no object exists.
    fn meta(&self, tenant_id: &str, hash_hex: &str) -> Result<ObjectMeta, EvidenceError>;

    /// Checks whether an object exists for the tenant.
    fn exists(&self, tenant_id: &str, hash_hex: &str) -> bool;
}

/// Verifies content against an expected hex-encoded hash.
///
/// # Errors
///
/// Returns [`EvidenceError::HashMismatch`] when the computed hash differs.
pub fn verify_content(content: &[u8], expected_hash_hex: &str) -> Result<(), EvidenceError> {
    let computed = hex_encode(&ContentHasher::hash_content(content));
    if !expected_hash_hex.eq_ignore_ascii_case(&computed) {
        return Err(EvidenceError::HashMismatch {
            expected: expected_hash_hex.to_ascii_lowercase(),
            actual: computed,
        });
    }
    Ok(())
}

/// In-memory content-addressed store.
///
/// Objects are keyed by `(tenant, hash)`. Suitable for tests and embedding;
/// not intended for large production artifact sets.
#[derive(Debug)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<HashMap<(String, String), StoredObject>>>,
    /// Count of backend writes, exposed so tests can assert at-most-once
    /// storage for duplicate uploads.
    writes: Arc<RwLock<u64>>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    meta: ObjectMeta,
    bytes: Vec<u8>,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            objects: Arc::new(RwLock::new(HashMap::new())),
            writes: Arc::new(RwLock::new(0)),
        }
    }

    /// Returns the number of stored objects across all tenants.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (indicates a thread panic).
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns true if no objects are stored.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (indicates a thread panic).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// Returns the number of backend writes performed.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (indicates a thread panic).
    #[must_use]
    pub fn write_count(&self) -> u64 {
        *self.writes.read().expect("lock poisoned")
    }
}

impl Clone for MemoryObjectStore {
    fn clone(&self) -> Self {
        Self {
            objects: Arc::clone(&self.objects),
            writes: Arc::clone(&self.writes),
        }
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put(
        &self,
        tenant_id: &str,
        content: &[u8],
        mime_type: &str,
        uploaded_by: &str,
        now: DateTime<Utc>,
    ) -> Result<ObjectRef, EvidenceError> {
        if content.is_empty() {
            return Err(EvidenceError::EmptyContent);
        }
        if content.len() > MAX_OBJECT_SIZE {
            return Err(EvidenceError::ContentTooLarge {
                size: content.len(),
                max_size: MAX_OBJECT_SIZE,
            });
        }

        let hash_hex = hex_encode(&ContentHasher::hash_content(content));
        let size = content.len() as u64;
        let key = (tenant_id.to_string(), hash_hex.clone());

        // Single write lock covers the dedup check and the insert, so a race
        // between two identical uploads converges on one stored object.
        let mut objects = self.objects.write().expect("lock poisoned");

        if let Some(existing) = objects.get(&key) {
            if existing.bytes != content {
                return Err(EvidenceError::Collision { hash: hash_hex });
            }
            return Ok(ObjectRef {
                hash_hex,
                size,
                deduplicated: true,
            });
        }

        let meta = ObjectMeta {
            hash_hex: hash_hex.clone(),
            size,
            mime_type: mime_type.to_string(),
            locator: format!("mem://{tenant_id}/{hash_hex}"),
            uploaded_at: now,
            uploaded_by: uploaded_by.to_string(),
        };
        objects.insert(
            key,
            StoredObject {
                meta,
                bytes: content.to_vec(),
            },
        );
        *self.writes.write().expect("lock poisoned") += 1;

        Ok(ObjectRef {
            hash_hex,
            size,
            deduplicated: false,
        })
    }

    fn get(&self, tenant_id: &str, hash_hex: &str) -> Result<Vec<u8>, EvidenceError> {
        let objects = self.objects.read().expect("lock poisoned");
        let key = (tenant_id.to_string(), hash_hex.to_ascii_lowercase());
        let stored = objects.get(&key).ok_or_else(|| EvidenceError::ObjectNotFound {
            hash: hash_hex.to_string(),
        })?;

        verify_content(&stored.bytes, hash_hex)?;
        Ok(stored.bytes.clone())
    }

    fn meta(&self, tenant_id: &str, hash_hex: &str) -> Result<ObjectMeta, EvidenceError> {
        let objects = self.objects.read().expect("lock poisoned");
        let key = (tenant_id.to_string(), hash_hex.to_ascii_lowercase());
        objects
            .get(&key)
            .map(|stored| stored.meta.clone())
            .ok_or_else(|| EvidenceError::ObjectNotFound {
                hash: hash_hex.to_string(),
            })
    }

    fn exists(&self, tenant_id: &str, hash_hex: &str) -> bool {
        let objects = self.objects.read().expect("lock poisoned");
        objects.contains_key(&(tenant_id.to_string(), hash_hex.to_ascii_lowercase()))
    }
}
