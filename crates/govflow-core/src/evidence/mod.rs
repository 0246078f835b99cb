//! Evidence subsystem: content-addressed objects, records, and links.
//!
//! Evidence flows through three layers:
//!
//! ```text
//! bytes --> ObjectStore::put() --> EvidenceObject (deduplicated by hash)
//!                                       |
//!                                       v
//!               RecordRegistry::create_record() --> EvidenceRecord
//!                                       |
//!                                       v
//!               RecordRegistry::link() --> EvidenceLink (record <-> work ref)
//! ```
//!
//! # Key Concepts
//!
//! - **Object**: an immutable blob addressed by its Blake3 hash. Two uploads
//!   of identical bytes within a tenant resolve to one stored object.
//! - **Record**: a logical, mutable-metadata wrapper over one object. Many
//!   records may reference the same object for different business contexts.
//! - **Link**: an idempotent join between a record and a work-item-shaped
//!   reference (`kind` + `id`). Deleting a link never deletes the record or
//!   the object.
//!
//! # Integrity
//!
//! Uploads carrying a caller-declared hash are verified against the computed
//! hash and rejected outright on mismatch; nothing is persisted. Reads
//! re-verify stored bytes against their address.

mod cas;
mod error;
mod record;


pub use cas::{
    MAX_OBJECT_SIZE, MemoryObjectStore, ObjectMeta, ObjectRef, ObjectStore, verify_content,
};
pub use error::EvidenceError;
pub use record::{
    EvidenceLink, EvidenceRecord, MAX_ID_LEN, MAX_NOTE_LEN, MAX_TAGS, MAX_TAG_LEN, MAX_TITLE_LEN,
    PiiLevel, RecordMetadata, RecordRegistry,
};
