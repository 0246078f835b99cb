//! Binder packaging: deterministic downloadable artifacts over manifests.
//!
//! The container format is a fixed framing, written strictly in manifest
//! line order:
//!
//! ```text
//! magic "GOVBNDR1"                      (8 bytes)
//! manifest checksum, hex               (64 bytes)
//! line count, u32 big-endian            (4 bytes)
//! per line:
//!   record id length, u16 big-endian    (2 bytes)
//!   record id bytes
//!   object hash, raw                   (32 bytes)
//!   object size, u64 big-endian         (8 bytes)
//!   object bytes
//! ```
//!
//! Nothing in the container depends on build time, so rebuilding from the
//! same manifest yields byte-identical output. The gzip variant pins the
//! gzip header's mtime to zero for the same reason.

use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use flate2::{Compression, GzBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::builder::{Manifest, ManifestStore};
use super::error::ManifestError;
use crate::crypto::{ContentHasher, hex_decode, hex_encode};
use crate::evidence::ObjectStore;

/// Magic bytes opening every binder container.
pub const BINDER_MAGIC: &[u8; 8] = b"GOVBNDR1";

/// Fixed per-archive header size: magic + manifest checksum hex + line count.
const ARCHIVE_HEADER_BYTES: u64 = 8 + 64 + 4;

/// Fixed per-entry framing size, excluding the record id bytes.
const ENTRY_FRAME_BYTES: u64 = 2 + 32 + 8;

/// Packaging format of a binder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum BinderFormat {
    /// Raw framed container.
    Bundle,

    /// Framed container compressed with gzip (deterministic header).
    BundleGz,
}

impl BinderFormat {
    /// Returns the canonical `SCREAMING_SNAKE_CASE` form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bundle => "BUNDLE",
            Self::BundleGz => "BUNDLE_GZ",
        }
    }

    /// Parses a binder format from a string.
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::InvalidFormat` if the string is not
    /// recognized.
    pub fn parse(s: &str) -> Result<Self, ManifestError> {
        match s.to_uppercase().as_str() {
            "BUNDLE" => Ok(Self::Bundle),
            "BUNDLE_GZ" => Ok(Self::BundleGz),
            _ => Err(ManifestError::InvalidFormat {
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for BinderFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Container overhead of the raw `Bundle` format for a manifest:
/// the archive header plus per-entry framing.
///
/// `packaged size == manifest.total_bytes + container_overhead(manifest)`
/// holds exactly for `Bundle`; the gzip variant's size is content-dependent.
#[must_use]
pub fn container_overhead(manifest: &Manifest) -> u64 {
    ARCHIVE_HEADER_BYTES
        + manifest
            .lines
            .iter()
            .map(|line| ENTRY_FRAME_BYTES + line.record_id.len() as u64)
            .sum::<u64>()
}

/// A packaged artifact built from exactly one manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binder {
    /// Binder id.
    pub binder_id: String,

    /// Owning tenant.
    pub tenant_id: String,

    /// The manifest this binder packages.
    pub manifest_id: String,

    /// Packaging format.
    pub format: BinderFormat,

    /// Backend-specific storage locator.
    pub locator: String,

    /// Size of the packaged artifact in bytes.
    pub byte_size: u64,

    /// Blake3 checksum of the packaged bytes, hex-encoded.
    pub checksum_hex: String,

    /// Actor that requested the build.
    pub built_by: String,

    /// When the binder was built.
    pub built_at: DateTime<Utc>,
}

/// In-memory binder store shared by the packager and the attestation signer.
#[derive(Debug, Default)]
pub struct BinderStore {
    binders: Arc<RwLock<HashMap<(String, String), StoredBinder>>>,
}

#[derive(Debug, Clone)]
struct StoredBinder {
    binder: Binder,
    bytes: Vec<u8>,
}

impl BinderStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, binder: Binder, bytes: Vec<u8>) {
        let mut binders = self.binders.write().expect("lock poisoned");
        binders.insert(
            (binder.tenant_id.clone(), binder.binder_id.clone()),
            StoredBinder { binder, bytes },
        );
    }

    /// Returns one binder's metadata.
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::BinderNotFound` when absent.
    pub fn get(&self, tenant_id: &str, binder_id: &str) -> Result<Binder, ManifestError> {
        let binders = self.binders.read().expect("lock poisoned");
        binders
            .get(&(tenant_id.to_string(), binder_id.to_string()))
            .map(|stored| stored.binder.clone())
            .ok_or_else(|| ManifestError::BinderNotFound {
                binder_id: binder_id.to_string(),
            })
    }

    /// Returns one binder's packaged bytes.
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::BinderNotFound` when absent.
    pub fn get_bytes(&self, tenant_id: &str, binder_id: &str) -> Result<Vec<u8>, ManifestError> {
        let binders = self.binders.read().expect("lock poisoned");
        binders
            .get(&(tenant_id.to_string(), binder_id.to_string()))
            .map(|stored| stored.bytes.clone())
            .ok_or_else(|| ManifestError::BinderNotFound {
                binder_id: binder_id.to_string(),
            })
    }
}

impl Clone for BinderStore {
    fn clone(&self) -> Self {
        Self {
            binders: Arc::clone(&self.binders),
        }
    }
}

/// Write adapter that hashes and counts everything passing through it.
struct HashingWriter<W: Write> {
    inner: W,
    hasher: blake3::Hasher,
    written: u64,
}

impl<W: Write> HashingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: blake3::Hasher::new(),
            written: 0,
        }
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

fn io_err(e: &std::io::Error) -> ManifestError {
    ManifestError::Package {
        message: e.to_string(),
    }
}

/// Streams the raw framed container for a manifest into `writer`.
///
/// Entries are written strictly in the manifest's stored line order; object
/// bytes are fetched one line at a time rather than buffered together.
///
/// # Errors
///
/// Propagates object store failures and write failures.
pub fn write_container<W: Write>(
    manifest: &Manifest,
    objects: &dyn ObjectStore,
    writer: &mut W,
) -> Result<(), ManifestError> {
    writer.write_all(BINDER_MAGIC).map_err(|e| io_err(&e))?;
    writer
        .write_all(manifest.checksum_hex.as_bytes())
        .map_err(|e| io_err(&e))?;
    let line_count = u32::try_from(manifest.lines.len()).map_err(|_| ManifestError::Package {
        message: format!("line count {} exceeds u32", manifest.lines.len()),
    })?;
    writer
        .write_all(&line_count.to_be_bytes())
        .map_err(|e| io_err(&e))?;

    for line in &manifest.lines {
        let id_len = u16::try_from(line.record_id.len()).map_err(|_| ManifestError::Package {
            message: format!("record id length {} exceeds u16", line.record_id.len()),
        })?;
        writer
            .write_all(&id_len.to_be_bytes())
            .map_err(|e| io_err(&e))?;
        writer
            .write_all(line.record_id.as_bytes())
            .map_err(|e| io_err(&e))?;

        let raw_hash = hex_decode(&line.object_hash).map_err(|e| ManifestError::Package {
            message: format!("manifest line carries malformed object hash: {e}"),
        })?;
        writer.write_all(&raw_hash).map_err(|e| io_err(&e))?;
        writer
            .write_all(&line.byte_size.to_be_bytes())
            .map_err(|e| io_err(&e))?;

        let bytes = objects.get(&manifest.tenant_id, &line.object_hash)?;
        writer.write_all(&bytes).map_err(|e| io_err(&e))?;
    }

    writer.flush().map_err(|e| io_err(&e))?;
    Ok(())
}

/// Packages binders from manifests.
pub struct BinderPackager {
    manifests: ManifestStore,
    objects: Arc<dyn ObjectStore>,
    store: BinderStore,
}

impl BinderPackager {
    /// Creates a packager over a manifest store, object store, and binder
    /// store.
    pub fn new(manifests: ManifestStore, objects: Arc<dyn ObjectStore>, store: BinderStore) -> Self {
        Self {
            manifests,
            objects,
            store,
        }
    }

    /// Builds and persists a binder for a manifest.
    ///
    /// # Errors
    ///
    /// `ManifestNotFound` when the manifest is absent; object store and
    /// packaging failures otherwise.
    pub fn build(
        &self,
        tenant_id: &str,
        manifest_id: &str,
        format: BinderFormat,
        built_by: &str,
        now: DateTime<Utc>,
    ) -> Result<Binder, ManifestError> {
        let manifest = self.manifests.get(tenant_id, manifest_id)?;

        let mut packaged = HashingWriter::new(Vec::new());
        match format {
            BinderFormat::Bundle => {
                write_container(&manifest, self.objects.as_ref(), &mut packaged)?;
            }
            BinderFormat::BundleGz => {
                // mtime pinned to zero keeps the gzip stream reproducible.
                let mut encoder = GzBuilder::new()
                    .mtime(0)
                    .write(&mut packaged, Compression::default());
                write_container(&manifest, self.objects.as_ref(), &mut encoder)?;
                encoder.finish().map_err(|e| io_err(&e))?;
            }
        }

        let checksum_hex = hex_encode(packaged.hasher.finalize().as_bytes());
        let byte_size = packaged.written;
        let bytes = packaged.inner;

        let binder = Binder {
            binder_id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            manifest_id: manifest_id.to_string(),
            format,
            locator: format!("mem://{tenant_id}/binders/{manifest_id}/{}", format.as_str()),
            byte_size,
            checksum_hex,
            built_by: built_by.to_string(),
            built_at: now,
        };
        self.store.insert(binder.clone(), bytes);

        debug!(
            tenant_id,
            binder_id = %binder.binder_id,
            manifest_id,
            format = %format,
            byte_size,
            "binder built"
        );
        Ok(binder)
    }

    /// Verifies a stored binder's bytes against its checksum.
    ///
    /// # Errors
    ///
    /// `BinderNotFound` when absent; `ChecksumMismatch` when the stored
    /// bytes no longer hash to the stored checksum.
    pub fn verify(&self, tenant_id: &str, binder_id: &str) -> Result<(), ManifestError> {
        let binder = self.store.get(tenant_id, binder_id)?;
        let bytes = self.store.get_bytes(tenant_id, binder_id)?;
        let actual = hex_encode(&ContentHasher::hash_content(&bytes));
        if actual != binder.checksum_hex {
            return Err(ManifestError::ChecksumMismatch {
                expected: binder.checksum_hex,
                actual,
            });
        }
        Ok(())
    }

    /// Returns the underlying binder store.
    #[must_use]
    pub fn store(&self) -> &BinderStore {
        &self.store
    }
}
