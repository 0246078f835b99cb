//! Tests for manifest building, binder packaging, and attestation signing.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use super::attestation::AttestationSigner;
use super::binder::{BINDER_MAGIC, BinderFormat, BinderPackager, BinderStore, container_overhead};
use super::builder::{Manifest, ManifestBuilder, ManifestFilter, ManifestStore};
use super::error::ManifestError;
use crate::crypto::Signer;
use crate::evidence::{
    MemoryObjectStore, ObjectStore, PiiLevel, RecordMetadata, RecordRegistry,
};
use crate::work::AuthorityRole;

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-02-03T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

struct Fixture {
    objects: MemoryObjectStore,
    registry: RecordRegistry,
    builder: ManifestBuilder,
    packager: BinderPackager,
    signer: AttestationSigner,
}

fn fixture() -> Fixture {
    let objects = MemoryObjectStore::new();
    let registry = RecordRegistry::new();
    let manifests = ManifestStore::new();
    let binders = BinderStore::new();
    let builder = ManifestBuilder::new(registry.clone(), manifests.clone());
    let packager = BinderPackager::new(manifests, Arc::new(objects.clone()), binders.clone());
    let signer = AttestationSigner::new(binders);
    Fixture {
        objects,
        registry,
        builder,
        packager,
        signer,
    }
}

fn add_record(
    f: &Fixture,
    content: &[u8],
    title: &str,
    tags: &[&str],
    pii: PiiLevel,
) -> String {
    let obj = f
        .objects
        .put("tenant-a", content, "text/plain", "alice", now())
        .unwrap();
    let record = f
        .registry
        .create_record(
            "tenant-a",
            &obj.hash_hex,
            obj.size,
            RecordMetadata {
                source_kind: "CTRL_RUN".to_string(),
                source_id: "123".to_string(),
                title: title.to_string(),
                note: String::new(),
                tags: tags.iter().map(|t| (*t).to_string()).collect(),
                pii_level: pii,
            },
            "alice",
            now(),
        )
        .unwrap();
    f.registry
        .link("tenant-a", &record.record_id, "CTRL_RUN", "123", now())
        .unwrap();
    record.record_id
}

fn build_default(f: &Fixture) -> Manifest {
    f.builder
        .build(
            "tenant-a",
            "CTRL_RUN",
            "123",
            ManifestFilter::default(),
            "auditor",
            now(),
        )
        .unwrap()
}

// =============================================================================
// Manifest Builder Tests
// =============================================================================

#[test]
fn test_build_snapshots_lines_in_record_order() {
    let f = fixture();
    add_record(&f, b"access review export", "Access review", &["q1"], PiiLevel::Low);
    add_record(&f, b"je listing", "JE listing", &[], PiiLevel::None);

    let manifest = build_default(&f);
    assert_eq!(manifest.lines.len(), 2);
    assert_eq!(manifest.object_count, 2);
    assert_eq!(
        manifest.total_bytes,
        manifest.lines.iter().map(|l| l.byte_size).sum::<u64>()
    );

    let ids: Vec<&String> = manifest.lines.iter().map(|l| &l.record_id).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);
    manifest.verify().unwrap();
}

#[test]
fn test_rebuild_on_unchanged_data_is_checksum_identical() {
    let f = fixture();
    add_record(&f, b"support A", "Support A", &[], PiiLevel::None);
    add_record(&f, b"support B", "Support B", &[], PiiLevel::None);

    let first = build_default(&f);
    let second = build_default(&f);
    assert_ne!(first.manifest_id, second.manifest_id);
    assert_eq!(first.checksum_hex, second.checksum_hex);
}

#[test]
fn test_sealed_manifest_unaffected_by_later_record_mutation() {
    let f = fixture();
    let record_id = add_record(&f, b"support", "Original title", &[], PiiLevel::None);

    let sealed = build_default(&f);
    let sealed_checksum = sealed.checksum_hex.clone();

    f.registry
        .update_metadata(
            "tenant-a",
            &record_id,
            RecordMetadata {
                source_kind: "CTRL_RUN".to_string(),
                source_id: "123".to_string(),
                title: "Renamed after sealing".to_string(),
                note: String::new(),
                tags: BTreeSet::from(["late-tag".to_string()]),
                pii_level: PiiLevel::None,
            },
        )
        .unwrap();

    // The sealed manifest still verifies against its stored snapshot.
    sealed.verify().unwrap();
    assert_eq!(sealed.checksum_hex, sealed_checksum);

    // A rebuild sees the mutation and diverges.
    let rebuilt = build_default(&f);
    assert_ne!(rebuilt.checksum_hex, sealed_checksum);
}

#[test]
fn test_empty_manifest_is_legal_and_deterministic() {
    let f = fixture();

    let first = build_default(&f);
    let second = build_default(&f);
    assert!(first.lines.is_empty());
    assert_eq!(first.object_count, 0);
    assert_eq!(first.total_bytes, 0);
    assert_eq!(first.checksum_hex, second.checksum_hex);
}

#[test]
fn test_pii_filter_excludes_above_maximum() {
    let f = fixture();
    add_record(&f, b"public", "Public doc", &[], PiiLevel::None);
    add_record(&f, b"payroll", "Payroll detail", &[], PiiLevel::High);

    let manifest = f
        .builder
        .build(
            "tenant-a",
            "CTRL_RUN",
            "123",
            ManifestFilter {
                max_pii_level: PiiLevel::Medium,
                exclude_tags: BTreeSet::new(),
            },
            "auditor",
            now(),
        )
        .unwrap();

    assert_eq!(manifest.lines.len(), 1);
    assert_eq!(manifest.lines[0].title, "Public doc");
}

#[test]
fn test_tag_exclusion_filter() {
    let f = fixture();
    add_record(&f, b"keep", "Keep", &["final"], PiiLevel::None);
    add_record(&f, b"drop", "Drop", &["draft", "final"], PiiLevel::None);

    let manifest = f
        .builder
        .build(
            "tenant-a",
            "CTRL_RUN",
            "123",
            ManifestFilter {
                max_pii_level: PiiLevel::High,
                exclude_tags: BTreeSet::from(["draft".to_string()]),
            },
            "auditor",
            now(),
        )
        .unwrap();

    assert_eq!(manifest.lines.len(), 1);
    assert_eq!(manifest.lines[0].title, "Keep");
}

#[test]
fn test_filter_validation() {
    let f = fixture();
    let result = f.builder.build(
        "tenant-a",
        "CTRL_RUN",
        "123",
        ManifestFilter {
            max_pii_level: PiiLevel::High,
            exclude_tags: BTreeSet::from([String::new()]),
        },
        "auditor",
        now(),
    );
    assert!(matches!(result, Err(ManifestError::InvalidFilter { .. })));
}

// =============================================================================
// Binder Packager Tests
// =============================================================================

#[test]
fn test_binder_rebuild_is_byte_identical() {
    let f = fixture();
    add_record(&f, b"exhibit one", "Exhibit 1", &[], PiiLevel::None);
    add_record(&f, b"exhibit two", "Exhibit 2", &[], PiiLevel::None);
    let manifest = build_default(&f);

    for format in [BinderFormat::Bundle, BinderFormat::BundleGz] {
        let first = f
            .packager
            .build("tenant-a", &manifest.manifest_id, format, "auditor", now())
            .unwrap();
        let second = f
            .packager
            .build(
                "tenant-a",
                &manifest.manifest_id,
                format,
                "auditor",
                now() + Duration::hours(6),
            )
            .unwrap();

        assert_ne!(first.binder_id, second.binder_id);
        assert_eq!(first.checksum_hex, second.checksum_hex, "{format} not reproducible");
        assert_eq!(first.byte_size, second.byte_size);
        assert_eq!(
            f.packager.store().get_bytes("tenant-a", &first.binder_id).unwrap(),
            f.packager.store().get_bytes("tenant-a", &second.binder_id).unwrap()
        );
    }
}

#[test]
fn test_bundle_size_equals_objects_plus_overhead() {
    let f = fixture();
    add_record(&f, b"twelve bytes", "A", &[], PiiLevel::None);
    add_record(&f, b"more evidence bytes", "B", &[], PiiLevel::None);
    let manifest = build_default(&f);

    let binder = f
        .packager
        .build(
            "tenant-a",
            &manifest.manifest_id,
            BinderFormat::Bundle,
            "auditor",
            now(),
        )
        .unwrap();

    assert_eq!(
        binder.byte_size,
        manifest.total_bytes + container_overhead(&manifest)
    );
}

#[test]
fn test_bundle_opens_with_magic_and_manifest_checksum() {
    let f = fixture();
    add_record(&f, b"payload", "A", &[], PiiLevel::None);
    let manifest = build_default(&f);

    let binder = f
        .packager
        .build(
            "tenant-a",
            &manifest.manifest_id,
            BinderFormat::Bundle,
            "auditor",
            now(),
        )
        .unwrap();
    let bytes = f.packager.store().get_bytes("tenant-a", &binder.binder_id).unwrap();

    assert_eq!(&bytes[..8], BINDER_MAGIC);
    assert_eq!(&bytes[8..72], manifest.checksum_hex.as_bytes());
}

#[test]
fn test_binder_missing_manifest() {
    let f = fixture();
    let result = f.packager.build(
        "tenant-a",
        "no-such-manifest",
        BinderFormat::Bundle,
        "auditor",
        now(),
    );
    assert!(matches!(result, Err(ManifestError::ManifestNotFound { .. })));
}

#[test]
fn test_binder_verify_roundtrip() {
    let f = fixture();
    add_record(&f, b"verified content", "A", &[], PiiLevel::None);
    let manifest = build_default(&f);
    let binder = f
        .packager
        .build(
            "tenant-a",
            &manifest.manifest_id,
            BinderFormat::BundleGz,
            "auditor",
            now(),
        )
        .unwrap();

    f.packager.verify("tenant-a", &binder.binder_id).unwrap();
}

#[test]
fn test_empty_manifest_binder() {
    let f = fixture();
    let manifest = build_default(&f);
    let binder = f
        .packager
        .build(
            "tenant-a",
            &manifest.manifest_id,
            BinderFormat::Bundle,
            "auditor",
            now(),
        )
        .unwrap();

    assert_eq!(binder.byte_size, container_overhead(&manifest));
    f.packager.verify("tenant-a", &binder.binder_id).unwrap();
}

#[test]
fn test_binder_format_parse() {
    assert_eq!(BinderFormat::parse("bundle").unwrap(), BinderFormat::Bundle);
    assert_eq!(BinderFormat::parse("BUNDLE_GZ").unwrap(), BinderFormat::BundleGz);
    assert!(matches!(
        BinderFormat::parse("ZIP"),
        Err(ManifestError::InvalidFormat { .. })
    ));
}

// =============================================================================
// Attestation Tests
// =============================================================================

fn build_binder(f: &Fixture) -> String {
    add_record(f, b"attested evidence", "A", &[], PiiLevel::None);
    let manifest = build_default(f);
    f.packager
        .build(
            "tenant-a",
            &manifest.manifest_id,
            BinderFormat::Bundle,
            "auditor",
            now(),
        )
        .unwrap()
        .binder_id
}

#[test]
fn test_sign_and_verify() {
    let f = fixture();
    let binder_id = build_binder(&f);
    let key = Signer::generate();

    let attestation = f
        .signer
        .sign(
            "tenant-a",
            &binder_id,
            "controller-1",
            AuthorityRole::Controller,
            "I attest the evidence in this binder is complete and accurate.",
            &key,
            now(),
        )
        .unwrap();

    assert_eq!(attestation.binder_id, binder_id);
    f.signer.verify(&attestation).unwrap();
}

#[test]
fn test_sign_missing_binder() {
    let f = fixture();
    let key = Signer::generate();
    let result = f.signer.sign(
        "tenant-a",
        "no-such-binder",
        "controller-1",
        AuthorityRole::Controller,
        "statement",
        &key,
        now(),
    );
    assert!(matches!(result, Err(ManifestError::BinderNotFound { .. })));
}

#[test]
fn test_tampered_statement_fails_verification() {
    let f = fixture();
    let binder_id = build_binder(&f);
    let key = Signer::generate();

    let mut attestation = f
        .signer
        .sign(
            "tenant-a",
            &binder_id,
            "cfo-1",
            AuthorityRole::Cfo,
            "Original statement.",
            &key,
            now(),
        )
        .unwrap();

    attestation.statement = "Altered statement.".to_string();
    assert!(matches!(
        f.signer.verify(&attestation),
        Err(ManifestError::ChecksumMismatch { .. })
    ));
}

#[test]
fn test_multiple_independent_attestations() {
    let f = fixture();
    let binder_id = build_binder(&f);
    let manager_key = Signer::generate();
    let cfo_key = Signer::generate();

    let first = f
        .signer
        .sign(
            "tenant-a",
            &binder_id,
            "manager-1",
            AuthorityRole::Manager,
            "Reviewed at manager level.",
            &manager_key,
            now(),
        )
        .unwrap();
    let second = f
        .signer
        .sign(
            "tenant-a",
            &binder_id,
            "cfo-1",
            AuthorityRole::Cfo,
            "Reviewed at CFO level.",
            &cfo_key,
            now() + Duration::hours(2),
        )
        .unwrap();

    assert_ne!(first.checksum_hex, second.checksum_hex);
    assert_eq!(f.signer.list_for_binder("tenant-a", &binder_id).len(), 2);
    f.signer.verify(&first).unwrap();
    f.signer.verify(&second).unwrap();
}

#[test]
fn test_empty_statement_rejected() {
    let f = fixture();
    let binder_id = build_binder(&f);
    let key = Signer::generate();
    let result = f.signer.sign(
        "tenant-a",
        &binder_id,
        "manager-1",
        AuthorityRole::Manager,
        "",
        &key,
        now(),
    );
    assert!(matches!(result, Err(ManifestError::InvalidStatement { .. })));
}
