//! Manifest building, binder packaging, and attestation signing.
//!
//! The governance loop closes through three immutable artifacts:
//!
//! ```text
//! linked records --> ManifestBuilder::build() --> Manifest (checksummed lines)
//!                                                    |
//!                                                    v
//!                              BinderPackager::build() --> Binder (packaged bytes)
//!                                                    |
//!                                                    v
//!                          AttestationSigner::sign() --> Attestation (signed payload)
//! ```
//!
//! # Checksums
//!
//! All three artifacts carry checksums that downstream auditors re-verify
//! independently:
//!
//! - **Manifest**: Blake3 over a domain separator and the canonical JSON of
//!   the ordered line snapshot. Later mutation of a record's metadata never
//!   changes a sealed manifest — the lines are copies, not a live join.
//! - **Binder**: Blake3 over the packaged bytes themselves (the checksum an
//!   auditor gets from hashing the downloaded artifact).
//! - **Attestation**: Blake3 over a domain separator and the canonical JSON
//!   of the sign-off payload, additionally signed with Ed25519.
//!
//! # Determinism
//!
//! Rebuilding a binder from the same manifest and format yields
//! byte-identical output: entries are written in the manifest's stored line
//! order, the container carries no timestamps, and the gzip variant pins
//! its header fields.

mod attestation;
mod binder;
mod builder;
mod error;

#[cfg(test)]
mod tests;

pub use attestation::{
    ATTESTATION_CHECKSUM_DOMAIN, Attestation, AttestationSigner, MAX_STATEMENT_LEN,
};
pub use binder::{
    BINDER_MAGIC, Binder, BinderFormat, BinderPackager, BinderStore, container_overhead,
    write_container,
};
pub use builder::{
    MANIFEST_CHECKSUM_DOMAIN, Manifest, ManifestBuilder, ManifestFilter, ManifestLine,
    ManifestStore,
};
pub use error::ManifestError;
