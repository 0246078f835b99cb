//! Cryptographic primitives for the govflow engine.
//!
//! This module provides the hashing and signature primitives used by the
//! evidence store and the packaging pipeline:
//!
//! - **Blake3 hashing**: content addressing for evidence objects and
//!   canonical checksums for manifests, binders, and attestations
//! - **Hash-chain linking**: cryptographic linking between sequential audit
//!   ledger events
//! - **Ed25519 signatures**: sign-off signatures over attestation payloads
//!
//! # Hash Chain
//!
//! Each event appended to the audit ledger carries a hash of its content and
//! a reference to the previous event's hash, forming an immutable chain. Any
//! tampering with historical events breaks the chain.
//!
//! # Checksums
//!
//! Manifest, binder, and attestation checksums are computed over
//! domain-separated canonical input (`domain || canonical bytes`) so that
//! downstream auditors can independently re-verify them. The domain
//! constants live next to the structures they protect.

mod hash;
mod sign;

#[cfg(test)]
mod tests;

pub use hash::{
    ContentHasher, HASH_SIZE, Hash, HashChainError, hex_decode, hex_encode,
};
pub use sign::{Signer, SignerError, VERIFYING_KEY_SIZE, verify_signature};
