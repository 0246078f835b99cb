//! Attestation signing: checksummed, Ed25519-signed sign-offs over binders.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::binder::BinderStore;
use super::error::ManifestError;
use crate::crypto::{ContentHasher, Signer, hex_decode, hex_encode, verify_signature};
use crate::work::AuthorityRole;

/// Domain separator for attestation payload checksums.
pub const ATTESTATION_CHECKSUM_DOMAIN: &[u8] = b"govflow:attestation:v1\0";

/// Maximum length of an attestation statement.
pub const MAX_STATEMENT_LEN: usize = 8192;

/// Canonical sign-off payload; the checksum and signature cover exactly
/// this serialization.
#[derive(Debug, Clone, Serialize)]
struct AttestationPayload<'a> {
    binder_id: &'a str,
    signer_id: &'a str,
    signer_role: AuthorityRole,
    statement: &'a str,
    signed_at: DateTime<Utc>,
}

/// A signed statement over one binder.
///
/// Attestations never mutate their binder; any number of signers may attest
/// the same binder independently, each with their own checksum and
/// signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    /// Attestation id.
    pub attestation_id: String,

    /// Owning tenant.
    pub tenant_id: String,

    /// The binder being attested.
    pub binder_id: String,

    /// Signer identity.
    pub signer_id: String,

    /// Signer authority role.
    pub signer_role: AuthorityRole,

    /// Sign-off statement text.
    pub statement: String,

    /// Blake3 checksum over the canonical payload, hex-encoded.
    pub checksum_hex: String,

    /// Ed25519 signature over the checksum, hex-encoded.
    pub signature_hex: String,

    /// Verifying key for the signature, hex-encoded.
    pub public_key_hex: String,

    /// When the attestation was signed.
    pub signed_at: DateTime<Utc>,
}

fn payload_checksum(
    binder_id: &str,
    signer_id: &str,
    signer_role: AuthorityRole,
    statement: &str,
    signed_at: DateTime<Utc>,
) -> Result<[u8; 32], ManifestError> {
    let payload = AttestationPayload {
        binder_id,
        signer_id,
        signer_role,
        statement,
        signed_at,
    };
    let canonical = serde_json::to_vec(&payload).map_err(|e| ManifestError::Serialization {
        message: e.to_string(),
    })?;
    Ok(ContentHasher::hash_domain_separated(
        ATTESTATION_CHECKSUM_DOMAIN,
        &canonical,
    ))
}

/// Signs attestations over binders and verifies them later.
pub struct AttestationSigner {
    binders: BinderStore,
    attestations: Arc<RwLock<HashMap<(String, String), Attestation>>>,
}

impl AttestationSigner {
    /// Creates a signer over a binder store.
    pub fn new(binders: BinderStore) -> Self {
        Self {
            binders,
            attestations: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Signs a statement over a binder.
    ///
    /// The binder itself is untouched; concurrent attestations by different
    /// signers contend on nothing but their own inserts.
    ///
    /// # Errors
    ///
    /// `BinderNotFound` when the binder is absent; `InvalidStatement` for
    /// an empty or oversized statement.
    pub fn sign(
        &self,
        tenant_id: &str,
        binder_id: &str,
        signer_id: &str,
        signer_role: AuthorityRole,
        statement: &str,
        signer: &Signer,
        now: DateTime<Utc>,
    ) -> Result<Attestation, ManifestError> {
        if statement.is_empty() {
            return Err(ManifestError::InvalidStatement {
                reason: "statement must not be empty".to_string(),
            });
        }
        if statement.len() > MAX_STATEMENT_LEN {
            return Err(ManifestError::InvalidStatement {
                reason: format!("statement exceeds {MAX_STATEMENT_LEN} bytes"),
            });
        }

        // Existence check only; no binder state changes.
        self.binders.get(tenant_id, binder_id)?;

        let checksum = payload_checksum(binder_id, signer_id, signer_role, statement, now)?;
        let signature = signer.sign(&checksum);

        let attestation = Attestation {
            attestation_id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            binder_id: binder_id.to_string(),
            signer_id: signer_id.to_string(),
            signer_role,
            statement: statement.to_string(),
            checksum_hex: hex_encode(&checksum),
            signature_hex: hex_encode(&signature),
            public_key_hex: signer.public_key_hex(),
            signed_at: now,
        };

        let mut attestations = self.attestations.write().expect("lock poisoned");
        attestations.insert(
            (tenant_id.to_string(), attestation.attestation_id.clone()),
            attestation.clone(),
        );
        debug!(
            tenant_id,
            binder_id,
            signer_id,
            role = %signer_role,
            "attestation signed"
        );
        Ok(attestation)
    }

    /// Verifies an attestation: recomputes the payload checksum and checks
    /// the Ed25519 signature.
    ///
    /// # Errors
    ///
    /// `ChecksumMismatch` when the stored checksum no longer matches the
    /// payload; a signer error when the signature fails.
    pub fn verify(&self, attestation: &Attestation) -> Result<(), ManifestError> {
        let checksum = payload_checksum(
            &attestation.binder_id,
            &attestation.signer_id,
            attestation.signer_role,
            &attestation.statement,
            attestation.signed_at,
        )?;
        let checksum_hex = hex_encode(&checksum);
        if checksum_hex != attestation.checksum_hex {
            return Err(ManifestError::ChecksumMismatch {
                expected: attestation.checksum_hex.clone(),
                actual: checksum_hex,
            });
        }

        let public_key = hex_decode(&attestation.public_key_hex).map_err(|e| {
            ManifestError::Serialization {
                message: format!("malformed public key: {e}"),
            }
        })?;
        let signature = decode_hex_bytes(&attestation.signature_hex).map_err(|message| {
            ManifestError::Serialization { message }
        })?;
        verify_signature(&public_key, &checksum, &signature)?;
        Ok(())
    }

    /// Returns one attestation, if present.
    #[must_use]
    pub fn get(&self, tenant_id: &str, attestation_id: &str) -> Option<Attestation> {
        let attestations = self.attestations.read().expect("lock poisoned");
        attestations
            .get(&(tenant_id.to_string(), attestation_id.to_string()))
            .cloned()
    }

    /// Returns every attestation over a binder, ordered by attestation id.
    #[must_use]
    pub fn list_for_binder(&self, tenant_id: &str, binder_id: &str) -> Vec<Attestation> {
        let attestations = self.attestations.read().expect("lock poisoned");
        let mut result: Vec<Attestation> = attestations
            .values()
            .filter(|a| a.tenant_id == tenant_id && a.binder_id == binder_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.attestation_id.cmp(&b.attestation_id));
        result
    }
}

/// Decodes arbitrary-length hex (signatures are 64 bytes, not hash-sized).
fn decode_hex_bytes(s: &str) -> Result<Vec<u8>, String> {
    if s.len() % 2 != 0 {
        return Err(format!("odd-length hex string: {} characters", s.len()));
    }
    s.as_bytes()
        .chunks(2)
        .map(|chunk| {
            let pair = std::str::from_utf8(chunk).map_err(|e| e.to_string())?;
            u8::from_str_radix(pair, 16).map_err(|e| e.to_string())
        })
        .collect()
}
