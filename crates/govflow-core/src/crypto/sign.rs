//! Ed25519 signing for attestation payloads.
//!
//! Attestation checksums are additionally signed with Ed25519 so that a
//! sign-off can be attributed to a keyholder, not just re-computed. The
//! signature covers the payload checksum, and the verifying key travels
//! with the attestation hex-encoded.

use ed25519_dalek::{Signature, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;

use super::hash::hex_encode;

/// Size of an Ed25519 verifying key in bytes.
pub const VERIFYING_KEY_SIZE: usize = 32;

/// Errors that can occur during signing operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SignerError {
    /// The verifying key bytes are malformed.
    #[error("invalid verifying key: {reason}")]
    InvalidVerifyingKey {
        /// Why the key was rejected.
        reason: String,
    },

    /// The signature bytes are malformed.
    #[error("invalid signature encoding: expected {expected} bytes, got {actual}")]
    InvalidSignature {
        /// The expected signature length.
        expected: usize,
        /// The actual length provided.
        actual: usize,
    },

    /// Signature verification failed.
    #[error("signature verification failed for key {public_key}")]
    VerificationFailed {
        /// The hex-encoded verifying key.
        public_key: String,
    },
}

/// An Ed25519 signer holding a keypair.
pub struct Signer {
    signing_key: SigningKey,
}

impl Signer {
    /// Generates a new signer with a random keypair.
    #[must_use]
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    /// Constructs a signer from raw secret key bytes.
    #[must_use]
    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(bytes),
        }
    }

    /// Signs a message, returning the 64-byte signature.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        use ed25519_dalek::Signer as _;
        self.signing_key.sign(message).to_bytes().to_vec()
    }

    /// Returns the hex-encoded verifying key for this signer.
    #[must_use]
    pub fn public_key_hex(&self) -> String {
        hex_encode(self.signing_key.verifying_key().as_bytes())
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

/// Verifies an Ed25519 signature over a message.
///
/// # Errors
///
/// Returns an error if the key or signature bytes are malformed, or if the
/// signature does not verify against the message.
pub fn verify_signature(
    public_key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<(), SignerError> {
    let key_bytes: [u8; VERIFYING_KEY_SIZE] =
        public_key
            .try_into()
            .map_err(|_| SignerError::InvalidVerifyingKey {
                reason: format!(
                    "expected {VERIFYING_KEY_SIZE} bytes, got {}",
                    public_key.len()
                ),
            })?;
    let key = VerifyingKey::from_bytes(&key_bytes).map_err(|e| SignerError::InvalidVerifyingKey {
        reason: e.to_string(),
    })?;

    let sig_bytes: [u8; 64] = signature
        .try_into()
        .map_err(|_| SignerError::InvalidSignature {
            expected: 64,
            actual: signature.len(),
        })?;
    let sig = Signature::from_bytes(&sig_bytes);

    key.verify(message, &sig)
        .map_err(|_| SignerError::VerificationFailed {
            public_key: hex_encode(public_key),
        })
}
