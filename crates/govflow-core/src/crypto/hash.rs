//! Blake3 hashing and hash-chain primitives.

use thiserror::Error;

/// Size of a Blake3 hash in bytes.
pub const HASH_SIZE: usize = 32;

/// Type alias for a 32-byte hash.
pub type Hash = [u8; HASH_SIZE];

/// Errors that can occur during hash chain operations.
#[derive(Debug, Error)]
pub enum HashChainError {
    /// The previous hash doesn't match the expected value.
    #[error("hash chain broken: expected {expected}, got {actual}")]
    ChainBroken {
        /// The expected previous hash.
        expected: String,
        /// The actual previous hash found.
        actual: String,
    },

    /// The event hash doesn't match the computed value.
    #[error("event hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        /// The expected hash.
        expected: String,
        /// The actual hash computed.
        actual: String,
    },

    /// A hex-encoded hash string is malformed.
    #[error("invalid hash encoding: expected {expected} hex characters, got {actual}")]
    InvalidEncoding {
        /// The expected number of hex characters.
        expected: usize,
        /// The actual length of the string.
        actual: usize,
    },
}

/// Hasher for governance content and audit events using Blake3.
///
/// `ContentHasher` computes content hashes for evidence objects and
/// checksums, and manages hash-chain linking between sequential audit
/// ledger events.
pub struct ContentHasher;

impl ContentHasher {
    /// The zero hash used as the previous hash for the genesis event.
    pub const GENESIS_PREV_HASH: Hash = [0u8; HASH_SIZE];

    /// Hashes raw content without chain linking.
    ///
    /// Use this for evidence object addressing and for checksums over
    /// canonical serializations.
    #[must_use]
    pub fn hash_content(content: &[u8]) -> Hash {
        *blake3::hash(content).as_bytes()
    }

    /// Hashes domain-separated content: `domain || content`.
    ///
    /// Checksums that are re-verified by external auditors use a domain
    /// separator so a manifest checksum can never collide with, say, an
    /// attestation checksum over the same bytes.
    #[must_use]
    pub fn hash_domain_separated(domain: &[u8], content: &[u8]) -> Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(domain);
        hasher.update(content);
        *hasher.finalize().as_bytes()
    }

    /// Hashes event content with chain linking.
    ///
    /// The hash is computed over: `prev_hash || content`, linking each
    /// audit event to the previous one.
    #[must_use]
    pub fn hash_event(content: &[u8], prev_hash: &Hash) -> Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(prev_hash);
        hasher.update(content);
        *hasher.finalize().as_bytes()
    }

    /// Verifies that an event hash matches the expected value.
    ///
    /// # Errors
    ///
    /// Returns `HashMismatch` if the computed hash doesn't match.
    pub fn verify_event_hash(
        content: &[u8],
        prev_hash: &Hash,
        expected_hash: &Hash,
    ) -> Result<(), HashChainError> {
        let computed = Self::hash_event(content, prev_hash);
        if computed != *expected_hash {
            return Err(HashChainError::HashMismatch {
                expected: hex_encode(expected_hash),
                actual: hex_encode(&computed),
            });
        }
        Ok(())
    }

    /// Verifies the chain link between two consecutive events.
    ///
    /// # Errors
    ///
    /// Returns `ChainBroken` if the hashes don't match.
    pub fn verify_chain_link(
        current_prev_hash: &Hash,
        previous_event_hash: &Hash,
    ) -> Result<(), HashChainError> {
        if current_prev_hash != previous_event_hash {
            return Err(HashChainError::ChainBroken {
                expected: hex_encode(previous_event_hash),
                actual: hex_encode(current_prev_hash),
            });
        }
        Ok(())
    }
}

/// Encodes bytes as a lowercase hex string.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut acc, b| {
            let _ = write!(acc, "{b:02x}");
            acc
        })
}

/// Decodes a hex string into a 32-byte hash.
///
/// # Errors
///
/// Returns `HashChainError::InvalidEncoding` if the string is not a valid
/// hex-encoded 32-byte hash.
pub fn hex_decode(s: &str) -> Result<Hash, HashChainError> {
    if s.len() != HASH_SIZE * 2 {
        return Err(HashChainError::InvalidEncoding {
            expected: HASH_SIZE * 2,
            actual: s.len(),
        });
    }

    let mut hash = [0u8; HASH_SIZE];
    for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
        let high = hex_char_to_nibble(chunk[0]);
        let low = hex_char_to_nibble(chunk[1]);
        match (high, low) {
            (Some(h), Some(l)) => hash[i] = (h << 4) | l,
            _ => {
                return Err(HashChainError::InvalidEncoding {
                    expected: HASH_SIZE * 2,
                    actual: s.len(),
                });
            }
        }
    }

    Ok(hash)
}

/// Converts a hex character to its nibble value.
const fn hex_char_to_nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}
