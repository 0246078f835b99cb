//! Tests for the crypto module.

use super::hash::{ContentHasher, HASH_SIZE, Hash, HashChainError, hex_decode, hex_encode};
use super::sign::{Signer, SignerError, verify_signature};

// =============================================================================
// Hashing Tests
// =============================================================================

#[test]
fn test_hash_content_deterministic() {
    let a = ContentHasher::hash_content(b"ledger line");
    let b = ContentHasher::hash_content(b"ledger line");
    assert_eq!(a, b);
}

#[test]
fn test_hash_content_differs_by_input() {
    let a = ContentHasher::hash_content(b"entry one");
    let b = ContentHasher::hash_content(b"entry two");
    assert_ne!(a, b);
}

#[test]
fn test_domain_separation_changes_hash() {
    let plain = ContentHasher::hash_content(b"payload");
    let domained = ContentHasher::hash_domain_separated(b"govflow:manifest:v1\0", b"payload");
    let other_domain = ContentHasher::hash_domain_separated(b"govflow:binder:v1\0", b"payload");
    assert_ne!(plain, domained);
    assert_ne!(domained, other_domain);
}

#[test]
fn test_hash_event_chains_on_prev() {
    let prev_a: Hash = [1u8; HASH_SIZE];
    let prev_b: Hash = [2u8; HASH_SIZE];
    let a = ContentHasher::hash_event(b"same content", &prev_a);
    let b = ContentHasher::hash_event(b"same content", &prev_b);
    assert_ne!(a, b);
}

#[test]
fn test_verify_event_hash_accepts_correct() {
    let prev = ContentHasher::GENESIS_PREV_HASH;
    let hash = ContentHasher::hash_event(b"event", &prev);
    assert!(ContentHasher::verify_event_hash(b"event", &prev, &hash).is_ok());
}

#[test]
fn test_verify_event_hash_rejects_tampered() {
    let prev = ContentHasher::GENESIS_PREV_HASH;
    let hash = ContentHasher::hash_event(b"event", &prev);
    let result = ContentHasher::verify_event_hash(b"tampered", &prev, &hash);
    assert!(matches!(result, Err(HashChainError::HashMismatch { .. })));
}

#[test]
fn test_verify_chain_link_rejects_break() {
    let a: Hash = [3u8; HASH_SIZE];
    let b: Hash = [4u8; HASH_SIZE];
    assert!(ContentHasher::verify_chain_link(&a, &a).is_ok());
    assert!(matches!(
        ContentHasher::verify_chain_link(&a, &b),
        Err(HashChainError::ChainBroken { .. })
    ));
}

// =============================================================================
// Hex Tests
// =============================================================================

#[test]
fn test_hex_roundtrip() {
    let hash = ContentHasher::hash_content(b"roundtrip");
    let encoded = hex_encode(&hash);
    assert_eq!(encoded.len(), HASH_SIZE * 2);
    let decoded = hex_decode(&encoded).unwrap();
    assert_eq!(hash, decoded);
}

#[test]
fn test_hex_decode_rejects_bad_length() {
    assert!(matches!(
        hex_decode("abcd"),
        Err(HashChainError::InvalidEncoding { .. })
    ));
}

#[test]
fn test_hex_decode_rejects_non_hex() {
    let bad = "zz".repeat(HASH_SIZE);
    assert!(matches!(
        hex_decode(&bad),
        Err(HashChainError::InvalidEncoding { .. })
    ));
}

// =============================================================================
// Signature Tests
// =============================================================================

#[test]
fn test_sign_and_verify() {
    let signer = Signer::generate();
    let message = b"attestation checksum";
    let signature = signer.sign(message);
    let key = hex_decode(&signer.public_key_hex()).unwrap();
    assert!(verify_signature(&key, message, &signature).is_ok());
}

#[test]
fn test_verify_rejects_wrong_message() {
    let signer = Signer::generate();
    let signature = signer.sign(b"original");
    let key = hex_decode(&signer.public_key_hex()).unwrap();
    assert!(matches!(
        verify_signature(&key, b"altered", &signature),
        Err(SignerError::VerificationFailed { .. })
    ));
}

#[test]
fn test_verify_rejects_wrong_key() {
    let signer = Signer::generate();
    let other = Signer::generate();
    let signature = signer.sign(b"message");
    let key = hex_decode(&other.public_key_hex()).unwrap();
    assert!(verify_signature(&key, b"message", &signature).is_err());
}

#[test]
fn test_verify_rejects_malformed_signature() {
    let signer = Signer::generate();
    let key = hex_decode(&signer.public_key_hex()).unwrap();
    assert!(matches!(
        verify_signature(&key, b"message", b"short"),
        Err(SignerError::InvalidSignature { .. })
    ));
}

#[test]
fn test_from_secret_bytes_is_deterministic() {
    let secret = [7u8; 32];
    let a = Signer::from_secret_bytes(&secret);
    let b = Signer::from_secret_bytes(&secret);
    assert_eq!(a.public_key_hex(), b.public_key_hex());
    assert_eq!(a.sign(b"stable"), b.sign(b"stable"));
}
