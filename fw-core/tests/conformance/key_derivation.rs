//! Conformance: Key Derivation
//!
//! Labels, output lengths and the session key split are fixed across
//! languages. The media IV is a truncated digest, not an HKDF output.

use fw_core::client_auth::{ClientAuthError, ClientAuthToken, ClientAuthVerifier};
use fw_core::hash::sha256_concat;
use fw_core::kdf::{self, KdfVectorSet};

/// Every known-answer vector matches.
#[test]
fn conformance_kdf_vectors_match() {
    let set: KdfVectorSet =
        fw_core::corpus::load(&crate::vectors_dir().join("kdf_vectors.json")).unwrap();
    let summary = kdf::run_vectors(&set).unwrap();
    assert!(summary.all_passed(), "{:#?}", summary.scenarios);
}

/// Session key block splits 32 / 32 / 12.
#[test]
fn conformance_session_key_split() {
    let keys = kdf::session_keys(&[7u8; 32], &[9u8; 32]).unwrap();
    let block = kdf::derive(&[7u8; 32], Some(&[9u8; 32]), b"FoxWhisper-SessionKeys", 76).unwrap();
    assert_eq!(&keys.enc_key[..], &block[..32]);
    assert_eq!(&keys.auth_key[..], &block[32..64]);
    assert_eq!(&keys.nonce[..], &block[64..]);
}

/// Handshake secret label and input order are fixed.
#[test]
fn conformance_handshake_secret_concatenates_classical_first() {
    let classical = [1u8; 32];
    let pq = [2u8; 32];
    let secret = kdf::handshake_secret(&classical, &pq).unwrap();
    let mut ikm = classical.to_vec();
    ikm.extend_from_slice(&pq);
    let expected = kdf::derive(&ikm, None, b"FoxWhisper-Handshake-Root", 32).unwrap();
    assert_eq!(&secret[..], &expected[..]);
    assert_ne!(&secret[..], &kdf::handshake_secret(&pq, &classical).unwrap()[..]);
}

/// Media IV is the first 12 bytes of SHA-256 over the concatenation.
#[test]
fn conformance_media_iv_is_truncated_digest() {
    let iv = kdf::media_iv("call", "alice", "audio", 5);
    let digest = sha256_concat(&[b"call", b"alice", b"audio", &5u64.to_be_bytes()]);
    assert_eq!(iv.len(), 12);
    assert_eq!(iv[..], digest[..12]);
}

/// Output lengths outside the HKDF range are refused.
#[test]
fn conformance_derivation_length_bounds() {
    assert!(kdf::derive(b"ikm", None, b"l", 0).is_err());
    assert!(kdf::derive(b"ikm", None, b"l", 8161).is_err());
    assert_eq!(kdf::derive(b"ikm", None, b"l", 8160).unwrap().len(), 8160);
}

/// Client auth fails closed with a distinct cause per failure.
#[test]
fn conformance_client_auth_failure_causes() {
    let secret = [0x5a; 32];
    let now = 1_701_763_200_000u64;
    let mut verifier = ClientAuthVerifier::new(&secret, 30_000);

    let token = ClientAuthToken::sign(&secret, "call-1", "client-7", now, &[1; 16]).unwrap();
    assert_eq!(verifier.verify(&token, now + 10), Ok(()));
    assert_eq!(verifier.verify(&token, now + 20), Err(ClientAuthError::Replay));

    let stale = ClientAuthToken::sign(&secret, "call-1", "client-7", now - 60_000, &[2; 16]).unwrap();
    assert!(matches!(
        verifier.verify(&stale, now),
        Err(ClientAuthError::Expired { skew_ms: 60_000 })
    ));

    let mut forged = ClientAuthToken::sign(&secret, "call-1", "client-7", now, &[3; 16]).unwrap();
    forged.tag[0] ^= 0x01;
    assert_eq!(verifier.verify(&forged, now), Err(ClientAuthError::BadTag));
}
