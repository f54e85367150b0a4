//! Conformance: AEAD Binding
//!
//! Ciphertext is bound to its associated data. Any mismatch is an
//! integrity failure; input shorter than the tag is a structural one.

use fw_core::aead::{self, AeadVectorSet};
use fw_core::errors::OracleError;
use fw_core::kdf;

#[test]
fn conformance_aead_vectors_match() {
    let set: AeadVectorSet =
        fw_core::corpus::load(&crate::vectors_dir().join("aead_vectors.json")).unwrap();
    let summary = aead::run_vectors(&set).unwrap();
    assert!(summary.all_passed(), "{:#?}", summary.scenarios);
}

/// Changing any AAD component fails decryption.
#[test]
fn conformance_aad_binds_sender_room_and_sequence() {
    let keys = kdf::session_keys(&[3u8; 32], &[4u8; 32]).unwrap();
    let sender = [0xaa; 32];
    let aad = aead::message_aad(&sender, "lobby", 9).unwrap();
    let sealed = aead::encrypt(b"payload", &aad, &keys).unwrap();
    assert_eq!(sealed.len(), b"payload".len() + 16);
    assert_eq!(&aead::decrypt(&sealed, &aad, &keys).unwrap()[..], b"payload");

    let variants = [
        aead::message_aad(&[0xab; 32], "lobby", 9).unwrap(),
        aead::message_aad(&sender, "lobbY", 9).unwrap(),
        aead::message_aad(&sender, "lobby", 10).unwrap(),
    ];
    for wrong in &variants {
        assert!(matches!(
            aead::decrypt(&sealed, wrong, &keys),
            Err(OracleError::Integrity(_))
        ));
    }
}

/// Fifteen bytes cannot hold a tag; that is not an authentication failure.
#[test]
fn conformance_short_ciphertext_is_malformed() {
    let keys = kdf::session_keys(&[3u8; 32], &[4u8; 32]).unwrap();
    assert!(matches!(
        aead::decrypt(&[0u8; 15], b"", &keys),
        Err(OracleError::Malformed(_))
    ));
    assert!(matches!(
        aead::decrypt(&[0u8; 16], b"", &keys),
        Err(OracleError::Integrity(_))
    ));
}
