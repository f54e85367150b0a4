//! Conformance: Error Taxonomy
//!
//! Error display strings are compared across oracles, so the
//! `"{Category} error: {message}"` format and the EARE code registry are
//! both frozen.

use fw_core::errors::{is_valid_eare_error_code, OracleError, EARE_ERROR_CODES};

// ── Conformance: OracleError Display Stability ──────────────────

#[test]
fn conformance_oracle_error_display_format_stable() {
    let cases: Vec<(OracleError, &str)> = vec![
        (OracleError::Schema("x".into()), "Schema error: x"),
        (OracleError::Decode("x".into()), "Decode error: x"),
        (OracleError::Encode("x".into()), "Encode error: x"),
        (OracleError::Integrity("x".into()), "Integrity error: x"),
        (OracleError::Malformed("x".into()), "Malformed input: x"),
        (OracleError::Derivation("x".into()), "Derivation error: x"),
        (OracleError::DetectionMismatch("x".into()), "Detection mismatch: x"),
        (OracleError::Environment("x".into()), "Environment error: x"),
        (OracleError::Corpus("x".into()), "Corpus error: x"),
    ];
    for (error, expected) in &cases {
        assert_eq!(error.to_string(), *expected, "OracleError display drift detected");
    }
}

/// OracleError crosses task boundaries in the harness.
#[test]
fn conformance_oracle_error_send_sync() {
    fn assert_send_sync<T: Send + Sync + std::error::Error>() {}
    assert_send_sync::<OracleError>();
}

// ── Conformance: Operation → Error Variant Mapping ──────────────

#[test]
fn conformance_invalid_base64_maps_to_decode_error() {
    let err = fw_core::encoding::from_base64("!!!not-base64!!!").unwrap_err();
    assert!(err.to_string().starts_with("Decode error:"), "got: {err}");
}

#[test]
fn conformance_odd_hex_maps_to_decode_error() {
    let err = fw_core::encoding::from_hex("abc").unwrap_err();
    assert!(err.to_string().starts_with("Decode error:"), "got: {err}");
}

#[test]
fn conformance_unsupported_json_maps_to_encode_error() {
    let err = fw_core::cbor::from_json(&serde_json::json!({"v": null})).unwrap_err();
    assert!(err.to_string().starts_with("Encode error:"), "got: {err}");
}

#[test]
fn conformance_missing_corpus_is_corpus_error() {
    let path = crate::vectors_dir().join("does_not_exist.json");
    let err = fw_core::corpus::load::<fw_core::eare::EareCorpus>(&path).unwrap_err();
    assert!(matches!(err, OracleError::Corpus(_)), "got: {err}");
}

// ── Conformance: EARE Code Registry ─────────────────────────────

#[test]
fn conformance_eare_registry_exact_list() {
    assert_eq!(
        EARE_ERROR_CODES,
        [
            "INVALID_SIGNATURE",
            "INVALID_POP",
            "HASH_CHAIN_BREAK",
            "TRUNCATED_EARE",
            "EXTRA_FIELDS",
            "PAYLOAD_TAMPERED",
            "STALE_EPOCH_REF",
        ]
    );
}

#[test]
fn conformance_eare_registry_rejects_unknown() {
    for code in EARE_ERROR_CODES {
        assert!(is_valid_eare_error_code(code));
    }
    assert!(!is_valid_eare_error_code("TAMPER_PAYLOAD"));
    assert!(!is_valid_eare_error_code("hash_chain_break"));
}
