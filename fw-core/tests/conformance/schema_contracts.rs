//! Conformance: Schema Field Contracts
//!
//! A null field, a missing field and a mistyped field are three distinct
//! violations. Validation never stops at the first violation.

use fw_core::schema::{self, SchemaViolation, VectorSet};
use serde_json::json;

fn corpus() -> VectorSet {
    fw_core::corpus::load(&crate::vectors_dir().join("cbor_test_vectors.json")).unwrap()
}

/// Every positive vector validates and every negative vector fails on
/// the fields it names.
#[test]
fn conformance_schema_corpus_verdicts() {
    let summary = schema::run_vectors(&corpus()).unwrap();
    assert!(summary.all_passed(), "{:#?}", summary.scenarios);
    assert_eq!(summary.scenario_count, corpus().0.len());
}

/// `version: null` is an integer-type failure, not a missing field.
#[test]
fn conformance_null_version_is_type_failure() {
    let set = corpus();
    let vector = &set.0["invalid_null_version"];
    let report = schema::validate(&vector.data);
    assert!(!report.valid);
    assert_eq!(
        report.errors,
        vec![SchemaViolation::NullValue { field: "version", expected: "integer" }]
    );
    assert_eq!(
        report.error_messages(),
        vec!["Field version must be integer, got null"]
    );
}

/// All violations of one message are reported together.
#[test]
fn conformance_violations_are_not_fail_fast() {
    let report = schema::validate(&json!({
        "type": "HANDSHAKE_COMPLETE",
        "version": "1",
        "handshake_hash": "***",
        "timestamp": 1,
    }));
    let fields: Vec<_> = report.errors.iter().filter_map(SchemaViolation::field).collect();
    assert_eq!(fields, vec!["version", "session_id", "handshake_hash"]);
}

/// Undeclared fields warn without invalidating the message.
#[test]
fn conformance_unknown_fields_warn_only() {
    let set = corpus();
    let mut data = set.0["handshake_complete"].data.clone();
    data["debug"] = json!("x");
    let report = schema::validate(&data);
    assert!(report.valid, "{:?}", report.errors);
    assert_eq!(report.warnings, vec!["Unknown field: debug"]);
}

/// A tag that disagrees with the `type` field is a violation.
#[test]
fn conformance_vector_tag_must_match_type() {
    let set = corpus();
    let report = schema::validate_vector(&set.0["invalid_tag_mismatch"]);
    assert!(!report.valid);
    assert!(matches!(
        report.errors.as_slice(),
        [SchemaViolation::TagMismatch { expected: 0xD1, actual: 0xD2, .. }]
    ));
}
