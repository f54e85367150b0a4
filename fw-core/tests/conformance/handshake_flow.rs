//! Conformance: Handshake Flow Derivation
//!
//! The COMPLETE message carries `SHA-256(canonical(RESPONSE))` and the
//! session id derived from it.

use fw_core::handshake::{self, HandshakeFlowDoc};
use fw_core::schema::MessageType;

fn flow() -> HandshakeFlowDoc {
    fw_core::corpus::load(&crate::vectors_dir().join("end_to_end_test_vectors.json")).unwrap()
}

#[test]
fn conformance_handshake_flow_matches() {
    let summary = handshake::run_flow(&flow()).unwrap();
    assert!(summary.all_passed(), "{:#?}", summary.scenarios);
}

#[test]
fn conformance_flow_steps_follow_protocol_order() {
    let doc = flow();
    let types: Vec<_> = doc
        .handshake_flow
        .steps
        .iter()
        .map(|s| fw_core::schema::validate(&s.message).message_type)
        .collect();
    assert_eq!(
        types,
        vec![
            Some(MessageType::HandshakeInit),
            Some(MessageType::HandshakeResponse),
            Some(MessageType::HandshakeComplete),
        ]
    );
}

/// Any change to the RESPONSE message changes both derived values.
#[test]
fn conformance_response_edit_breaks_derivation() {
    let mut doc = flow();
    doc.handshake_flow.steps[1].message["timestamp"] = serde_json::json!(1u64);
    let summary = handshake::run_flow(&doc).unwrap();
    let report = summary.get("handshake_flow::derivation").unwrap();
    assert_eq!(report.failures.len(), 2);
}

/// A RESPONSE outside the canonical model fails its scenarios; the run
/// still produces a summary.
#[test]
fn conformance_unencodable_response_fails_derivation() {
    let mut doc = flow();
    doc.handshake_flow.steps[1].message["version"] = serde_json::Value::Null;
    let summary = handshake::run_flow(&doc).unwrap();
    assert_eq!(summary.scenario_count, 4);
    let report = summary.get("handshake_flow::derivation").unwrap();
    assert!(!report.passed());
    assert!(report.failures[0].starts_with("derivation failed"));
    assert!(!summary.get("handshake_flow::step_2").unwrap().passed());
}
