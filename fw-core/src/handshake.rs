//! Handshake-flow derivation check.
//!
//! A flow is the three messages INIT, RESPONSE and COMPLETE. Each step is
//! schema-validated, then the COMPLETE message's `handshake_hash` and
//! `session_id` are recomputed:
//!
//! ```text
//! handshake_hash = SHA-256(canonical(RESPONSE))
//! session_id     = HKDF(ikm = handshake_hash, salt = none, "FoxWhisper-SessionId", 32)
//! ```
//!
//! Both are compared as base64 text and every mismatch is reported.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::cbor;
use crate::corpus::Corpus;
use crate::encoding::to_base64;
use crate::errors::OracleError;
use crate::hash::fingerprint;
use crate::kdf;
use crate::report::{ScenarioReport, Summary};
use crate::schema::{self, MessageType};

/// Message order a flow must follow.
pub const FLOW_ORDER: [MessageType; 3] = [
    MessageType::HandshakeInit,
    MessageType::HandshakeResponse,
    MessageType::HandshakeComplete,
];

#[derive(Debug, Clone, Deserialize)]
pub struct FlowStep {
    #[serde(default)]
    pub step: Option<u64>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    pub message: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HandshakeFlow {
    #[serde(default)]
    pub description: String,
    pub steps: Vec<FlowStep>,
}

/// Top-level flow document. Other top-level sections are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct HandshakeFlowDoc {
    pub handshake_flow: HandshakeFlow,
}

impl Corpus for HandshakeFlowDoc {
    fn scenario_count(&self) -> usize {
        self.handshake_flow.steps.len()
    }
}

/// Values recomputed from the RESPONSE message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowDerivation {
    pub handshake_hash: [u8; 32],
    pub session_id: [u8; 32],
}

/// Recompute the handshake hash and session id from a RESPONSE message.
///
/// # Errors
///
/// `Encode` if the message holds a value outside the canonical model.
pub fn derive(response: &Value) -> Result<FlowDerivation, OracleError> {
    let handshake_hash = cbor::digest(&cbor::from_json(response)?)?;
    let session_id = kdf::session_id(&handshake_hash)?;
    debug!(
        handshake_hash = %fingerprint(&handshake_hash),
        session_id = %fingerprint(&session_id),
        "handshake flow derivation"
    );
    Ok(FlowDerivation {
        handshake_hash,
        session_id,
    })
}

/// Mismatches between a COMPLETE message and the recomputed values.
pub fn derivation_mismatches(complete: &Value, derived: &FlowDerivation) -> Vec<String> {
    let checks = [
        ("handshake_hash", to_base64(&derived.handshake_hash)),
        ("session_id", to_base64(&derived.session_id)),
    ];
    checks
        .into_iter()
        .filter_map(|(field, computed)| {
            let claimed = complete.get(field).and_then(Value::as_str).unwrap_or("");
            (claimed != computed).then(|| format!("{field} mismatch: {claimed} != {computed}"))
        })
        .collect()
}

fn timestamp(message: &Value) -> Option<u64> {
    message.get("timestamp").and_then(Value::as_u64)
}

/// Validate and derive over a flow, one scenario per step plus one for
/// the derivation. Steps past COMPLETE fail the last step's scenario; a
/// RESPONSE that cannot be encoded fails the derivation scenario.
///
/// # Errors
///
/// `Corpus` if the flow has fewer than three steps.
pub fn run_flow(doc: &HandshakeFlowDoc) -> Result<Summary, OracleError> {
    let steps = &doc.handshake_flow.steps;
    if steps.len() < FLOW_ORDER.len() {
        return Err(OracleError::Corpus(format!(
            "handshake_flow has {} steps, need {}",
            steps.len(),
            FLOW_ORDER.len()
        )));
    }

    let extra = steps.len() - FLOW_ORDER.len();
    let mut summary = Summary::new("rust", "handshake_flow");
    let mut previous_ts = None;
    for (i, (step, expected)) in steps.iter().zip(FLOW_ORDER).enumerate() {
        let validation = schema::validate(&step.message);
        let mut report = ScenarioReport::new(format!("handshake_flow::step_{}", i + 1));
        report.errors = validation.error_messages();
        report.notes = validation.warnings.clone();
        report.check(validation.valid, || "schema violations".to_owned());
        report.check(validation.message_type == Some(expected), || {
            format!("expected {} at step {}", expected.name(), i + 1)
        });
        let ts = timestamp(&step.message);
        if let (Some(prev), Some(now)) = (previous_ts, ts) {
            report.check(now >= prev, || format!("timestamp {now} precedes {prev}"));
        }
        previous_ts = ts.or(previous_ts);
        if i + 1 == FLOW_ORDER.len() {
            report.check(extra == 0, || {
                format!("{extra} unexpected step(s) after {}", expected.name())
            });
        }
        summary.record(report)?;
    }

    let mut report = ScenarioReport::new("handshake_flow::derivation");
    match derive(&steps[1].message) {
        Ok(derived) => {
            report.set_metric("handshake_hash", to_base64(&derived.handshake_hash));
            report.set_metric("session_id", to_base64(&derived.session_id));
            for mismatch in derivation_mismatches(&steps[2].message, &derived) {
                report.fail(mismatch);
            }
        }
        Err(e) => report.fail(format!("derivation failed: {e}")),
    }
    summary.record(report)?;

    tracing::info!(passed = summary.passed, failed = summary.failed, "handshake flow");
    Ok(summary)
}
