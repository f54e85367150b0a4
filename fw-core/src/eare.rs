//! Epoch Authenticity Record (EARE) chain verifier.
//!
//! ## State machine
//! ```text
//! nodes sorted by epoch_id (stable)
//! predecessor = none
//! for node:
//!     if predecessor is set and node.previous_epoch_hash != predecessor:
//!         emit HASH_CHAIN_BREAK, hash_breaks += 1, rejected += 1
//!     else:
//!         accepted += 1
//!     predecessor = node.eare_hash
//!     for corruption targeting node.node_id or "*":
//!         map corruption type -> error code (see CorruptionKind)
//! ```
//!
//! Corruptions are applied to a cloned verification view; the scenario
//! itself is never mutated. Error codes are de-duplicated in
//! first-occurrence order. Detection latency is modeled, not measured:
//! every detection reports 0 ms.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::constants::WILDCARD_TARGET;
use crate::corpus::Corpus;
use crate::errors::{is_valid_eare_error_code, OracleError};
use crate::report::{ScenarioReport, Summary};

// ── Corpus types ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GroupContext {
    pub group_id: String,
    #[serde(default)]
    pub membership_version: i64,
    #[serde(default)]
    pub epoch_size_limit: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EpochNode {
    pub node_id: String,
    pub epoch_id: i64,
    pub eare_hash: String,
    pub issued_by: String,
    pub previous_epoch_hash: String,
    pub membership_digest: String,
    #[serde(default)]
    pub payload: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Corruption {
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Node id, or `"*"` / absent for every node.
    #[serde(default)]
    pub target_node: Option<String>,
    #[serde(default)]
    pub fields: Option<Map<String, Value>>,
    #[serde(default)]
    pub payload_patch: Option<Value>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl Corruption {
    pub fn target(&self) -> &str {
        self.target_node.as_deref().unwrap_or(WILDCARD_TARGET)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Expectations {
    pub should_detect: bool,
    #[serde(default)]
    pub expected_errors: Vec<String>,
    /// Zero disables the SLA check.
    #[serde(default)]
    pub max_detection_ms: u64,
    #[serde(default)]
    pub allow_partial_accept: bool,
    #[serde(default)]
    pub residual_divergence_allowed: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EareScenario {
    pub scenario_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub group_context: GroupContext,
    pub nodes: Vec<EpochNode>,
    #[serde(default)]
    pub corruptions: Vec<Corruption>,
    pub expectations: Expectations,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct EareCorpus(pub Vec<EareScenario>);

impl Corpus for EareCorpus {
    fn scenario_count(&self) -> usize {
        self.0.len()
    }
}

// ── Corruption vocabulary ────────────────────────────────────────────

/// Corruption directive type, matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorruptionKind {
    InvalidSignature,
    InvalidPop,
    /// Counts a hash break without rejecting the node.
    HashChainBreak,
    /// Rejects the node.
    TruncatedEare,
    ExtraFields,
    /// Also accepts the `TAMPER_PAYLOAD` alias.
    PayloadTampered,
    StaleEpochRef,
    Unknown(String),
}

impl CorruptionKind {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "INVALID_SIGNATURE" => CorruptionKind::InvalidSignature,
            "INVALID_POP" => CorruptionKind::InvalidPop,
            "HASH_CHAIN_BREAK" => CorruptionKind::HashChainBreak,
            "TRUNCATED_EARE" => CorruptionKind::TruncatedEare,
            "EXTRA_FIELDS" => CorruptionKind::ExtraFields,
            "PAYLOAD_TAMPERED" | "TAMPER_PAYLOAD" => CorruptionKind::PayloadTampered,
            "STALE_EPOCH_REF" => CorruptionKind::StaleEpochRef,
            other => CorruptionKind::Unknown(other.to_owned()),
        }
    }

    /// Canonical error code, `None` for unknown kinds.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            CorruptionKind::InvalidSignature => Some("INVALID_SIGNATURE"),
            CorruptionKind::InvalidPop => Some("INVALID_POP"),
            CorruptionKind::HashChainBreak => Some("HASH_CHAIN_BREAK"),
            CorruptionKind::TruncatedEare => Some("TRUNCATED_EARE"),
            CorruptionKind::ExtraFields => Some("EXTRA_FIELDS"),
            CorruptionKind::PayloadTampered => Some("PAYLOAD_TAMPERED"),
            CorruptionKind::StaleEpochRef => Some("STALE_EPOCH_REF"),
            CorruptionKind::Unknown(_) => None,
        }
    }
}

// ── Verification view ────────────────────────────────────────────────

/// A node as the verifier sees it, with its corruptions attached.
///
/// `payload_patch` is merged into the payload and `fields` are kept as
/// overrides; neither changes the linkage fields the chain check reads.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewNode {
    pub node: EpochNode,
    pub overrides: Map<String, Value>,
    pub corruptions: Vec<Corruption>,
}

/// Clone, sort and corrupt a scenario's nodes.
pub fn verification_view(scenario: &EareScenario) -> (Vec<ViewNode>, Vec<String>) {
    let mut by_target: HashMap<&str, Vec<&Corruption>> = HashMap::new();
    for c in &scenario.corruptions {
        by_target.entry(c.target()).or_default().push(c);
    }

    let mut notes = Vec::new();
    for target in by_target.keys() {
        if *target != WILDCARD_TARGET && !scenario.nodes.iter().any(|n| n.node_id == *target) {
            notes.push(format!("corruption targets unknown node {target}"));
        }
    }
    notes.sort();

    let mut nodes = scenario.nodes.clone();
    nodes.sort_by_key(|n| n.epoch_id);

    let view = nodes
        .into_iter()
        .map(|mut node| {
            let corruptions: Vec<Corruption> = [node.node_id.as_str(), WILDCARD_TARGET]
                .iter()
                .filter_map(|t| by_target.get(t))
                .flatten()
                .map(|c| (*c).clone())
                .collect();
            let mut overrides = Map::new();
            for c in &corruptions {
                if let Some(fields) = &c.fields {
                    overrides.extend(fields.clone());
                }
                if let Some(patch) = &c.payload_patch {
                    node.payload = Some(merge_patch(node.payload.take(), patch));
                }
            }
            ViewNode { node, overrides, corruptions }
        })
        .collect();
    (view, notes)
}

/// Shallow object merge; a non-object patch replaces the payload.
fn merge_patch(payload: Option<Value>, patch: &Value) -> Value {
    match (payload, patch) {
        (Some(Value::Object(mut base)), Value::Object(p)) => {
            base.extend(p.clone());
            Value::Object(base)
        }
        _ => patch.clone(),
    }
}

// ── Chain verifier ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EareMetrics {
    pub chain_length: usize,
    pub hash_chain_breaks: usize,
    pub corruptions_applied: usize,
    pub accepted_nodes: usize,
    pub rejected_nodes: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub detection: bool,
    pub detection_ms: Option<u64>,
    pub errors: Vec<String>,
    pub metrics: EareMetrics,
    pub notes: Vec<String>,
}

/// Per-scenario verifier state. Never shared between scenarios.
#[derive(Debug, Default)]
pub struct ChainVerifier {
    predecessor: Option<String>,
    errors: Vec<&'static str>,
    notes: Vec<String>,
    metrics: EareMetrics,
}

impl ChainVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn emit(&mut self, code: &'static str) {
        if !self.errors.contains(&code) {
            self.errors.push(code);
        }
    }

    /// Advance over one node, in `epoch_id` order.
    pub fn push(&mut self, node: &EpochNode, corruptions: &[Corruption]) {
        self.metrics.chain_length += 1;
        match &self.predecessor {
            Some(prev) if node.previous_epoch_hash != *prev => {
                debug!(node = %node.node_id, epoch = node.epoch_id, "hash chain break");
                self.emit("HASH_CHAIN_BREAK");
                self.metrics.hash_chain_breaks += 1;
                self.metrics.rejected_nodes += 1;
            }
            _ => self.metrics.accepted_nodes += 1,
        }
        self.predecessor = Some(node.eare_hash.clone());

        for c in corruptions {
            let kind = CorruptionKind::parse(&c.kind);
            match &kind {
                CorruptionKind::HashChainBreak => self.metrics.hash_chain_breaks += 1,
                CorruptionKind::TruncatedEare => self.metrics.rejected_nodes += 1,
                CorruptionKind::Unknown(raw) => {
                    warn!(node = %node.node_id, corruption = %raw, "unhandled corruption type");
                    self.notes.push(format!("unhandled corruption {raw}"));
                }
                _ => {}
            }
            if let Some(code) = kind.code() {
                self.emit(code);
            }
        }
    }

    pub fn finish(self, corruptions_applied: usize) -> SimulationResult {
        let detection = !self.errors.is_empty();
        SimulationResult {
            detection,
            detection_ms: detection.then_some(0),
            errors: self.errors.into_iter().map(str::to_owned).collect(),
            metrics: EareMetrics {
                corruptions_applied,
                ..self.metrics
            },
            notes: self.notes,
        }
    }
}

/// Run the verifier over a scenario's corrupted view.
pub fn simulate(scenario: &EareScenario) -> SimulationResult {
    let (view, mut notes) = verification_view(scenario);
    let mut verifier = ChainVerifier::new();
    for v in &view {
        verifier.push(&v.node, &v.corruptions);
    }
    let mut result = verifier.finish(scenario.corruptions.len());
    notes.append(&mut result.notes);
    result.notes = notes;
    result
}

// ── Expectations ─────────────────────────────────────────────────────

/// Independent expectation checks; a scenario passes only with none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    DetectionMismatch,
    MissingDetectionMs,
    DetectionSla,
    UnexpectedDetectionMs,
    MissingExpectedErrors,
    PartialAcceptNotAllowed,
    ResidualDivergence,
}

impl Failure {
    pub fn as_str(self) -> &'static str {
        match self {
            Failure::DetectionMismatch => "detection_mismatch",
            Failure::MissingDetectionMs => "missing_detection_ms",
            Failure::DetectionSla => "detection_sla",
            Failure::UnexpectedDetectionMs => "unexpected_detection_ms",
            Failure::MissingExpectedErrors => "missing_expected_errors",
            Failure::PartialAcceptNotAllowed => "partial_accept_not_allowed",
            Failure::ResidualDivergence => "residual_divergence",
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Failure> for OracleError {
    fn from(f: Failure) -> Self {
        OracleError::DetectionMismatch(f.as_str().to_owned())
    }
}

/// Expected error codes absent from the observed set.
pub fn missing_expected_errors<'a>(exp: &'a Expectations, res: &SimulationResult) -> Vec<&'a str> {
    exp.expected_errors
        .iter()
        .filter(|code| !res.errors.contains(code))
        .map(String::as_str)
        .collect()
}

pub fn evaluate(exp: &Expectations, res: &SimulationResult) -> Vec<Failure> {
    let mut failures = Vec::new();
    if res.detection != exp.should_detect {
        failures.push(Failure::DetectionMismatch);
    }
    if exp.should_detect {
        match res.detection_ms {
            None => failures.push(Failure::MissingDetectionMs),
            Some(ms) if exp.max_detection_ms > 0 && ms > exp.max_detection_ms => {
                failures.push(Failure::DetectionSla)
            }
            Some(_) => {}
        }
    } else if res.detection_ms.is_some_and(|ms| ms != 0) {
        failures.push(Failure::UnexpectedDetectionMs);
    }
    if !missing_expected_errors(exp, res).is_empty() {
        failures.push(Failure::MissingExpectedErrors);
    }
    if !exp.allow_partial_accept && res.metrics.rejected_nodes > 0 {
        failures.push(Failure::PartialAcceptNotAllowed);
    }
    if !exp.residual_divergence_allowed && res.metrics.hash_chain_breaks > 0 {
        failures.push(Failure::ResidualDivergence);
    }
    failures
}

fn metrics_map(metrics: &EareMetrics) -> Result<Map<String, Value>, OracleError> {
    match serde_json::to_value(metrics) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(OracleError::Encode("metrics did not serialize to an object".into())),
        Err(e) => Err(OracleError::Encode(format!("metrics: {e}"))),
    }
}

/// Simulate and evaluate a single scenario.
pub fn run_scenario(scenario: &EareScenario) -> Result<ScenarioReport, OracleError> {
    let result = simulate(scenario);
    let mut report = ScenarioReport::new(scenario.scenario_id.as_str());
    for failure in evaluate(&scenario.expectations, &result) {
        report.fail(failure.as_str());
    }
    for code in missing_expected_errors(&scenario.expectations, &result) {
        report.notes.push(format!("expected error {code} not observed"));
    }
    for code in &scenario.expectations.expected_errors {
        if !is_valid_eare_error_code(code) {
            report.notes.push(format!("expected error {code} is not a registered code"));
        }
    }
    report.metrics = metrics_map(&result.metrics)?.into_iter().collect();
    report.errors = result.errors;
    report.notes.extend(result.notes);
    debug!(
        scenario = %scenario.scenario_id,
        status = ?report.status,
        errors = ?report.errors,
        "eare scenario"
    );
    Ok(report)
}

pub fn run_corpus(corpus: &EareCorpus) -> Result<Summary, OracleError> {
    let mut summary = Summary::new("rust", "corrupted_eare");
    for scenario in &corpus.0 {
        summary.record(run_scenario(scenario)?)?;
    }
    tracing::info!(passed = summary.passed, failed = summary.failed, "corrupted eare corpus");
    Ok(summary)
}
