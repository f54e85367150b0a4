//! Epoch-fork simulator.
//!
//! Replays a scenario's event stream over its epoch graph and decides
//! whether a fork was observed, which branch wins reconciliation, and
//! how long detection and healing took.
//!
//! ## Event replay
//! ```text
//! events sorted by t (stable on input order)
//! epoch_issue   node N (skipped when faulted with drop_next_eare):
//!     fork if another hash was already seen for N.epoch_id
//!     fork if N has a parent whose other children differ from N in (epoch_id, hash)
//!     first fork: fork_created = t, detected_at = t + delay_validation
//!     HASH_CHAIN_BREAK if N.previous_epoch_hash != parent.eare_hash
//! replay_attempt  messages_dropped += count
//! merge           first one marks reconciliation
//! ```
//!
//! The winning branch is the observed node with the greatest
//! `(depth, epoch_id, earliest timestamp, eare_hash)`.
//!
//! Graph problems (duplicate node ids, dangling edges or parents, events
//! naming unknown nodes) are corpus errors.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::corpus::Corpus;
use crate::errors::OracleError;
use crate::report::{ScenarioReport, Summary};

/// Emitted once per scenario when a fork is observed.
pub const EPOCH_FORK_DETECTED: &str = "EPOCH_FORK_DETECTED";

const HASH_CHAIN_BREAK: &str = "HASH_CHAIN_BREAK";
const DROP_FAULT: &str = "drop_next_eare";
const DELAY_FAULT_PREFIX: &str = "delay_validation:";
const FORK_OBSERVABLE: &str = "fork_observable";

// ── Corpus types ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ForkNode {
    pub node_id: String,
    pub epoch_id: i64,
    pub eare_hash: String,
    #[serde(default)]
    pub previous_epoch_hash: Option<String>,
    #[serde(default)]
    pub membership_digest: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub issued_by: String,
    #[serde(default)]
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ForkEdge {
    pub from: String,
    pub to: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EpochGraph {
    #[serde(default)]
    pub nodes: Vec<ForkNode>,
    #[serde(default)]
    pub edges: Vec<ForkEdge>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ForkEvent {
    #[serde(default)]
    pub t: i64,
    pub event: String,
    #[serde(default)]
    pub controller: Option<String>,
    #[serde(default)]
    pub epoch_id: Option<i64>,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub reconcile_strategy: Option<String>,
    #[serde(default)]
    pub count: Option<i64>,
    #[serde(default)]
    pub faults: Vec<String>,
}

impl ForkEvent {
    fn drops_eare(&self) -> bool {
        self.faults.iter().any(|f| f == DROP_FAULT)
    }

    /// First `delay_validation:<ms>` fault; unparsable values count as 0.
    fn validation_delay_ms(&self) -> i64 {
        self.faults
            .iter()
            .find_map(|f| f.strip_prefix(DELAY_FAULT_PREFIX))
            .map_or(0, |ms| ms.trim().parse().unwrap_or(0))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReconciledEpoch {
    /// Zero skips the epoch check.
    #[serde(default)]
    pub epoch_id: i64,
    #[serde(default)]
    pub node_id: Option<String>,
    /// Empty skips the hash check.
    #[serde(default)]
    pub eare_hash: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReplayGap {
    #[serde(default)]
    pub max_messages: i64,
    #[serde(default)]
    pub max_ms: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ForkExpectations {
    #[serde(default)]
    pub detected: bool,
    /// `fork_created` (default) or `fork_observable`.
    #[serde(default)]
    pub detection_reference: String,
    #[serde(default)]
    pub max_detection_ms: i64,
    #[serde(default)]
    pub max_reconciliation_ms: i64,
    #[serde(default)]
    pub reconciled_epoch: ReconciledEpoch,
    #[serde(default)]
    pub allow_replay_gap: ReplayGap,
    #[serde(default)]
    pub expected_error_categories: Vec<String>,
    #[serde(default)]
    pub healing_required: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ForkScenario {
    pub scenario_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub group_context: Map<String, Value>,
    #[serde(default)]
    pub graph: EpochGraph,
    #[serde(default)]
    pub event_stream: Vec<ForkEvent>,
    #[serde(default)]
    pub expectations: ForkExpectations,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct EpochForkCorpus(pub Vec<ForkScenario>);

impl Corpus for EpochForkCorpus {
    fn scenario_count(&self) -> usize {
        self.0.len()
    }
}

// ── Graph index ──────────────────────────────────────────────────────

/// Node lookup for one scenario, checked for referential integrity.
#[derive(Debug)]
pub struct GraphIndex<'a> {
    nodes: HashMap<&'a str, &'a ForkNode>,
}

impl<'a> GraphIndex<'a> {
    /// # Errors
    /// `OracleError::Corpus` on a duplicate node id, an edge endpoint or
    /// parent that names no node.
    pub fn build(scenario: &'a ForkScenario) -> Result<Self, OracleError> {
        let corpus_err =
            |msg: String| OracleError::Corpus(format!("{}: {msg}", scenario.scenario_id));

        let mut nodes = HashMap::new();
        for node in &scenario.graph.nodes {
            if nodes.insert(node.node_id.as_str(), node).is_some() {
                return Err(corpus_err(format!("duplicate node_id {}", node.node_id)));
            }
        }
        for edge in &scenario.graph.edges {
            for end in [&edge.from, &edge.to] {
                if !nodes.contains_key(end.as_str()) {
                    return Err(corpus_err(format!("edge references unknown node {end}")));
                }
            }
        }
        for node in &scenario.graph.nodes {
            if let Some(parent) = &node.parent_id {
                if !nodes.contains_key(parent.as_str()) {
                    return Err(corpus_err(format!(
                        "node {} references unknown parent {parent}",
                        node.node_id
                    )));
                }
            }
        }
        Ok(Self { nodes })
    }

    pub fn get(&self, node_id: &str) -> Option<&'a ForkNode> {
        self.nodes.get(node_id).copied()
    }

    /// Number of parent hops to a root. Cycles stop the walk.
    pub fn depth(&self, node_id: &str) -> usize {
        let mut depth = 0;
        let mut seen = HashSet::new();
        let mut cursor = self.get(node_id);
        while let Some(node) = cursor {
            let Some(parent) = node.parent_id.as_deref() else {
                break;
            };
            if !seen.insert(node.node_id.as_str()) {
                break;
            }
            depth += 1;
            cursor = self.get(parent);
        }
        depth
    }
}

// ── Simulation ───────────────────────────────────────────────────────

/// Branch chosen at reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Winner {
    pub node_id: String,
    pub epoch_id: i64,
    pub eare_hash: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForkOutcome {
    pub detection: bool,
    pub detection_ms: Option<i64>,
    pub reconciliation_ms: Option<i64>,
    pub winner: Option<Winner>,
    pub messages_dropped: i64,
    pub errors: Vec<String>,
}

/// Per-scenario replay state. Never shared between scenarios.
struct ForkTracker<'a> {
    graph: &'a GraphIndex<'a>,
    /// Issued nodes grouped by epoch, in first-seen epoch order.
    observed: Vec<(i64, Vec<&'a ForkNode>)>,
    children: HashMap<&'a str, Vec<&'a ForkNode>>,
    fork_created: Option<i64>,
    detected_at: Option<i64>,
    merged_at: Option<i64>,
    messages_dropped: i64,
    errors: Vec<&'static str>,
}

impl<'a> ForkTracker<'a> {
    fn new(graph: &'a GraphIndex<'a>) -> Self {
        Self {
            graph,
            observed: Vec::new(),
            children: HashMap::new(),
            fork_created: None,
            detected_at: None,
            merged_at: None,
            messages_dropped: 0,
            errors: Vec::new(),
        }
    }

    fn emit(&mut self, code: &'static str) {
        if !self.errors.contains(&code) {
            self.errors.push(code);
        }
    }

    fn issue(&mut self, node: &'a ForkNode, event: &ForkEvent) {
        let graph = self.graph;
        let epoch_pos = match self.observed.iter().position(|(e, _)| *e == node.epoch_id) {
            Some(pos) => pos,
            None => {
                self.observed.push((node.epoch_id, Vec::new()));
                self.observed.len() - 1
            }
        };
        let same_epoch = &mut self.observed[epoch_pos].1;
        let mut fork = !same_epoch.is_empty()
            && !same_epoch.iter().any(|n| n.eare_hash == node.eare_hash);
        same_epoch.push(node);

        let siblings = self
            .children
            .entry(node.parent_id.as_deref().unwrap_or(""))
            .or_default();
        if node.parent_id.is_some()
            && !siblings.is_empty()
            && !siblings
                .iter()
                .any(|s| s.epoch_id == node.epoch_id && s.eare_hash == node.eare_hash)
        {
            fork = true;
        }
        siblings.push(node);

        if fork {
            self.fork_created.get_or_insert(event.t);
            if self.detected_at.is_none() {
                let at = event.t + event.validation_delay_ms();
                debug!(node = %node.node_id, epoch = node.epoch_id, at, "epoch fork detected");
                self.detected_at = Some(at);
                self.emit(EPOCH_FORK_DETECTED);
            }
        }

        if let (Some(prev), Some(parent)) = (
            node.previous_epoch_hash.as_deref(),
            node.parent_id.as_deref().and_then(|p| graph.get(p)),
        ) {
            if parent.eare_hash != prev {
                self.emit(HASH_CHAIN_BREAK);
            }
        }
    }

    fn winner(&self) -> Option<Winner> {
        let key = |n: &ForkNode| {
            (
                self.graph.depth(&n.node_id),
                n.epoch_id,
                Reverse(n.timestamp_ms),
                n.eare_hash.clone(),
            )
        };
        let mut best: Option<(&ForkNode, _)> = None;
        for node in self.observed.iter().flat_map(|(_, nodes)| nodes.iter().copied()) {
            let k = key(node);
            if best.as_ref().map_or(true, |(_, bk)| k > *bk) {
                best = Some((node, k));
            }
        }
        best.map(|(n, _)| Winner {
            node_id: n.node_id.clone(),
            epoch_id: n.epoch_id,
            eare_hash: n.eare_hash.clone(),
        })
    }

    fn finish(self, reference: &str) -> ForkOutcome {
        let reference_at = if reference == FORK_OBSERVABLE {
            self.detected_at
        } else {
            self.fork_created.or(self.detected_at)
        };
        let detection_ms = self
            .detected_at
            .zip(reference_at)
            .map(|(at, from)| (at - from).max(0));
        let reconciliation_ms = self
            .detected_at
            .zip(self.merged_at)
            .map(|(at, merged)| (merged - at).max(0));
        ForkOutcome {
            detection: self.detected_at.is_some(),
            detection_ms,
            reconciliation_ms,
            winner: self.winner(),
            messages_dropped: self.messages_dropped,
            errors: self.errors.iter().map(|e| (*e).to_owned()).collect(),
        }
    }
}

/// Replay a scenario's events over its graph.
///
/// # Errors
/// `OracleError::Corpus` for graph integrity problems or an
/// `epoch_issue` event naming no node.
pub fn simulate(scenario: &ForkScenario) -> Result<ForkOutcome, OracleError> {
    let graph = GraphIndex::build(scenario)?;
    let mut events: Vec<&ForkEvent> = scenario.event_stream.iter().collect();
    events.sort_by_key(|e| e.t);

    let mut tracker = ForkTracker::new(&graph);
    for event in events {
        match event.event.as_str() {
            "epoch_issue" => {
                if event.drops_eare() {
                    continue;
                }
                let node = event
                    .node_id
                    .as_deref()
                    .and_then(|id| graph.get(id))
                    .ok_or_else(|| {
                        OracleError::Corpus(format!(
                            "{}: epoch_issue at t={} names unknown node {}",
                            scenario.scenario_id,
                            event.t,
                            event.node_id.as_deref().unwrap_or("<none>")
                        ))
                    })?;
                tracker.issue(node, event);
            }
            "replay_attempt" => tracker.messages_dropped += event.count.unwrap_or(0),
            "merge" => {
                tracker.merged_at.get_or_insert(event.t);
            }
            _ => {}
        }
    }
    Ok(tracker.finish(&scenario.expectations.detection_reference))
}

// ── Expectations ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkFailure {
    DetectionMismatch,
    MissingDetectionMs,
    DetectionSla,
    UnexpectedDetectionMs,
    WinningHashMismatch,
    WinningEpochMismatch,
    MissingReconciliation,
    ReconciliationSla,
    ReplayGapMessages,
    MissingErrorCategories,
}

impl ForkFailure {
    pub fn as_str(self) -> &'static str {
        match self {
            ForkFailure::DetectionMismatch => "detection_mismatch",
            ForkFailure::MissingDetectionMs => "missing_detection_ms",
            ForkFailure::DetectionSla => "detection_sla",
            ForkFailure::UnexpectedDetectionMs => "unexpected_detection_ms",
            ForkFailure::WinningHashMismatch => "winning_hash_mismatch",
            ForkFailure::WinningEpochMismatch => "winning_epoch_mismatch",
            ForkFailure::MissingReconciliation => "missing_reconciliation",
            ForkFailure::ReconciliationSla => "reconciliation_sla",
            ForkFailure::ReplayGapMessages => "replay_gap_messages",
            ForkFailure::MissingErrorCategories => "missing_error_categories",
        }
    }
}

impl fmt::Display for ForkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn evaluate(exp: &ForkExpectations, out: &ForkOutcome) -> Vec<ForkFailure> {
    let mut failures = Vec::new();
    if out.detection != exp.detected {
        failures.push(ForkFailure::DetectionMismatch);
    }
    if exp.detected {
        match out.detection_ms {
            None => failures.push(ForkFailure::MissingDetectionMs),
            Some(ms) if exp.max_detection_ms > 0 && ms > exp.max_detection_ms => {
                failures.push(ForkFailure::DetectionSla)
            }
            Some(_) => {}
        }
    } else if out.detection_ms.is_some_and(|ms| ms != 0) {
        failures.push(ForkFailure::UnexpectedDetectionMs);
    }

    if let Some(winner) = &out.winner {
        let want = &exp.reconciled_epoch;
        if !want.eare_hash.is_empty() && want.eare_hash != winner.eare_hash {
            failures.push(ForkFailure::WinningHashMismatch);
        }
        if want.epoch_id != 0 && want.epoch_id != winner.epoch_id {
            failures.push(ForkFailure::WinningEpochMismatch);
        }
    }

    if exp.healing_required {
        match out.reconciliation_ms {
            None => failures.push(ForkFailure::MissingReconciliation),
            Some(ms) if exp.max_reconciliation_ms > 0 && ms > exp.max_reconciliation_ms => {
                failures.push(ForkFailure::ReconciliationSla)
            }
            Some(_) => {}
        }
    }

    let max_messages = exp.allow_replay_gap.max_messages;
    if max_messages > 0 && out.messages_dropped > max_messages {
        failures.push(ForkFailure::ReplayGapMessages);
    }
    if exp
        .expected_error_categories
        .iter()
        .any(|c| !out.errors.contains(c))
    {
        failures.push(ForkFailure::MissingErrorCategories);
    }
    failures
}

/// Simulate and evaluate a single scenario.
///
/// # Errors
/// Graph integrity problems, see [`simulate`].
pub fn run_scenario(scenario: &ForkScenario) -> Result<ScenarioReport, OracleError> {
    let outcome = simulate(scenario)?;
    let mut report = ScenarioReport::new(scenario.scenario_id.as_str());
    for failure in evaluate(&scenario.expectations, &outcome) {
        report.fail(failure.as_str());
    }
    for category in &scenario.expectations.expected_error_categories {
        if !outcome.errors.contains(category) {
            report.notes.push(format!("expected error {category} not observed"));
        }
    }
    report.set_metric("detection", outcome.detection);
    report.set_metric("detection_ms", outcome.detection_ms);
    report.set_metric("reconciliation_ms", outcome.reconciliation_ms);
    report.set_metric("messages_dropped", outcome.messages_dropped);
    if let Some(winner) = &outcome.winner {
        report.set_metric("winning_node_id", winner.node_id.as_str());
        report.set_metric("winning_epoch_id", winner.epoch_id);
        report.set_metric("winning_hash", winner.eare_hash.as_str());
    }
    report.errors = outcome.errors;
    Ok(report)
}

pub fn run_corpus(corpus: &EpochForkCorpus) -> Result<Summary, OracleError> {
    let mut summary = Summary::new("rust", "epoch_fork");
    for scenario in &corpus.0 {
        summary.record(run_scenario(scenario)?)?;
    }
    tracing::info!(passed = summary.passed, failed = summary.failed, "epoch fork corpus");
    Ok(summary)
}
