//! Replay and poisoning corpus runner.
//!
//! One corpus, seven independent sections. Every case becomes a scenario
//! named `<family>::<case>`:
//!
//! | Section                    | Scenario prefix    | Check                                   |
//! |----------------------------|--------------------|-----------------------------------------|
//! | `replay_attack_detection`  | `replay_attack::`  | replay window over the sequence         |
//! | `replay_window_boundaries` | `replay_window::`  | replay window over the sequence         |
//! | `poisoning_injection`      | `poisoning::`      | some `expected_x` differs from `actual_x` |
//! | `epoch_fork_detection`     | `epoch_fork::`     | some parent has two or more children    |
//! | `malformed_eare`           | `eare::`           | required fields and minimum hash length |
//! | `anti_poisoning_rules`     | `anti_poisoning::` | drift, sender binding, missing AAD      |
//! | `replay_storm_simulation`  | `replay_storm::`   | closed-form drop ratio, tolerance 0.1   |

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::constants::DEFAULT_MIN_HASH_BYTES;
use crate::corpus::Corpus;
use crate::encoding;
use crate::errors::OracleError;
use crate::replay::{detect_replay, StormModel};
use crate::report::{ScenarioReport, Summary};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplayPoisoningCorpus {
    #[serde(default)]
    pub replay_attack_detection: ReplayCases,
    #[serde(default)]
    pub replay_window_boundaries: ReplayCases,
    #[serde(default)]
    pub poisoning_injection: PoisoningSection,
    #[serde(default)]
    pub epoch_fork_detection: EpochForkSection,
    #[serde(default)]
    pub malformed_eare: MalformedEareSection,
    #[serde(default)]
    pub anti_poisoning_rules: AntiPoisoningSection,
    #[serde(default)]
    pub replay_storm_simulation: ReplayStormSection,
}

impl Corpus for ReplayPoisoningCorpus {
    fn scenario_count(&self) -> usize {
        self.replay_attack_detection.test_cases.len()
            + self.replay_window_boundaries.test_cases.len()
            + self.poisoning_injection.attack_vectors.len()
            + self.epoch_fork_detection.scenarios.len()
            + self.malformed_eare.records.len()
            + self.anti_poisoning_rules.rules.len()
            + self.replay_storm_simulation.profiles.len()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplayCases {
    #[serde(default)]
    pub window_size: i64,
    #[serde(default)]
    pub test_cases: Vec<ReplayCase>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplayCase {
    pub case: String,
    pub sequence_numbers: Vec<i64>,
    pub expected_detection: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PoisoningSection {
    #[serde(default)]
    pub attack_vectors: Vec<AttackVector>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttackVector {
    pub attack_name: String,
    pub malicious_fields: Vec<Map<String, Value>>,
    #[serde(default)]
    pub expected_defense: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EpochForkSection {
    #[serde(default)]
    pub scenarios: Vec<ForkScenario>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForkScenario {
    pub scenario: String,
    pub expected_fork_detected: bool,
    pub timeline: Vec<TimelineEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimelineEntry {
    pub epoch_id: String,
    #[serde(default)]
    pub parent: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MalformedEareSection {
    #[serde(default)]
    pub records: Vec<MalformedRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MalformedRecord {
    pub record_id: String,
    pub fields: Map<String, Value>,
    #[serde(default)]
    pub required_fields: Vec<String>,
    #[serde(default)]
    pub hash_bytes: Option<i64>,
    #[serde(default)]
    pub min_hash_bytes: Option<i64>,
    pub expected_valid: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AntiPoisoningSection {
    #[serde(default)]
    pub rules: Vec<AntiPoisoningRule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AntiPoisoningRule {
    pub rule_id: String,
    pub conditions: RuleConditions,
    pub sample_message: Map<String, Value>,
    pub expected_enforced: bool,
}

/// Rule switches as they appear in the corpus. At most one applies;
/// see [`RuleConditions::condition`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleConditions {
    #[serde(default)]
    pub max_drift: Option<f64>,
    #[serde(default)]
    pub require_binding: bool,
    #[serde(default)]
    pub allow_missing_aad: bool,
}

/// The single condition a rule enforces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Condition {
    /// `nonce_counter - last_nonce_counter <= limit`
    MaxDrift(f64),
    /// `sender_id == aad_sender`
    RequireBinding,
    /// `aad` absent or null
    AllowMissingAad,
}

impl RuleConditions {
    /// Precedence: `max_drift`, then `require_binding`, then
    /// `allow_missing_aad`.
    pub fn condition(&self) -> Option<Condition> {
        if let Some(limit) = self.max_drift {
            Some(Condition::MaxDrift(limit))
        } else if self.require_binding {
            Some(Condition::RequireBinding)
        } else if self.allow_missing_aad {
            Some(Condition::AllowMissingAad)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplayStormSection {
    #[serde(default)]
    pub window_size: i64,
    #[serde(default)]
    pub capacity_per_ms: f64,
    #[serde(default)]
    pub profiles: Vec<ClosedFormProfile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClosedFormProfile {
    pub profile_id: String,
    pub burst_rate: f64,
    pub duration_ms: f64,
    pub expected_drop_ratio: f64,
}

// ── Checks ───────────────────────────────────────────────────────────

/// Count `expected_<x>` / `actual_<x>` pairs that disagree.
pub fn poisoning_violations(attack: &AttackVector) -> usize {
    attack
        .malicious_fields
        .iter()
        .map(|fields| {
            fields
                .iter()
                .filter_map(|(key, expected)| {
                    let suffix = key.strip_prefix("expected_")?;
                    fields.get(&format!("actual_{suffix}")).map(|actual| actual != expected)
                })
                .filter(|&differs| differs)
                .count()
        })
        .sum()
}

/// A fork exists when any parent epoch has more than one child.
pub fn detect_fork(timeline: &[TimelineEntry]) -> bool {
    let mut children: HashMap<&str, usize> = HashMap::new();
    for parent in timeline.iter().filter_map(|e| e.parent.as_deref()) {
        *children.entry(parent).or_default() += 1;
    }
    children.values().any(|&n| n > 1)
}

/// Hash length: explicit `hash_bytes` if non-zero, else the decoded
/// length of the hex `hash` field. Undecodable hex counts as 0 bytes.
pub fn record_hash_bytes(record: &MalformedRecord) -> i64 {
    match record.hash_bytes {
        Some(n) if n != 0 => n,
        _ => match record.fields.get("hash") {
            Some(Value::String(hex)) => encoding::from_hex(hex).map_or(0, |b| b.len() as i64),
            _ => 0,
        },
    }
}

pub fn missing_fields(record: &MalformedRecord) -> Vec<&str> {
    record
        .required_fields
        .iter()
        .filter(|f| !record.fields.contains_key(f.as_str()))
        .map(String::as_str)
        .collect()
}

pub fn record_valid(record: &MalformedRecord) -> bool {
    let min = record.min_hash_bytes.unwrap_or(DEFAULT_MIN_HASH_BYTES);
    missing_fields(record).is_empty() && record_hash_bytes(record) >= min
}

fn int_field(sample: &Map<String, Value>, key: &str) -> i64 {
    match sample.get(key) {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
        Some(Value::Bool(b)) => i64::from(*b),
        _ => 0,
    }
}

/// Whether the sample message satisfies the rule's condition. A rule
/// with no recognized condition is trivially enforced.
pub fn rule_enforced(rule: &AntiPoisoningRule) -> bool {
    let sample = &rule.sample_message;
    match rule.conditions.condition() {
        Some(Condition::MaxDrift(limit)) => {
            let drift = int_field(sample, "nonce_counter")
                .saturating_sub(int_field(sample, "last_nonce_counter"));
            drift as f64 <= limit
        }
        Some(Condition::RequireBinding) => sample.get("sender_id") == sample.get("aad_sender"),
        Some(Condition::AllowMissingAad) => sample.get("aad").map_or(true, Value::is_null),
        None => true,
    }
}

// ── Runner ───────────────────────────────────────────────────────────

fn push_notes(report: &mut ScenarioReport, notes: Option<&str>) {
    if let Some(n) = notes.filter(|n| !n.is_empty()) {
        report.notes.push(n.to_owned());
    }
}

fn replay_reports(prefix: &str, cases: &ReplayCases) -> Vec<ScenarioReport> {
    cases
        .test_cases
        .iter()
        .map(|case| {
            let detected = detect_replay(&case.sequence_numbers, cases.window_size);
            let mut report = ScenarioReport::new(format!("{prefix}::{}", case.case));
            report.set_metric("window", cases.window_size);
            report.set_metric("detected", detected);
            report.set_metric("expected", case.expected_detection);
            report.check(detected == case.expected_detection, || {
                format!("detected={detected}, expected={}", case.expected_detection)
            });
            push_notes(&mut report, case.notes.as_deref());
            report
        })
        .collect()
}

/// Evaluate every section in corpus order.
pub fn run_corpus(corpus: &ReplayPoisoningCorpus) -> Result<Summary, OracleError> {
    let mut reports = replay_reports("replay_attack", &corpus.replay_attack_detection);
    reports.extend(replay_reports("replay_window", &corpus.replay_window_boundaries));

    for attack in &corpus.poisoning_injection.attack_vectors {
        let violations = poisoning_violations(attack);
        let mut report = ScenarioReport::new(format!("poisoning::{}", attack.attack_name));
        report.set_metric("violations", violations);
        report.check(violations > 0, || "injected values went undetected".into());
        if !attack.expected_defense.is_empty() {
            report.notes.push(format!("expected_defense={}", attack.expected_defense));
        }
        reports.push(report);
    }

    for scenario in &corpus.epoch_fork_detection.scenarios {
        let detected = detect_fork(&scenario.timeline);
        let mut report = ScenarioReport::new(format!("epoch_fork::{}", scenario.scenario));
        report.set_metric("fork_detected", detected);
        report.set_metric("timeline_length", scenario.timeline.len());
        report.check(detected == scenario.expected_fork_detected, || {
            format!("fork_detected={detected}, expected={}", scenario.expected_fork_detected)
        });
        reports.push(report);
    }

    for record in &corpus.malformed_eare.records {
        let valid = record_valid(record);
        let mut report = ScenarioReport::new(format!("eare::{}", record.record_id));
        report.set_metric("hash_bytes", record_hash_bytes(record));
        report.set_metric(
            "min_hash_bytes",
            record.min_hash_bytes.unwrap_or(DEFAULT_MIN_HASH_BYTES),
        );
        report.errors = missing_fields(record)
            .into_iter()
            .map(|f| format!("missing field {f}"))
            .collect();
        report.check(valid == record.expected_valid, || {
            format!("valid={valid}, expected={}", record.expected_valid)
        });
        reports.push(report);
    }

    for rule in &corpus.anti_poisoning_rules.rules {
        let enforced = rule_enforced(rule);
        let mut report = ScenarioReport::new(format!("anti_poisoning::{}", rule.rule_id));
        report.set_metric("enforced", enforced);
        report.check(enforced == rule.expected_enforced, || {
            format!("enforced={enforced}, expected={}", rule.expected_enforced)
        });
        if rule.conditions.condition().is_none() {
            report.notes.push("no recognized condition".into());
        }
        reports.push(report);
    }

    let storm = &corpus.replay_storm_simulation;
    let model = StormModel::new(storm.window_size, storm.capacity_per_ms);
    for profile in &storm.profiles {
        let outcome = model.evaluate(profile.burst_rate, profile.duration_ms);
        let mut report = ScenarioReport::new(format!("replay_storm::{}", profile.profile_id));
        report.set_metric("drop_ratio", outcome.drop_ratio);
        report.set_metric("expected_drop_ratio", profile.expected_drop_ratio);
        report.set_metric("capacity", outcome.capacity);
        report.check(
            model.matches(profile.burst_rate, profile.duration_ms, profile.expected_drop_ratio),
            || format!("drop_ratio {:.2}, expected {:.2}", outcome.drop_ratio, profile.expected_drop_ratio),
        );
        reports.push(report);
    }

    let mut summary = Summary::new("rust", "replay_poisoning");
    for report in reports {
        summary.record(report)?;
    }
    tracing::info!(passed = summary.passed, failed = summary.failed, "replay and poisoning corpus");
    Ok(summary)
}
