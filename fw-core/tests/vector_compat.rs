//! Vector compatibility gate.
//!
//! Loads every shared corpus into its typed structure and checks
//! structure, field presence and counts. The other language oracles read
//! the same files; this keeps the Rust side anchored to them.
//!
//! Verdicts are asserted by the conformance suite. This is a plumbing
//! gate only.

use std::path::PathBuf;

use fw_core::aead::AeadVectorSet;
use fw_core::corpus::{self, Corpus};
use fw_core::eare::EareCorpus;
use fw_core::epoch_fork::EpochForkCorpus;
use fw_core::errors::OracleError;
use fw_core::handshake::HandshakeFlowDoc;
use fw_core::kdf::KdfVectorSet;
use fw_core::poisoning::ReplayPoisoningCorpus;
use fw_core::schema::{MessageType, VectorSet};
use fw_core::storm::StormProfileSet;

// ── helpers ─────────────────────────────────────────────────────────

fn vectors_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("vectors")
}

fn load<C: Corpus>(name: &str) -> C {
    let path = vectors_dir().join(name);
    corpus::load(&path).unwrap_or_else(|e| panic!("failed to load {}: {e}", path.display()))
}

// ── tests ───────────────────────────────────────────────────────────

#[test]
fn schema_vectors_cover_every_message_type() {
    let set: VectorSet = load("cbor_test_vectors.json");
    for message_type in MessageType::ALL {
        let covered = set.0.values().any(|v| {
            v.expect_valid && v.data["type"] == message_type.name() && v.tag == message_type.tag()
        });
        assert!(covered, "no positive vector for {}", message_type.name());
    }
    for (name, vector) in &set.0 {
        if !vector.expect_valid {
            assert!(name.starts_with("invalid_"), "negative vector {name} misnamed");
        }
    }
}

#[test]
fn kdf_vectors_parse() {
    let set: KdfVectorSet = load("kdf_vectors.json");
    assert!(!set.description.is_empty());
    assert_eq!(set.vectors.len(), 13);
    let kinds: std::collections::BTreeSet<_> = set.vectors.iter().map(|v| v.case.kind()).collect();
    assert_eq!(kinds.len(), 11, "every derivation kind is exercised");
}

#[test]
fn aead_vectors_parse() {
    let set: AeadVectorSet = load("aead_vectors.json");
    assert_eq!(set.vectors.len(), 7);
    let ids: Vec<_> = set.vectors.iter().map(|v| v.id.as_str()).collect();
    assert!(ids.contains(&"session-message"));
    assert!(ids.contains(&"reject-short"));
}

#[test]
fn corrupted_eare_corpus_parses() {
    let corpus: EareCorpus = load("corrupted_eare.json");
    assert_eq!(corpus.scenario_count(), 7);
    for scenario in &corpus.0 {
        assert!(!scenario.nodes.is_empty(), "{} has no nodes", scenario.scenario_id);
        assert!(!scenario.group_context.group_id.is_empty());
        for node in &scenario.nodes {
            assert_eq!(node.eare_hash.len(), 64, "{} hash is not 32 bytes hex", node.node_id);
        }
        for code in &scenario.expectations.expected_errors {
            assert!(
                fw_core::errors::is_valid_eare_error_code(code),
                "{} expects unregistered code {code}",
                scenario.scenario_id
            );
        }
    }
}

#[test]
fn replay_poisoning_corpus_has_every_section() {
    let corpus: ReplayPoisoningCorpus = load("replay_poisoning.json");
    assert!(!corpus.replay_attack_detection.test_cases.is_empty());
    assert!(!corpus.replay_window_boundaries.test_cases.is_empty());
    assert!(!corpus.poisoning_injection.attack_vectors.is_empty());
    assert!(!corpus.epoch_fork_detection.scenarios.is_empty());
    assert!(!corpus.malformed_eare.records.is_empty());
    assert!(!corpus.anti_poisoning_rules.rules.is_empty());
    assert!(!corpus.replay_storm_simulation.profiles.is_empty());
    assert_eq!(corpus.replay_storm_simulation.window_size, 64);
}

#[test]
fn storm_profiles_parse() {
    let set: StormProfileSet = load("replay_storm_profiles.json");
    assert_eq!(set.queue_limit, Some(100.0));
    assert_eq!(set.profiles.len(), 3);
}

#[test]
fn handshake_flow_parses() {
    let doc: HandshakeFlowDoc = load("end_to_end_test_vectors.json");
    assert_eq!(doc.handshake_flow.steps.len(), 3);
    let steps: Vec<_> = doc.handshake_flow.steps.iter().filter_map(|s| s.step).collect();
    assert_eq!(steps, vec![1, 2, 3]);
}

#[test]
fn epoch_fork_corpus_parses() {
    let corpus: EpochForkCorpus = load("epoch_forks.json");
    assert_eq!(corpus.scenario_count(), 6);
    for scenario in &corpus.0 {
        assert!(!scenario.graph.nodes.is_empty(), "{} has no nodes", scenario.scenario_id);
        for node in &scenario.graph.nodes {
            assert_eq!(node.eare_hash.len(), 64, "{} hash is not 32 bytes hex", node.node_id);
        }
    }
}

#[test]
fn empty_and_unparsable_corpora_are_fatal() {
    assert!(matches!(corpus::parse::<EareCorpus>(""), Err(OracleError::Corpus(_))));
    assert!(matches!(corpus::parse::<EareCorpus>("[]"), Err(OracleError::Corpus(_))));
    assert!(matches!(corpus::parse::<EareCorpus>("{"), Err(OracleError::Corpus(_))));
}
