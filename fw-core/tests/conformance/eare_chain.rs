//! Conformance: EARE Hash Chain
//!
//! Linkage is checked in `epoch_id` order. Corruptions act on a cloned
//! view, never on the corpus. Detection latency is modeled as zero.

use fw_core::eare::{self, EareCorpus, EareScenario, Failure};

fn corpus() -> EareCorpus {
    fw_core::corpus::load(&crate::vectors_dir().join("corrupted_eare.json")).unwrap()
}

fn scenario(id: &str) -> EareScenario {
    corpus()
        .0
        .into_iter()
        .find(|s| s.scenario_id == id)
        .unwrap_or_else(|| panic!("scenario {id} missing"))
}

#[test]
fn conformance_corrupted_eare_corpus() {
    let summary = eare::run_corpus(&corpus()).unwrap();
    assert!(summary.all_passed(), "{:#?}", summary.scenarios);
    assert_eq!(summary.suite, "corrupted_eare");
}

/// Three linked nodes: no breaks. Flip one predecessor hash: exactly one.
#[test]
fn conformance_single_break_is_counted_once() {
    let clean = scenario("clean_chain");
    let result = eare::simulate(&clean);
    assert_eq!(result.metrics.hash_chain_breaks, 0);
    assert_eq!(result.metrics.rejected_nodes, 0);
    assert_eq!(result.detection_ms, None);

    let mut broken = clean.clone();
    broken.nodes[1].previous_epoch_hash = "00".repeat(32);
    let result = eare::simulate(&broken);
    assert_eq!(result.metrics.chain_length, 3);
    assert_eq!(result.metrics.hash_chain_breaks, 1);
    assert_eq!(result.metrics.rejected_nodes, 1);
    assert_eq!(result.errors, vec!["HASH_CHAIN_BREAK"]);
    assert_eq!(result.detection_ms, Some(0));
}

/// A break the scenario does not tolerate fails on policy, not detection.
#[test]
fn conformance_break_policy_failures() {
    let mut s = scenario("hash_chain_break");
    s.expectations.allow_partial_accept = false;
    s.expectations.residual_divergence_allowed = false;
    let failures = eare::evaluate(&s.expectations, &eare::simulate(&s));
    assert_eq!(
        failures,
        vec![Failure::PartialAcceptNotAllowed, Failure::ResidualDivergence]
    );
}

/// Simulation leaves the scenario untouched.
#[test]
fn conformance_corruption_does_not_mutate_corpus() {
    let s = scenario("payload_tampered");
    let before = s.clone();
    let result = eare::simulate(&s);
    assert!(result.detection);
    assert_eq!(s, before);
}

/// Error codes are de-duplicated in first-occurrence order.
#[test]
fn conformance_error_codes_dedupe() {
    let result = eare::simulate(&scenario("stale_epoch_ref_all_nodes"));
    assert_eq!(result.errors, vec!["STALE_EPOCH_REF"]);
    assert_eq!(result.metrics.corruptions_applied, 1);
}

/// Failure codes are the stable strings other oracles emit.
#[test]
fn conformance_failure_codes_stable() {
    let codes: Vec<_> = [
        Failure::DetectionMismatch,
        Failure::MissingDetectionMs,
        Failure::DetectionSla,
        Failure::UnexpectedDetectionMs,
        Failure::MissingExpectedErrors,
        Failure::PartialAcceptNotAllowed,
        Failure::ResidualDivergence,
    ]
    .iter()
    .map(|f| f.as_str())
    .collect();
    assert_eq!(
        codes,
        vec![
            "detection_mismatch",
            "missing_detection_ms",
            "detection_sla",
            "unexpected_detection_ms",
            "missing_expected_errors",
            "partial_accept_not_allowed",
            "residual_divergence",
        ]
    );
}
