//! Conformance: Epoch-Fork Detection and Reconciliation

use fw_core::epoch_fork::{self, EpochForkCorpus, EPOCH_FORK_DETECTED};
use fw_core::errors::OracleError;

fn corpus() -> EpochForkCorpus {
    fw_core::corpus::load(&crate::vectors_dir().join("epoch_forks.json")).unwrap()
}

fn scenario(id: &str) -> fw_core::epoch_fork::ForkScenario {
    corpus().0.into_iter().find(|s| s.scenario_id == id).unwrap()
}

#[test]
fn conformance_epoch_fork_corpus() {
    let summary = epoch_fork::run_corpus(&corpus()).unwrap();
    assert!(summary.all_passed(), "{:#?}", summary.scenarios);
    assert_eq!(summary.scenario_count, 6);
}

/// Delayed validation is measured from the instant the fork was created.
#[test]
fn conformance_fork_detection_latency_and_healing() {
    let out = epoch_fork::simulate(&scenario("concurrent_controllers_fork")).unwrap();
    assert_eq!(out.detection_ms, Some(40));
    assert_eq!(out.reconciliation_ms, Some(155));
    assert_eq!(out.messages_dropped, 3);
    assert_eq!(out.winner.unwrap().node_id, "a2");
    assert_eq!(out.errors, vec![EPOCH_FORK_DETECTED]);
}

#[test]
fn conformance_retransmitted_epoch_is_not_a_fork() {
    let out = epoch_fork::simulate(&scenario("reissue_same_hash_not_fork")).unwrap();
    assert!(!out.detection);
    assert!(out.errors.is_empty());
}

/// A scenario whose expectations disagree with the replay fails; the run
/// continues.
#[test]
fn conformance_wrong_winner_fails_scenario_not_run() {
    let mut s = scenario("timestamp_tiebreak");
    s.expectations.reconciled_epoch.eare_hash = "00".repeat(32);
    let report = epoch_fork::run_scenario(&s).unwrap();
    assert!(!report.passed());
    assert_eq!(report.failures, vec!["winning_hash_mismatch"]);
}

#[test]
fn conformance_event_for_unknown_node_is_fatal() {
    let mut s = scenario("linear_no_fork");
    s.event_stream[1].node_id = Some("missing".into());
    assert!(matches!(epoch_fork::simulate(&s), Err(OracleError::Corpus(_))));
}
