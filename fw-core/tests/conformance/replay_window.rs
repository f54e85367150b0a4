//! Conformance: Replay Window and Poisoning Corpus
//!
//! Only an exact repeat inside the window is a replay. The storm model
//! is a closed-form contract with ±0.1 tolerance.

use fw_core::poisoning::{self, ReplayPoisoningCorpus};
use fw_core::replay::{detect_replay, ReplayWindow, StormModel};

fn corpus() -> ReplayPoisoningCorpus {
    fw_core::corpus::load(&crate::vectors_dir().join("replay_poisoning.json")).unwrap()
}

/// Every section of the replay/poisoning corpus reaches its verdict.
#[test]
fn conformance_replay_poisoning_corpus() {
    let corpus = corpus();
    let summary = poisoning::run_corpus(&corpus).unwrap();
    assert!(summary.all_passed(), "{:#?}", summary.scenarios);
    assert_eq!(summary.scenario_count, 19);
    assert!(summary.get("replay_window::edge_inclusive").is_some());
    assert!(summary.get("replay_storm::burst_1000_10ms").is_some());
}

/// Eviction happens before the membership check.
#[test]
fn conformance_evict_then_check_then_insert() {
    // 7 evicts 1 (1 < 7 - 5) before 1 arrives again.
    assert!(!detect_replay(&[1, 7, 1], 5));
    // 6 keeps 1 (1 == 6 - 5).
    assert!(detect_replay(&[1, 6, 1], 5));
}

/// A replayed value is still inserted, so the window keeps advancing.
#[test]
fn conformance_replayed_value_is_retained() {
    let mut window = ReplayWindow::new(5);
    assert!(!window.observe(3));
    assert!(window.observe(3));
    assert_eq!(window.retained(), 1);
    assert!(window.observe(3));
}

/// Reference storm profile: 1000/ms for 10 ms against 50/ms + 64.
#[test]
fn conformance_storm_reference_profile() {
    let model = StormModel::new(64, 50.0);
    let outcome = model.evaluate(1000.0, 10.0);
    assert!((outcome.drop_ratio - 0.9436).abs() < 1e-9);
    assert!(model.matches(1000.0, 10.0, 0.944));
    assert!(!model.matches(1000.0, 10.0, 0.80));
}
