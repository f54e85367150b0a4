//! Conformance: Queued Storm Profiles

use fw_core::storm::{self, QueueSimulator, StormProfileSet};

fn profiles() -> StormProfileSet {
    fw_core::corpus::load(&crate::vectors_dir().join("replay_storm_profiles.json")).unwrap()
}

#[test]
fn conformance_storm_profiles_corpus() {
    let summary = storm::run_profiles(&profiles()).unwrap();
    assert!(summary.all_passed(), "{:#?}", summary.scenarios);
    assert_eq!(summary.scenario_count, 3);
}

/// The queue saturates in the first millisecond and drops 150/ms after.
#[test]
fn conformance_sustained_flood_drop_ratio() {
    let set = profiles();
    let flood = set
        .profiles
        .iter()
        .find(|p| p.profile_id == "sustained_flood")
        .unwrap();
    let metrics = QueueSimulator::from_set(&set).simulate(flood);
    assert!((metrics.drop_ratio - 0.74).abs() < 1e-12);
    assert_eq!(metrics.max_queue_depth, 100.0);
    assert!(metrics.alert_triggered);
}
