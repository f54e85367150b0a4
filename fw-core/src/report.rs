//! Scenario results and the per-run summary.
//!
//! A `ScenarioReport` is produced once per scenario and never revised
//! after it is recorded. `Summary` is the caller-owned accumulator that
//! the binary persists as `results/<language>_<suite>_summary.json`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::OracleError;

/// Scenario verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pass,
    Fail,
}

/// One scenario's verdict with its diagnostics.
///
/// `failures` explain why the verdict is `fail`; `errors` are the
/// detector's observed error codes, which a passing scenario may well
/// carry (a tamper that was expected and detected).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub scenario_id: String,
    pub status: Status,
    #[serde(default)]
    pub failures: Vec<String>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub metrics: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl ScenarioReport {
    /// A passing report with no diagnostics.
    pub fn new(scenario_id: impl Into<String>) -> Self {
        Self {
            scenario_id: scenario_id.into(),
            status: Status::Pass,
            failures: Vec::new(),
            errors: Vec::new(),
            metrics: BTreeMap::new(),
            notes: Vec::new(),
        }
    }

    /// Record a failure; any failure flips the verdict.
    pub fn fail(&mut self, failure: impl Into<String>) {
        self.failures.push(failure.into());
        self.status = Status::Fail;
    }

    /// Record a failure only when `ok` is false.
    pub fn check(&mut self, ok: bool, failure: impl FnOnce() -> String) {
        if !ok {
            self.fail(failure());
        }
    }

    pub fn set_metric(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        self.metrics.insert(key.to_owned(), value.into());
    }

    pub fn passed(&self) -> bool {
        self.status == Status::Pass
    }
}

/// Per-run accumulator keyed by scenario id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub language: String,
    pub suite: String,
    #[serde(alias = "total")]
    pub scenario_count: usize,
    pub passed: usize,
    pub failed: usize,
    pub scenarios: Vec<ScenarioReport>,
}

impl Summary {
    pub fn new(language: impl Into<String>, suite: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            suite: suite.into(),
            scenario_count: 0,
            passed: 0,
            failed: 0,
            scenarios: Vec::new(),
        }
    }

    /// Append a scenario result.
    ///
    /// # Errors
    /// Returns `OracleError::Corpus` if a report with the same scenario id
    /// was already recorded. Results are write-once.
    pub fn record(&mut self, report: ScenarioReport) -> Result<(), OracleError> {
        if self.get(&report.scenario_id).is_some() {
            return Err(OracleError::Corpus(format!(
                "duplicate scenario id: {}",
                report.scenario_id
            )));
        }
        match report.status {
            Status::Pass => self.passed += 1,
            Status::Fail => self.failed += 1,
        }
        self.scenario_count += 1;
        self.scenarios.push(report);
        Ok(())
    }

    pub fn get(&self, scenario_id: &str) -> Option<&ScenarioReport> {
        self.scenarios.iter().find(|r| r.scenario_id == scenario_id)
    }

    /// True when every recorded scenario passed. An empty summary is
    /// not a pass.
    pub fn all_passed(&self) -> bool {
        self.scenario_count > 0 && self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fail_flips_status() {
        let mut r = ScenarioReport::new("s1");
        assert!(r.passed());
        r.check(true, || "unused".into());
        assert!(r.passed());
        r.fail("detection_mismatch");
        assert_eq!(r.status, Status::Fail);
        assert_eq!(r.failures, vec!["detection_mismatch"]);
    }

    #[test]
    fn summary_counts_and_rejects_duplicates() {
        let mut s = Summary::new("rust", "eare");
        s.record(ScenarioReport::new("a")).unwrap();
        let mut b = ScenarioReport::new("b");
        b.fail("x");
        s.record(b).unwrap();
        assert_eq!((s.scenario_count, s.passed, s.failed), (2, 1, 1));
        assert!(!s.all_passed());

        let err = s.record(ScenarioReport::new("a")).unwrap_err();
        assert!(matches!(err, OracleError::Corpus(_)));
        assert_eq!(s.scenario_count, 2);
    }

    #[test]
    fn empty_summary_is_not_a_pass() {
        assert!(!Summary::new("rust", "replay").all_passed());
    }

    #[test]
    fn status_serializes_lowercase() {
        let mut r = ScenarioReport::new("x");
        r.set_metric("chain_length", 3);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["status"], "pass");
        assert_eq!(json["metrics"]["chain_length"], 3);
    }

    #[test]
    fn summary_accepts_total_alias() {
        let s: Summary = serde_json::from_str(
            r#"{"language":"go","suite":"eare","total":0,"passed":0,"failed":0,"scenarios":[]}"#,
        )
        .unwrap();
        assert_eq!(s.language, "go");
    }
}
