//! Verdict agreement across persisted per-language summaries.
//!
//! Summaries are grouped by suite. Within a suite, a scenario diverges
//! when some language lacks it, or when two languages disagree on its
//! status or on its set of error codes.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use anyhow::Context;
use fw_core::report::{Status, Summary};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Divergence {
    pub suite: String,
    pub scenario_id: String,
    pub detail: String,
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}: {}", self.suite, self.scenario_id, self.detail)
    }
}

type Verdict = (Status, BTreeSet<String>);

fn describe(verdicts: &BTreeMap<&str, &Verdict>) -> String {
    verdicts
        .iter()
        .map(|(lang, (status, errors))| {
            let errors: Vec<_> = errors.iter().map(String::as_str).collect();
            format!("{lang}={status:?}[{}]", errors.join(","))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Every divergence, ordered by suite then scenario id.
pub fn compare_summaries(summaries: &[Summary]) -> Vec<Divergence> {
    // suite -> languages present, and suite -> scenario -> language -> verdict
    let mut languages: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut verdicts: BTreeMap<&str, BTreeMap<&str, BTreeMap<&str, Verdict>>> = BTreeMap::new();
    for summary in summaries {
        languages
            .entry(summary.suite.as_str())
            .or_default()
            .insert(summary.language.as_str());
        let by_scenario = verdicts.entry(summary.suite.as_str()).or_default();
        for report in &summary.scenarios {
            by_scenario
                .entry(report.scenario_id.as_str())
                .or_default()
                .insert(
                    summary.language.as_str(),
                    (report.status, report.errors.iter().cloned().collect()),
                );
        }
    }

    let mut divergences = Vec::new();
    for (suite, by_scenario) in &verdicts {
        let expected = &languages[suite];
        for (scenario_id, by_language) in by_scenario {
            let missing: Vec<_> = expected
                .iter()
                .filter(|l| !by_language.contains_key(*l))
                .copied()
                .collect();
            let detail = if !missing.is_empty() {
                format!("missing from {}", missing.join(", "))
            } else {
                let distinct: BTreeSet<&Verdict> = by_language.values().collect();
                if distinct.len() < 2 {
                    continue;
                }
                describe(&by_language.iter().map(|(l, v)| (*l, v)).collect())
            };
            divergences.push(Divergence {
                suite: (*suite).to_owned(),
                scenario_id: (*scenario_id).to_owned(),
                detail,
            });
        }
    }
    divergences
}

pub fn load_summary(path: &Path) -> anyhow::Result<Summary> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fw_core::report::ScenarioReport;

    fn summary(language: &str, reports: Vec<ScenarioReport>) -> Summary {
        let mut s = Summary::new(language, "corrupted_eare");
        for r in reports {
            s.record(r).unwrap();
        }
        s
    }

    fn report(id: &str, errors: &[&str], pass: bool) -> ScenarioReport {
        let mut r = ScenarioReport::new(id);
        r.errors = errors.iter().map(|e| (*e).to_owned()).collect();
        if !pass {
            r.fail("detection_mismatch");
        }
        r
    }

    #[test]
    fn agreeing_summaries_have_no_divergence() {
        let a = summary("rust", vec![report("s1", &["HASH_CHAIN_BREAK"], true)]);
        let b = summary("go", vec![report("s1", &["HASH_CHAIN_BREAK"], true)]);
        assert!(compare_summaries(&[a, b]).is_empty());
    }

    #[test]
    fn error_order_does_not_matter() {
        let a = summary("rust", vec![report("s1", &["INVALID_POP", "EXTRA_FIELDS"], true)]);
        let b = summary("go", vec![report("s1", &["EXTRA_FIELDS", "INVALID_POP"], true)]);
        assert!(compare_summaries(&[a, b]).is_empty());
    }

    #[test]
    fn status_and_error_differences_diverge() {
        let a = summary(
            "rust",
            vec![report("s1", &["HASH_CHAIN_BREAK"], true), report("s2", &[], true)],
        );
        let b = summary(
            "python",
            vec![report("s1", &[], true), report("s2", &[], false)],
        );
        let d = compare_summaries(&[a, b]);
        let ids: Vec<_> = d.iter().map(|d| d.scenario_id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2"]);
        assert_eq!(d[1].detail, "python=Fail[] rust=Pass[]");
    }

    #[test]
    fn missing_scenario_diverges() {
        let a = summary("rust", vec![report("s1", &[], true), report("s2", &[], true)]);
        let b = summary("go", vec![report("s1", &[], true)]);
        let d = compare_summaries(&[a, b]);
        assert_eq!(d.len(), 1);
        assert_eq!(d[0].to_string(), "corrupted_eare::s2: missing from go");
    }
}
