//! Cross-implementation diff harness.
//!
//! Each target runs in its own tokio task under a wall-clock timeout;
//! outcomes come back through the `JoinSet` to a single aggregator the
//! caller owns. A hung or missing runtime marks only its own language
//! failed.
//!
//! ## Classification
//! ```text
//! marker in stdout+stderr   exit 0      -> success
//! marker                    exit != 0   -> success, exit recorded in errors
//! no marker                 any exit    -> failure ("no success marker")
//! spawn error / timeout                 -> failure with diagnostic
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::task::{self, JoinSet};
use tracing::{info, warn};

use crate::config::LanguageTarget;

/// Result of running one language's oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageOutcome {
    pub language: String,
    pub success: bool,
    pub output: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl LanguageOutcome {
    fn failed(language: &str, diagnostic: String) -> Self {
        Self {
            language: language.to_owned(),
            success: false,
            output: String::new(),
            errors: vec![diagnostic],
        }
    }
}

/// Classify captured output. `exit_code` is `None` when the process was
/// killed by a signal.
pub fn classify(
    language: &str,
    markers: &[String],
    exit_code: Option<i32>,
    output: String,
) -> LanguageOutcome {
    let success = markers.iter().any(|m| output.contains(m.as_str()));
    let mut errors = Vec::new();
    if !success {
        errors.push("no success marker".to_owned());
    }
    match exit_code {
        Some(0) => {}
        Some(code) => errors.push(format!("exit status {code}")),
        None => errors.push("terminated by signal".to_owned()),
    }
    let trimmed = output.trim();
    if !success && !trimmed.is_empty() {
        errors.push(trimmed.to_owned());
    }
    LanguageOutcome {
        language: language.to_owned(),
        success,
        output,
        errors,
    }
}

/// Run one target to completion or timeout. Never fails.
pub async fn run_target(target: &LanguageTarget, timeout: Duration) -> LanguageOutcome {
    let mut cmd = Command::new(&target.program);
    cmd.args(&target.args).kill_on_drop(true);
    if let Some(dir) = &target.working_dir {
        cmd.current_dir(dir);
    }

    info!(language = %target.language, program = %target.program, "running oracle");
    match tokio::time::timeout(timeout, cmd.output()).await {
        Err(_) => {
            warn!(language = %target.language, ?timeout, "oracle timed out");
            LanguageOutcome::failed(
                &target.language,
                format!("timed out after {} ms", timeout.as_millis()),
            )
        }
        Ok(Err(e)) => {
            warn!(language = %target.language, error = %e, "oracle failed to start");
            LanguageOutcome::failed(
                &target.language,
                format!("failed to spawn {}: {e}", target.program),
            )
        }
        Ok(Ok(out)) => {
            let mut combined = String::from_utf8_lossy(&out.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&out.stderr));
            classify(&target.language, &target.success_markers, out.status.code(), combined)
        }
    }
}

/// Per-language outcomes with pass counts, persisted as
/// `{total, passed, failed, results}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffAggregate {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub results: BTreeMap<String, LanguageOutcome>,
}

impl DiffAggregate {
    /// Record an outcome. A repeated language replaces the earlier one.
    pub fn record(&mut self, outcome: LanguageOutcome) {
        self.results.insert(outcome.language.clone(), outcome);
        self.total = self.results.len();
        self.passed = self.results.values().filter(|o| o.success).count();
        self.failed = self.total - self.passed;
    }

    pub fn all_passed(&self) -> bool {
        self.total > 0 && self.failed == 0
    }

    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}

/// Run every target concurrently and aggregate the outcomes.
pub async fn run_all(targets: Vec<LanguageTarget>, timeout: Duration) -> DiffAggregate {
    let mut tasks = JoinSet::new();
    let mut languages = HashMap::new();
    for target in targets {
        let language = target.language.clone();
        let handle = tasks.spawn(async move { run_target(&target, timeout).await });
        languages.insert(handle.id(), language);
    }

    let aggregate = collect(tasks, languages).await;
    info!(
        total = aggregate.total,
        passed = aggregate.passed,
        failed = aggregate.failed,
        "diff harness complete"
    );
    aggregate
}

/// Drain `tasks` into an aggregate. A task that panicked or was
/// cancelled is recorded as a failure for the language it was running.
async fn collect(
    mut tasks: JoinSet<LanguageOutcome>,
    mut languages: HashMap<task::Id, String>,
) -> DiffAggregate {
    let mut aggregate = DiffAggregate::default();
    while let Some(joined) = tasks.join_next_with_id().await {
        match joined {
            Ok((id, outcome)) => {
                languages.remove(&id);
                aggregate.record(outcome);
            }
            Err(e) => {
                let language = languages
                    .remove(&e.id())
                    .unwrap_or_else(|| format!("task-{}", e.id()));
                warn!(%language, error = %e, "oracle task aborted");
                aggregate.record(LanguageOutcome::failed(
                    &language,
                    format!("oracle task failed: {e}"),
                ));
            }
        }
    }
    aggregate
}
