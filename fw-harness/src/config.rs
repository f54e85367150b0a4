//! Diff harness targets.
//!
//! A target is one foreign-language oracle invocation. The built-in set
//! mirrors the reference layout of the conformance repository; a JSON
//! file passed with `--targets` replaces it entirely.

use std::path::{Path, PathBuf};

use fw_core::errors::OracleError;
use serde::{Deserialize, Serialize};

/// Default per-target wall-clock bound.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// One language oracle to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageTarget {
    pub language: String,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Any of these in combined stdout+stderr marks the run successful.
    pub success_markers: Vec<String>,
}

impl LanguageTarget {
    fn new(language: &str, program: &str, args: &[&str], working_dir: &str, markers: &[&str]) -> Self {
        Self {
            language: language.to_owned(),
            program: program.to_owned(),
            args: args.iter().map(|a| (*a).to_owned()).collect(),
            working_dir: Some(PathBuf::from(working_dir)),
            success_markers: markers.iter().map(|m| (*m).to_owned()).collect(),
        }
    }
}

pub fn default_targets() -> Vec<LanguageTarget> {
    vec![
        LanguageTarget::new(
            "python",
            "python3",
            &["validate_cbor_python.py"],
            "validation/python/validators",
            &["All messages passed"],
        ),
        LanguageTarget::new(
            "node",
            "node",
            &["validate_cbor_node.js"],
            "validation/nodejs/validators",
            &["All messages passed"],
        ),
        LanguageTarget::new(
            "go",
            "go",
            &["run", "validate_cbor_go.go"],
            "validation/go/validators",
            &["All messages passed"],
        ),
        LanguageTarget::new(
            "rust",
            "cargo",
            &["run", "--quiet", "--bin", "fw-oracle", "--", "schema"],
            ".",
            &["scenarios passed"],
        ),
    ]
}

/// Read a target list from JSON.
///
/// # Errors
/// `OracleError::Environment` if the file is unreadable, unparsable or
/// lists no targets.
pub fn load_targets(path: &Path) -> Result<Vec<LanguageTarget>, OracleError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| OracleError::Environment(format!("{}: {e}", path.display())))?;
    let targets: Vec<LanguageTarget> = serde_json::from_str(&text)
        .map_err(|e| OracleError::Environment(format!("{}: {e}", path.display())))?;
    if targets.is_empty() {
        return Err(OracleError::Environment(format!(
            "{}: no targets listed",
            path.display()
        )));
    }
    Ok(targets)
}
