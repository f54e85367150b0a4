//! Corpus loading.
//!
//! Corpora are parsed once, at the boundary, into the typed structures
//! each module defines. Every failure here is run-fatal and surfaces as
//! `OracleError::Corpus`.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::errors::OracleError;

/// A typed corpus that knows how many scenarios it holds.
pub trait Corpus: DeserializeOwned {
    fn scenario_count(&self) -> usize;
}

/// Read and parse a corpus file.
///
/// # Errors
/// `OracleError::Corpus` if the file is missing, empty, unparsable, or
/// parses to zero scenarios.
pub fn load<C: Corpus>(path: &Path) -> Result<C, OracleError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| OracleError::Corpus(format!("{}: {e}", path.display())))?;
    let corpus = parse::<C>(&text)
        .map_err(|e| OracleError::Corpus(format!("{}: {}", path.display(), detail(e))))?;
    tracing::info!(
        path = %path.display(),
        scenarios = corpus.scenario_count(),
        "loaded corpus"
    );
    Ok(corpus)
}

/// Parse corpus text already in memory.
///
/// # Errors
/// Same conditions as [`load`], minus the file access.
pub fn parse<C: Corpus>(text: &str) -> Result<C, OracleError> {
    if text.trim().is_empty() {
        return Err(OracleError::Corpus("corpus is empty".into()));
    }
    let corpus: C = serde_json::from_str(text)
        .map_err(|e| OracleError::Corpus(format!("unparsable corpus: {e}")))?;
    if corpus.scenario_count() == 0 {
        return Err(OracleError::Corpus("corpus contains no scenarios".into()));
    }
    Ok(corpus)
}

fn detail(err: OracleError) -> String {
    match err {
        OracleError::Corpus(msg) => msg,
        other => other.to_string(),
    }
}
