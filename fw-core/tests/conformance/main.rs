//! Conformance Harness: Oracle Invariant Tests
//!
//! Enforces the oracle's cross-language invariants against the shared
//! corpora in `vectors/`. Every language oracle must reach the same
//! verdicts on these files; the Rust oracle is checked here directly.
//!
//! Invariant coverage:
//! - Canonical encoding determinism and strict decode
//! - Schema field contracts (null vs missing vs mistyped)
//! - Key derivation labels, lengths and media IV
//! - AEAD associated-data binding and error classes
//! - Replay window eviction and the closed-form storm model
//! - EARE hash-chain linkage and corruption taxonomy
//! - Queued storm profiles
//! - Handshake-flow derivation
//! - Epoch-fork detection and reconciliation
//! - Error display stability

mod aead_binding;
mod canonical_ordering;
mod eare_chain;
mod epoch_forks;
mod error_taxonomy;
mod handshake_flow;
mod key_derivation;
mod replay_window;
mod schema_contracts;
mod storm_profiles;

use std::path::PathBuf;

/// Workspace `vectors/` directory.
pub fn vectors_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("vectors")
}
