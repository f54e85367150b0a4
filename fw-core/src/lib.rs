//! FoxWhisper Core: conformance oracle for the FoxWhisper v0.9 protocol.
//!
//! This crate is the reference oracle every language implementation is
//! measured against. Other-language oracles are external processes that
//! must reach the same verdicts on the shared corpora; they are compared
//! by the harness crate, never re-implemented here.
//!
//! # Module Map
//!
//! | Module | Concern | Corpus |
//! |--------|---------|--------|
//! | [`cbor`] | Canonical CBOR encode / strict decode | `cbor_test_vectors.json` |
//! | [`schema`] | Message field contracts | `cbor_test_vectors.json` |
//! | [`kdf`] | HKDF labels, session and media keys | `kdf_vectors.json` |
//! | [`client_auth`] | SFU client tokens | `kdf_vectors.json` |
//! | [`aead`] | AES-256-GCM with bound AAD | `aead_vectors.json` |
//! | [`replay`] | Replay window, closed-form storm model | `replay_poisoning.json` |
//! | [`poisoning`] | Replay/poisoning corpus sections | `replay_poisoning.json` |
//! | [`storm`] | Queued storm simulator | `replay_storm_profiles.json` |
//! | [`eare`] | EARE hash-chain verifier | `corrupted_eare.json` |
//! | [`handshake`] | Handshake-flow derivation check | `end_to_end_test_vectors.json` |
//! | [`epoch_fork`] | Epoch-fork detection and reconciliation | `epoch_forks.json` |
//!
//! # Results
//!
//! Every runner returns a [`report::Summary`]. Violations inside a
//! scenario become a failing report; `OracleError::Corpus` is the
//! run-fatal class.

/// Protocol constants: sizes, labels, tags, defaults.
pub mod constants;

/// Error types for fw-core operations.
pub mod errors;

/// Base64 and hex.
pub mod encoding;

/// SHA-256 and log fingerprints.
pub mod hash;

/// Canonical CBOR codec.
pub mod cbor;

/// Scenario reports and run summaries.
pub mod report;

/// Typed corpus loading.
pub mod corpus;

/// Schema validator for protocol message variants.
pub mod schema;

/// Key derivation pipeline.
pub mod kdf;

/// SFU client authentication tokens.
pub mod client_auth;

/// Session AEAD.
pub mod aead;

/// Replay window and closed-form storm model.
pub mod replay;

/// Queued replay-storm simulator.
pub mod storm;

/// Replay/poisoning corpus runner.
pub mod poisoning;

/// EARE chain verifier.
pub mod eare;

/// Handshake-flow derivation check.
pub mod handshake;

/// Epoch-fork simulator.
pub mod epoch_fork;
