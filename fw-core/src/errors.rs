//! Error types for fw-core.
//!
//! One enum covers the oracle's error taxonomy. Per-scenario problems
//! (schema violations, detection mismatches) are collected into result
//! records and never abort a run; only `Corpus` errors are run-fatal.
//!
//! Display format is `"{Category} error: {message}"` and is asserted by
//! the conformance suite, since other-language oracles print the same
//! prefixes into their diagnostics.

/// Unified error type for all fw-core operations.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// Missing, mistyped or out-of-range message field.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Malformed base64, hex or CBOR input.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Value cannot be canonically encoded.
    #[error("Encode error: {0}")]
    Encode(String),

    /// AEAD authentication failure or hash-chain break.
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Structurally invalid input (e.g. ciphertext shorter than the tag).
    /// Distinct from `Integrity`: nothing was authenticated.
    #[error("Malformed input: {0}")]
    Malformed(String),

    /// Invalid key-derivation request.
    #[error("Derivation error: {0}")]
    Derivation(String),

    /// Oracle verdict differs from the declared expectation.
    #[error("Detection mismatch: {0}")]
    DetectionMismatch(String),

    /// Missing toolchain or subprocess failure in the diff harness.
    #[error("Environment error: {0}")]
    Environment(String),

    /// Corpus missing, empty or unparsable. Fatal to the whole run.
    #[error("Corpus error: {0}")]
    Corpus(String),
}

// ── EARE error code registry ─────────────────────────────────────────

/// Canonical EARE verifier error codes: the fixed vocabulary every
/// language's verifier emits. Order is the registry order, not the
/// order codes appear in a result.
pub const EARE_ERROR_CODES: [&str; 7] = [
    "INVALID_SIGNATURE",
    "INVALID_POP",
    "HASH_CHAIN_BREAK",
    "TRUNCATED_EARE",
    "EXTRA_FIELDS",
    "PAYLOAD_TAMPERED",
    "STALE_EPOCH_REF",
];

/// Returns `true` if `code` is one of the canonical EARE error codes.
pub fn is_valid_eare_error_code(code: &str) -> bool {
    EARE_ERROR_CODES.contains(&code)
}
