//! Hashing utilities: SHA-256 and log-safe fingerprints.
//!
//! Key material never appears in logs. Anything that needs to identify
//! a secret in a log line uses [`fingerprint`], which reveals only a
//! prefix of its SHA-256 digest.

use sha2::{Digest, Sha256};

use crate::encoding;

/// Compute SHA-256 of arbitrary data.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Compute SHA-256 over the concatenation of `parts` without
/// materializing the concatenated buffer.
pub fn sha256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Log-safe identifier for secret bytes: first 8 digest bytes, hex.
pub fn fingerprint(secret: &[u8]) -> String {
    encoding::to_hex(&sha256(secret)[..8])
}
