//! AES-256-GCM conformance: session encrypt/decrypt with bound AAD.
//!
//! Wire format: `ciphertext || tag(16)`. The session's `encKey` and
//! `nonce` are fixed per session; this oracle does not re-derive a nonce
//! per message.
//!
//! ## Failure classes
//! - input shorter than the tag: `OracleError::Malformed` (nothing was
//!   authenticated)
//! - tag, key, nonce or AAD mismatch: `OracleError::Integrity`
//!
//! Decrypt never returns data on failure.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use serde::Deserialize;
use zeroize::Zeroizing;

use crate::cbor::{self, CanonicalValue};
use crate::constants::{AEAD_KEY_LENGTH, AEAD_NONCE_LENGTH, AEAD_TAG_LENGTH};
use crate::corpus::Corpus;
use crate::encoding::{from_hex, from_hex_array, to_hex};
use crate::errors::OracleError;
use crate::kdf::{self, SessionKeys};
use crate::report::{ScenarioReport, Summary};

/// Encrypt under an explicit key and nonce.
pub fn seal(
    key: &[u8; AEAD_KEY_LENGTH],
    nonce: &[u8; AEAD_NONCE_LENGTH],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, OracleError> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| OracleError::Integrity("invalid AES-256-GCM key length".into()))?;
    cipher
        .encrypt(Nonce::from_slice(nonce), Payload { msg: plaintext, aad })
        .map_err(|_| OracleError::Integrity("AES-256-GCM encryption failed".into()))
}

/// Decrypt under an explicit key and nonce.
///
/// # Errors
/// `Malformed` if `ciphertext` is shorter than the tag, `Integrity` on
/// authentication failure.
pub fn open(
    key: &[u8; AEAD_KEY_LENGTH],
    nonce: &[u8; AEAD_NONCE_LENGTH],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>, OracleError> {
    if ciphertext.len() < AEAD_TAG_LENGTH {
        return Err(OracleError::Malformed(format!(
            "ciphertext of {} bytes is shorter than the {AEAD_TAG_LENGTH}-byte tag",
            ciphertext.len()
        )));
    }
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| OracleError::Integrity("invalid AES-256-GCM key length".into()))?;
    cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map(Zeroizing::new)
        .map_err(|_| OracleError::Integrity("AES-256-GCM authentication failed".into()))
}

/// Encrypt with the session's key and nonce.
pub fn encrypt(plaintext: &[u8], aad: &[u8], keys: &SessionKeys) -> Result<Vec<u8>, OracleError> {
    seal(&keys.enc_key, &keys.nonce, plaintext, aad)
}

/// Decrypt with the session's key and nonce.
pub fn decrypt(
    ciphertext: &[u8],
    aad: &[u8],
    keys: &SessionKeys,
) -> Result<Zeroizing<Vec<u8>>, OracleError> {
    open(&keys.enc_key, &keys.nonce, ciphertext, aad)
}

/// Canonical AAD for a room message: `[sender_id, room_id, sequence]`.
pub fn message_aad(sender_id: &[u8], room_id: &str, sequence: u64) -> Result<Vec<u8>, OracleError> {
    cbor::encode(&CanonicalValue::Array(vec![
        CanonicalValue::from(sender_id),
        CanonicalValue::from(room_id),
        CanonicalValue::from(sequence),
    ]))
}

// ── Vectors ──────────────────────────────────────────────────────────

/// Expected failure class of a negative vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorClass {
    Integrity,
    Malformed,
}

impl ErrorClass {
    fn matches(self, err: &OracleError) -> bool {
        matches!(
            (self, err),
            (ErrorClass::Integrity, OracleError::Integrity(_))
                | (ErrorClass::Malformed, OracleError::Malformed(_))
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AeadVector {
    pub id: String,
    #[serde(flatten)]
    pub case: AeadCase,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AeadCase {
    /// Encrypt must produce `ciphertext_hex`; decrypt must invert it.
    Encrypt {
        key_hex: String,
        nonce_hex: String,
        #[serde(default)]
        aad_hex: String,
        plaintext_hex: String,
        ciphertext_hex: String,
    },
    /// Decrypt must fail with `error`.
    Reject {
        key_hex: String,
        nonce_hex: String,
        #[serde(default)]
        aad_hex: String,
        ciphertext_hex: String,
        error: ErrorClass,
    },
    /// Canonical room-message AAD.
    MessageAad {
        sender_id_hex: String,
        room_id: String,
        sequence: u64,
        aad_hex: String,
    },
    /// Full pipeline: session keys from the handshake secret, then a
    /// room message sealed under its canonical AAD.
    SessionMessage {
        handshake_secret_hex: String,
        session_id_hex: String,
        sender_id_hex: String,
        room_id: String,
        sequence: u64,
        plaintext_hex: String,
        ciphertext_hex: String,
    },
}

impl AeadCase {
    pub fn kind(&self) -> &'static str {
        match self {
            AeadCase::Encrypt { .. } => "encrypt",
            AeadCase::Reject { .. } => "reject",
            AeadCase::MessageAad { .. } => "message_aad",
            AeadCase::SessionMessage { .. } => "session_message",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AeadVectorSet {
    #[serde(default)]
    pub description: String,
    pub vectors: Vec<AeadVector>,
}

impl Corpus for AeadVectorSet {
    fn scenario_count(&self) -> usize {
        self.vectors.len()
    }
}

fn check_bytes(report: &mut ScenarioReport, what: &str, expected_hex: &str, actual: &[u8]) {
    let expected = expected_hex.to_ascii_lowercase();
    let actual = to_hex(actual);
    report.check(expected == actual, || {
        format!("{what} mismatch: expected {expected}, got {actual}")
    });
}

fn check_round_trip(
    report: &mut ScenarioReport,
    key: &[u8; AEAD_KEY_LENGTH],
    nonce: &[u8; AEAD_NONCE_LENGTH],
    plaintext_hex: &str,
    ciphertext_hex: &str,
    aad: &[u8],
) -> Result<(), OracleError> {
    let plaintext = from_hex(plaintext_hex)?;
    let sealed = seal(key, nonce, &plaintext, aad)?;
    check_bytes(report, "ciphertext", ciphertext_hex, &sealed);
    let opened = open(key, nonce, &from_hex(ciphertext_hex)?, aad)?;
    check_bytes(report, "plaintext", plaintext_hex, &opened);
    Ok(())
}

fn evaluate(case: &AeadCase, report: &mut ScenarioReport) -> Result<(), OracleError> {
    match case {
        AeadCase::Encrypt { key_hex, nonce_hex, aad_hex, plaintext_hex, ciphertext_hex } => {
            let key = Zeroizing::new(from_hex_array::<AEAD_KEY_LENGTH>(key_hex)?);
            let nonce = from_hex_array::<AEAD_NONCE_LENGTH>(nonce_hex)?;
            check_round_trip(report, &key, &nonce, plaintext_hex, ciphertext_hex, &from_hex(aad_hex)?)?;
        }
        AeadCase::Reject { key_hex, nonce_hex, aad_hex, ciphertext_hex, error } => {
            let key = Zeroizing::new(from_hex_array::<AEAD_KEY_LENGTH>(key_hex)?);
            let nonce = from_hex_array::<AEAD_NONCE_LENGTH>(nonce_hex)?;
            match open(&key, &nonce, &from_hex(ciphertext_hex)?, &from_hex(aad_hex)?) {
                Ok(_) => report.fail("decrypt returned data for a tampered input"),
                Err(e) if error.matches(&e) => report.errors.push(e.to_string()),
                Err(e) => report.fail(format!("expected {error:?} failure, got: {e}")),
            }
        }
        AeadCase::MessageAad { sender_id_hex, room_id, sequence, aad_hex } => {
            let aad = message_aad(&from_hex(sender_id_hex)?, room_id, *sequence)?;
            check_bytes(report, "aad", aad_hex, &aad);
        }
        AeadCase::SessionMessage {
            handshake_secret_hex,
            session_id_hex,
            sender_id_hex,
            room_id,
            sequence,
            plaintext_hex,
            ciphertext_hex,
        } => {
            let keys = kdf::session_keys(&from_hex(handshake_secret_hex)?, &from_hex(session_id_hex)?)?;
            let aad = message_aad(&from_hex(sender_id_hex)?, room_id, *sequence)?;
            check_round_trip(report, &keys.enc_key, &keys.nonce, plaintext_hex, ciphertext_hex, &aad)?;
        }
    }
    Ok(())
}

/// Run every AEAD vector, one scenario per vector.
pub fn run_vectors(set: &AeadVectorSet) -> Result<Summary, OracleError> {
    let mut summary = Summary::new("rust", "aead");
    for vector in &set.vectors {
        let mut report = ScenarioReport::new(vector.id.as_str());
        report.set_metric("kind", vector.case.kind());
        if let Err(e) = evaluate(&vector.case, &mut report) {
            report.fail(e.to_string());
        }
        summary.record(report)?;
    }
    tracing::info!(passed = summary.passed, failed = summary.failed, "aead vectors");
    Ok(summary)
}
