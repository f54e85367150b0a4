//! Labeled key derivation: HKDF-SHA256 and the protocol's derivations.
//!
//! ## Derivations
//! ```text
//! handshake_secret = HKDF(ikm = x25519_ss || pq_ss, salt = none, "FoxWhisper-Handshake-Root", 32)
//! session_keys     = HKDF(ikm = handshake_secret, salt = session_id, "FoxWhisper-SessionKeys", 76)
//!                    -> encKey[0..32] || authKey[32..64] || nonce[64..76]
//! session_id       = HKDF(ikm = handshake_hash, salt = none, "FoxWhisper-SessionId", 32)
//! message_key      = HKDF(ikm = chain_key, salt = none, "FoxWhisper-Message", 32)
//! next_chain_key   = HKDF(ikm = chain_key, salt = none, "FoxWhisper-Chain", 32)
//! media_epoch_key  = HKDF(ikm = media_secret, salt = u64be(epoch_id), "FW-MediaEpochKey", 32)
//! frame_key        = HKDF(ikm = epoch_key, salt = u64be(frame_sequence), "FW-FrameKey", 32)
//! media_iv         = SHA-256(call_id || participant_id || stream_id || u64be(frame_sequence))[0..12]
//! ```
//!
//! Derived secrets are returned in `Zeroizing` buffers and only ever
//! logged as fingerprints.

use hkdf::Hkdf;
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::client_auth;
use crate::constants::*;
use crate::corpus::Corpus;
use crate::encoding::{from_hex, from_hex_array, to_hex};
use crate::errors::OracleError;
use crate::hash::{fingerprint, sha256_concat};
use crate::report::{ScenarioReport, Summary};

/// HKDF-SHA256 expand limit: 255 blocks of 32 bytes.
pub const MAX_OUTPUT_LENGTH: usize = 255 * 32;

/// Extract-then-expand derivation.
///
/// `salt = None` and `salt = Some(&[])` are equivalent (HKDF pads the
/// salt to the hash length with zeros).
///
/// # Errors
/// `OracleError::Derivation` if `length` is outside `1..=8160`.
pub fn derive(
    ikm: &[u8],
    salt: Option<&[u8]>,
    label: &[u8],
    length: usize,
) -> Result<Zeroizing<Vec<u8>>, OracleError> {
    if length == 0 || length > MAX_OUTPUT_LENGTH {
        return Err(OracleError::Derivation(format!(
            "output length {length} outside 1..={MAX_OUTPUT_LENGTH}"
        )));
    }
    let hk = Hkdf::<Sha256>::new(salt, ikm);
    let mut okm = Zeroizing::new(vec![0u8; length]);
    hk.expand(label, &mut okm)
        .map_err(|e| OracleError::Derivation(format!("hkdf expand failed: {e}")))?;
    debug!(
        label = %String::from_utf8_lossy(label),
        length,
        ikm = %fingerprint(ikm),
        okm = %fingerprint(&okm),
        "derived key"
    );
    Ok(okm)
}

fn derive_array<const N: usize>(
    ikm: &[u8],
    salt: Option<&[u8]>,
    label: &str,
) -> Result<Zeroizing<[u8; N]>, OracleError> {
    let okm = derive(ikm, salt, label.as_bytes(), N)?;
    let mut out = Zeroizing::new([0u8; N]);
    out.copy_from_slice(&okm);
    Ok(out)
}

/// X25519 shared secret from a local private scalar and a peer public key.
///
/// # Errors
/// `OracleError::Derivation` if the peer key is a low-order point and
/// the exchange is non-contributory (all-zero output).
pub fn x25519_shared_secret(
    private_key: &[u8; 32],
    peer_public_key: &[u8; X25519_PUBLIC_KEY_LENGTH],
) -> Result<Zeroizing<[u8; 32]>, OracleError> {
    let secret = StaticSecret::from(*private_key);
    let shared = secret.diffie_hellman(&PublicKey::from(*peer_public_key));
    if !shared.was_contributory() {
        return Err(OracleError::Derivation(
            "non-contributory x25519 exchange".into(),
        ));
    }
    Ok(Zeroizing::new(shared.to_bytes()))
}

/// Public key for an X25519 private scalar.
pub fn x25519_public_key(private_key: &[u8; 32]) -> [u8; X25519_PUBLIC_KEY_LENGTH] {
    PublicKey::from(&StaticSecret::from(*private_key)).to_bytes()
}

/// Hybrid handshake secret from the classical and post-quantum shares.
///
/// # Errors
/// `OracleError::Derivation` if either share is not 32 bytes.
pub fn handshake_secret(
    classical: &[u8],
    post_quantum: &[u8],
) -> Result<Zeroizing<[u8; HANDSHAKE_SECRET_LENGTH]>, OracleError> {
    for (name, share) in [("classical", classical), ("post-quantum", post_quantum)] {
        if share.len() != 32 {
            return Err(OracleError::Derivation(format!(
                "{name} shared secret must be 32 bytes, got {}",
                share.len()
            )));
        }
    }
    let mut ikm = Zeroizing::new(Vec::with_capacity(64));
    ikm.extend_from_slice(classical);
    ikm.extend_from_slice(post_quantum);
    derive_array(&ikm, None, LABEL_HANDSHAKE_ROOT)
}

/// Per-session AEAD key block. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKeys {
    pub enc_key: [u8; AEAD_KEY_LENGTH],
    pub auth_key: [u8; 32],
    pub nonce: [u8; AEAD_NONCE_LENGTH],
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("enc_key", &fingerprint(&self.enc_key))
            .field("auth_key", &fingerprint(&self.auth_key))
            .field("nonce", &to_hex(&self.nonce))
            .finish()
    }
}

impl SessionKeys {
    /// Split a 76-byte key block.
    ///
    /// # Errors
    /// `OracleError::Derivation` if `block` is not exactly 76 bytes.
    pub fn from_block(block: &[u8]) -> Result<Self, OracleError> {
        if block.len() != SESSION_KEYS_LENGTH {
            return Err(OracleError::Derivation(format!(
                "session key block must be {SESSION_KEYS_LENGTH} bytes, got {}",
                block.len()
            )));
        }
        let mut keys = SessionKeys {
            enc_key: [0u8; AEAD_KEY_LENGTH],
            auth_key: [0u8; 32],
            nonce: [0u8; AEAD_NONCE_LENGTH],
        };
        keys.enc_key.copy_from_slice(&block[..32]);
        keys.auth_key.copy_from_slice(&block[32..64]);
        keys.nonce.copy_from_slice(&block[64..]);
        Ok(keys)
    }
}

/// Session key block bound to `session_id`.
pub fn session_keys(handshake_secret: &[u8], session_id: &[u8]) -> Result<SessionKeys, OracleError> {
    let block = derive(
        handshake_secret,
        Some(session_id),
        LABEL_SESSION_KEYS.as_bytes(),
        SESSION_KEYS_LENGTH,
    )?;
    SessionKeys::from_block(&block)
}

/// Session identifier from the handshake hash. Not secret.
pub fn session_id(handshake_hash: &[u8]) -> Result<[u8; ID_LENGTH], OracleError> {
    let okm = derive_array::<ID_LENGTH>(handshake_hash, None, LABEL_SESSION_ID)?;
    Ok(*okm)
}

/// One symmetric ratchet step: `(message_key, next_chain_key)`.
pub fn ratchet_step(
    chain_key: &[u8],
) -> Result<(Zeroizing<[u8; 32]>, Zeroizing<[u8; 32]>), OracleError> {
    let message_key = derive_array(chain_key, None, LABEL_RATCHET_MESSAGE)?;
    let next_chain_key = derive_array(chain_key, None, LABEL_RATCHET_CHAIN)?;
    Ok((message_key, next_chain_key))
}

pub fn media_epoch_key(
    media_secret: &[u8],
    epoch_id: u64,
) -> Result<Zeroizing<[u8; DERIVED_KEY_LENGTH]>, OracleError> {
    derive_array(media_secret, Some(&epoch_id.to_be_bytes()), LABEL_MEDIA_EPOCH_KEY)
}

pub fn frame_key(
    epoch_key: &[u8],
    frame_sequence: u64,
) -> Result<Zeroizing<[u8; DERIVED_KEY_LENGTH]>, OracleError> {
    derive_array(epoch_key, Some(&frame_sequence.to_be_bytes()), LABEL_FRAME_KEY)
}

/// Deterministic 96-bit media IV. Not HKDF-derived.
pub fn media_iv(
    call_id: &str,
    participant_id: &str,
    stream_id: &str,
    frame_sequence: u64,
) -> [u8; MEDIA_IV_LENGTH] {
    let digest = sha256_concat(&[
        call_id.as_bytes(),
        participant_id.as_bytes(),
        stream_id.as_bytes(),
        &frame_sequence.to_be_bytes(),
    ]);
    let mut iv = [0u8; MEDIA_IV_LENGTH];
    iv.copy_from_slice(&digest[..MEDIA_IV_LENGTH]);
    iv
}

// ── Vectors ──────────────────────────────────────────────────────────

/// One derivation known-answer case, tagged by `kind`.
#[derive(Debug, Clone, Deserialize)]
pub struct KdfVector {
    pub id: String,
    #[serde(flatten)]
    pub case: KdfCase,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KdfCase {
    Derive {
        ikm_hex: String,
        #[serde(default)]
        salt_hex: Option<String>,
        label: String,
        length: usize,
        okm_hex: String,
    },
    X25519 {
        private_key_hex: String,
        peer_public_key_hex: String,
        public_key_hex: String,
        shared_secret_hex: String,
    },
    HandshakeSecret {
        classical_hex: String,
        post_quantum_hex: String,
        handshake_secret_hex: String,
    },
    SessionKeys {
        handshake_secret_hex: String,
        session_id_hex: String,
        enc_key_hex: String,
        auth_key_hex: String,
        nonce_hex: String,
    },
    SessionId {
        handshake_hash_hex: String,
        session_id_hex: String,
    },
    Ratchet {
        chain_key_hex: String,
        message_key_hex: String,
        next_chain_key_hex: String,
    },
    MediaEpochKey {
        media_secret_hex: String,
        epoch_id: u64,
        epoch_key_hex: String,
    },
    FrameKey {
        epoch_key_hex: String,
        frame_sequence: u64,
        frame_key_hex: String,
    },
    MediaIv {
        call_id: String,
        participant_id: String,
        stream_id: String,
        frame_sequence: u64,
        iv_hex: String,
    },
    ClientAuthTag {
        sfu_secret_hex: String,
        client_id: String,
        call_id: String,
        timestamp: u64,
        nonce_hex: String,
        key_hex: String,
        tag_hex: String,
    },
    /// A request the pipeline must refuse.
    InvalidLength { length: usize },
}

impl KdfCase {
    pub fn kind(&self) -> &'static str {
        match self {
            KdfCase::Derive { .. } => "derive",
            KdfCase::X25519 { .. } => "x25519",
            KdfCase::HandshakeSecret { .. } => "handshake_secret",
            KdfCase::SessionKeys { .. } => "session_keys",
            KdfCase::SessionId { .. } => "session_id",
            KdfCase::Ratchet { .. } => "ratchet",
            KdfCase::MediaEpochKey { .. } => "media_epoch_key",
            KdfCase::FrameKey { .. } => "frame_key",
            KdfCase::MediaIv { .. } => "media_iv",
            KdfCase::ClientAuthTag { .. } => "client_auth_tag",
            KdfCase::InvalidLength { .. } => "invalid_length",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct KdfVectorSet {
    #[serde(default)]
    pub description: String,
    pub vectors: Vec<KdfVector>,
}

impl Corpus for KdfVectorSet {
    fn scenario_count(&self) -> usize {
        self.vectors.len()
    }
}

/// `(output name, expected hex, actual hex)`
type Comparison = (&'static str, String, String);

fn compare(name: &'static str, expected: &str, actual: &[u8]) -> Comparison {
    (name, expected.to_ascii_lowercase(), to_hex(actual))
}

fn evaluate(case: &KdfCase) -> Result<Vec<Comparison>, OracleError> {
    let out = match case {
        KdfCase::Derive { ikm_hex, salt_hex, label, length, okm_hex } => {
            let salt = salt_hex.as_deref().map(from_hex).transpose()?;
            let okm = derive(&from_hex(ikm_hex)?, salt.as_deref(), label.as_bytes(), *length)?;
            vec![compare("okm", okm_hex, &okm)]
        }
        KdfCase::X25519 { private_key_hex, peer_public_key_hex, public_key_hex, shared_secret_hex } => {
            let private_key = Zeroizing::new(from_hex_array::<32>(private_key_hex)?);
            let peer = from_hex_array::<32>(peer_public_key_hex)?;
            let shared = x25519_shared_secret(&private_key, &peer)?;
            vec![
                compare("public_key", public_key_hex, &x25519_public_key(&private_key)),
                compare("shared_secret", shared_secret_hex, &*shared),
            ]
        }
        KdfCase::HandshakeSecret { classical_hex, post_quantum_hex, handshake_secret_hex } => {
            let secret = handshake_secret(&from_hex(classical_hex)?, &from_hex(post_quantum_hex)?)?;
            vec![compare("handshake_secret", handshake_secret_hex, &*secret)]
        }
        KdfCase::SessionKeys { handshake_secret_hex, session_id_hex, enc_key_hex, auth_key_hex, nonce_hex } => {
            let keys = session_keys(&from_hex(handshake_secret_hex)?, &from_hex(session_id_hex)?)?;
            vec![
                compare("enc_key", enc_key_hex, &keys.enc_key),
                compare("auth_key", auth_key_hex, &keys.auth_key),
                compare("nonce", nonce_hex, &keys.nonce),
            ]
        }
        KdfCase::SessionId { handshake_hash_hex, session_id_hex } => {
            vec![compare("session_id", session_id_hex, &session_id(&from_hex(handshake_hash_hex)?)?)]
        }
        KdfCase::Ratchet { chain_key_hex, message_key_hex, next_chain_key_hex } => {
            let (message_key, next_chain_key) = ratchet_step(&from_hex(chain_key_hex)?)?;
            vec![
                compare("message_key", message_key_hex, &*message_key),
                compare("next_chain_key", next_chain_key_hex, &*next_chain_key),
            ]
        }
        KdfCase::MediaEpochKey { media_secret_hex, epoch_id, epoch_key_hex } => {
            let key = media_epoch_key(&from_hex(media_secret_hex)?, *epoch_id)?;
            vec![compare("epoch_key", epoch_key_hex, &*key)]
        }
        KdfCase::FrameKey { epoch_key_hex, frame_sequence, frame_key_hex } => {
            let key = frame_key(&from_hex(epoch_key_hex)?, *frame_sequence)?;
            vec![compare("frame_key", frame_key_hex, &*key)]
        }
        KdfCase::MediaIv { call_id, participant_id, stream_id, frame_sequence, iv_hex } => {
            let iv = media_iv(call_id, participant_id, stream_id, *frame_sequence);
            vec![compare("iv", iv_hex, &iv)]
        }
        KdfCase::ClientAuthTag { sfu_secret_hex, client_id, call_id, timestamp, nonce_hex, key_hex, tag_hex } => {
            let key = client_auth::client_auth_key(&from_hex(sfu_secret_hex)?, client_id)?;
            let tag = client_auth::client_auth_tag(&*key, call_id, client_id, *timestamp, &from_hex(nonce_hex)?)?;
            vec![compare("key", key_hex, &*key), compare("tag", tag_hex, &tag)]
        }
        KdfCase::InvalidLength { length } => match derive(b"ikm", None, b"label", *length) {
            Err(OracleError::Derivation(_)) => Vec::new(),
            Err(other) => return Err(other),
            Ok(_) => vec![("rejection", "Derivation error".into(), "accepted".into())],
        },
    };
    Ok(out)
}

/// Run every derivation vector, one scenario per vector.
pub fn run_vectors(set: &KdfVectorSet) -> Result<Summary, OracleError> {
    let mut summary = Summary::new("rust", "kdf");
    for vector in &set.vectors {
        let mut report = ScenarioReport::new(vector.id.as_str());
        report.set_metric("kind", vector.case.kind());
        match evaluate(&vector.case) {
            Ok(comparisons) => {
                for (name, expected, actual) in comparisons {
                    report.check(expected == actual, || {
                        format!("{name} mismatch: expected {expected}, got {actual}")
                    });
                }
            }
            Err(e) => report.fail(e.to_string()),
        }
        summary.record(report)?;
    }
    tracing::info!(passed = summary.passed, failed = summary.failed, "kdf vectors");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 5869 test case 1.
    const RFC5869_IKM: &str = "0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b";
    const RFC5869_SALT: &str = "000102030405060708090a0b0c";
    const RFC5869_INFO: &str = "f0f1f2f3f4f5f6f7f8f9";
    const RFC5869_OKM: &str =
        "3cb25f25faacd57a90434f64d0362f2a2d2d0a90cf1a5a4c5db02d56ecc4c5bf34007208d5b887185865";

    #[test]
    fn derive_matches_rfc5869_case_1() {
        let okm = derive(
            &from_hex(RFC5869_IKM).unwrap(),
            Some(&from_hex(RFC5869_SALT).unwrap()),
            &from_hex(RFC5869_INFO).unwrap(),
            42,
        )
        .unwrap();
        assert_eq!(to_hex(&okm), RFC5869_OKM);
    }

    #[test]
    fn derive_is_deterministic() {
        let a = derive(b"ikm", Some(b"salt"), b"FoxWhisper-Message", 32).unwrap();
        let b = derive(b"ikm", Some(b"salt"), b"FoxWhisper-Message", 32).unwrap();
        assert_eq!(*a, *b);
    }

    #[test]
    fn label_change_changes_every_byte_position_set() {
        let a = derive(b"ikm", None, b"FoxWhisper-Message", 32).unwrap();
        let b = derive(b"ikm", None, b"FoxWhisper-Chain", 32).unwrap();
        assert_ne!(*a, *b);
        assert_ne!(a[..4], b[..4]);
    }

    #[test]
    fn empty_and_absent_salt_agree() {
        let a = derive(b"ikm", None, b"l", 32).unwrap();
        let b = derive(b"ikm", Some(&[]), b"l", 32).unwrap();
        assert_eq!(*a, *b);
    }

    #[test]
    fn output_length_bounds() {
        assert!(matches!(derive(b"k", None, b"l", 0), Err(OracleError::Derivation(_))));
        assert!(matches!(derive(b"k", None, b"l", MAX_OUTPUT_LENGTH + 1), Err(OracleError::Derivation(_))));
        assert_eq!(derive(b"k", None, b"l", MAX_OUTPUT_LENGTH).unwrap().len(), MAX_OUTPUT_LENGTH);
    }

    #[test]
    fn session_keys_split_76_byte_block() {
        let block = derive(&[7u8; 32], Some(&[9u8; 32]), LABEL_SESSION_KEYS.as_bytes(), 76).unwrap();
        let keys = session_keys(&[7u8; 32], &[9u8; 32]).unwrap();
        assert_eq!(keys.enc_key[..], block[..32]);
        assert_eq!(keys.auth_key[..], block[32..64]);
        assert_eq!(keys.nonce[..], block[64..]);
    }

    #[test]
    fn session_keys_debug_hides_key_bytes() {
        let keys = session_keys(&[7u8; 32], &[9u8; 32]).unwrap();
        let dbg = format!("{keys:?}");
        assert!(!dbg.contains(&to_hex(&keys.enc_key)));
        assert!(dbg.contains(&fingerprint(&keys.enc_key)));
    }

    #[test]
    fn handshake_secret_rejects_wrong_share_length() {
        assert!(handshake_secret(&[1u8; 32], &[2u8; 31]).is_err());
        assert!(handshake_secret(&[1u8; 32], &[2u8; 32]).is_ok());
    }

    #[test]
    fn handshake_secret_depends_on_both_shares() {
        let a = handshake_secret(&[1u8; 32], &[2u8; 32]).unwrap();
        let b = handshake_secret(&[1u8; 32], &[3u8; 32]).unwrap();
        assert_ne!(*a, *b);
    }

    #[test]
    fn x25519_agreement_is_symmetric() {
        let alice = [0x11u8; 32];
        let bob = [0x22u8; 32];
        let ab = x25519_shared_secret(&alice, &x25519_public_key(&bob)).unwrap();
        let ba = x25519_shared_secret(&bob, &x25519_public_key(&alice)).unwrap();
        assert_eq!(*ab, *ba);
    }

    #[test]
    fn x25519_rejects_low_order_peer() {
        assert!(x25519_shared_secret(&[0x11u8; 32], &[0u8; 32]).is_err());
    }

    #[test]
    fn ratchet_outputs_differ_and_chain() {
        let (mk0, ck1) = ratchet_step(&[5u8; 32]).unwrap();
        let (mk1, _) = ratchet_step(&*ck1).unwrap();
        assert_ne!(*mk0, *ck1);
        assert_ne!(*mk0, *mk1);
    }

    #[test]
    fn media_keys_bind_epoch_and_sequence() {
        let e1 = media_epoch_key(b"secret", 1).unwrap();
        let e2 = media_epoch_key(b"secret", 2).unwrap();
        assert_ne!(*e1, *e2);
        assert_ne!(*frame_key(&*e1, 0).unwrap(), *frame_key(&*e1, 1).unwrap());
    }

    #[test]
    fn media_iv_is_truncated_digest() {
        let iv = media_iv("call", "alice", "video", 7);
        let mut input = b"callalicevideo".to_vec();
        input.extend_from_slice(&7u64.to_be_bytes());
        assert_eq!(iv.len(), 12);
        assert_eq!(iv[..], crate::hash::sha256(&input)[..12]);
    }

    #[test]
    fn run_vectors_flags_mismatch() {
        let set: KdfVectorSet = serde_json::from_value(serde_json::json!({
            "vectors": [
                {"id": "rfc", "kind": "derive", "ikm_hex": RFC5869_IKM, "salt_hex": RFC5869_SALT,
                 "label": "x", "length": 4, "okm_hex": "00000000"},
                {"id": "too_long", "kind": "invalid_length", "length": 9000},
            ]
        }))
        .unwrap();
        let summary = run_vectors(&set).unwrap();
        assert!(!summary.get("rfc").unwrap().passed());
        assert!(summary.get("too_long").unwrap().passed());
    }
}
