//! Protocol constants: field sizes, derivation labels and message tags.
//!
//! Every value here is part of the cross-implementation contract. The
//! Python, Go and Node oracles carry the same numbers.

// ── Field sizes (bytes) ──────────────────────────────────────────────

/// Client, server, device and session identifiers.
pub const ID_LENGTH: usize = 32;

/// Handshake hashes and EARE hashes.
pub const HASH_LENGTH: usize = 32;

/// X25519 public key.
pub const X25519_PUBLIC_KEY_LENGTH: usize = 32;

/// Post-quantum (Kyber-1024) public key.
pub const KYBER_PUBLIC_KEY_LENGTH: usize = 1568;

/// Post-quantum (Kyber-1024) ciphertext.
pub const KYBER_CIPHERTEXT_LENGTH: usize = 1568;

/// Protocol-level nonce carried in handshake messages.
pub const PROTOCOL_NONCE_LENGTH: usize = 16;

/// AEAD authentication tag.
pub const AEAD_TAG_LENGTH: usize = 16;

/// AEAD encryption key.
pub const AEAD_KEY_LENGTH: usize = 32;

/// AEAD nonce (AES-GCM 96-bit).
pub const AEAD_NONCE_LENGTH: usize = 12;

/// Deterministic media IV (SHA-256 truncated to 96 bits).
pub const MEDIA_IV_LENGTH: usize = 12;

/// Handshake root secret.
pub const HANDSHAKE_SECRET_LENGTH: usize = 32;

/// Session key block: encKey(32) || authKey(32) || nonce(12).
pub const SESSION_KEYS_LENGTH: usize = AEAD_KEY_LENGTH + 32 + AEAD_NONCE_LENGTH;

/// Ratchet message/chain keys, media keys, client-auth keys.
pub const DERIVED_KEY_LENGTH: usize = 32;

// ── Derivation labels ────────────────────────────────────────────────

pub const LABEL_HANDSHAKE_ROOT: &str = "FoxWhisper-Handshake-Root";
pub const LABEL_SESSION_KEYS: &str = "FoxWhisper-SessionKeys";
pub const LABEL_SESSION_ID: &str = "FoxWhisper-SessionId";
pub const LABEL_RATCHET_MESSAGE: &str = "FoxWhisper-Message";
pub const LABEL_RATCHET_CHAIN: &str = "FoxWhisper-Chain";
pub const LABEL_MEDIA_EPOCH_KEY: &str = "FW-MediaEpochKey";
pub const LABEL_FRAME_KEY: &str = "FW-FrameKey";
/// Prefix only; the client id is appended to form the full label.
pub const LABEL_CLIENT_AUTH_PREFIX: &str = "FW-SFU-ClientAuth";

// ── Message tags ─────────────────────────────────────────────────────

pub const TAG_HANDSHAKE_INIT: u64 = 0xD1;
pub const TAG_HANDSHAKE_RESPONSE: u64 = 0xD2;
pub const TAG_HANDSHAKE_COMPLETE: u64 = 0xD3;
pub const TAG_DR_BACKUP: u64 = 0xD4;
pub const TAG_DR_RESTORE: u64 = 0xD5;
pub const TAG_DR_RESET: u64 = 0xD6;
pub const TAG_JOIN: u64 = 0xE0;
pub const TAG_LEAVE: u64 = 0xE1;
pub const TAG_DATA: u64 = 0xE2;

// ── Detector and verifier defaults ───────────────────────────────────

/// Absolute tolerance for the closed-form replay-storm drop ratio.
pub const DEFAULT_STORM_TOLERANCE: f64 = 0.1;

/// Default tolerance for queued storm profiles when a set omits one.
pub const DEFAULT_PROFILE_TOLERANCE: f64 = 0.05;

/// Queued storm simulator: queue limit defaults to window * this factor.
pub const DEFAULT_QUEUE_LIMIT_FACTOR: f64 = 8.0;

/// Client-auth clock skew bound (milliseconds, either direction).
pub const DEFAULT_MAX_CLOCK_SKEW_MS: u64 = 30_000;

/// Minimum EARE hash length accepted by the malformed-record check.
pub const DEFAULT_MIN_HASH_BYTES: i64 = 32;

/// Wildcard corruption target: applies to every node.
pub const WILDCARD_TARGET: &str = "*";
