//! Per-client SFU authentication tokens.
//!
//! ## Algorithm
//! ```text
//! key = HKDF(ikm = sfu_secret, salt = none, "FW-SFU-ClientAuth" || client_id, 32)
//! tag = HMAC-SHA256(key, call_id || client_id || u64be(timestamp_ms) || nonce)
//! ```
//!
//! Verification order is tag, then clock skew, then nonce freshness.
//! A nonce is consumed only by a verification that succeeds, so a forged
//! token cannot burn a legitimate client's nonce.

use std::collections::HashMap;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::constants::{DEFAULT_MAX_CLOCK_SKEW_MS, DERIVED_KEY_LENGTH, LABEL_CLIENT_AUTH_PREFIX};
use crate::errors::OracleError;
use crate::hash::fingerprint;
use crate::kdf;

/// Client-auth tag length (HMAC-SHA256 output).
pub const CLIENT_AUTH_TAG_LENGTH: usize = 32;

/// Why a token was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientAuthError {
    #[error("client auth tag mismatch")]
    BadTag,
    #[error("client auth timestamp {skew_ms} ms outside skew bound")]
    Expired { skew_ms: u64 },
    #[error("client auth nonce already used")]
    Replay,
}

impl From<ClientAuthError> for OracleError {
    fn from(e: ClientAuthError) -> Self {
        OracleError::Integrity(e.to_string())
    }
}

/// Dedicated per-client key.
pub fn client_auth_key(
    sfu_secret: &[u8],
    client_id: &str,
) -> Result<Zeroizing<[u8; DERIVED_KEY_LENGTH]>, OracleError> {
    let mut label = LABEL_CLIENT_AUTH_PREFIX.as_bytes().to_vec();
    label.extend_from_slice(client_id.as_bytes());
    let okm = kdf::derive(sfu_secret, None, &label, DERIVED_KEY_LENGTH)?;
    let mut key = Zeroizing::new([0u8; DERIVED_KEY_LENGTH]);
    key.copy_from_slice(&okm);
    Ok(key)
}

/// HMAC tag over the token fields.
///
/// # Errors
/// `OracleError::Derivation` if the MAC rejects the key (it accepts any
/// length, so this is unreachable with derived keys).
pub fn client_auth_tag(
    key: &[u8],
    call_id: &str,
    client_id: &str,
    timestamp_ms: u64,
    nonce: &[u8],
) -> Result<[u8; CLIENT_AUTH_TAG_LENGTH], OracleError> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key)
        .map_err(|e| OracleError::Derivation(format!("hmac key rejected: {e}")))?;
    mac.update(call_id.as_bytes());
    mac.update(client_id.as_bytes());
    mac.update(&timestamp_ms.to_be_bytes());
    mac.update(nonce);
    Ok(mac.finalize().into_bytes().into())
}

/// A presented authentication token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAuthToken {
    pub call_id: String,
    pub client_id: String,
    pub timestamp_ms: u64,
    pub nonce: Vec<u8>,
    pub tag: Vec<u8>,
}

impl ClientAuthToken {
    /// Issue a token the way a client would.
    pub fn sign(
        sfu_secret: &[u8],
        call_id: &str,
        client_id: &str,
        timestamp_ms: u64,
        nonce: &[u8],
    ) -> Result<Self, OracleError> {
        let key = client_auth_key(sfu_secret, client_id)?;
        let tag = client_auth_tag(&*key, call_id, client_id, timestamp_ms, nonce)?;
        Ok(Self {
            call_id: call_id.to_owned(),
            client_id: client_id.to_owned(),
            timestamp_ms,
            nonce: nonce.to_vec(),
            tag: tag.to_vec(),
        })
    }
}

/// Stateful verifier: clock-skew bound plus a single-use nonce cache
/// keyed by `(client_id, nonce)`.
pub struct ClientAuthVerifier {
    sfu_secret: Zeroizing<Vec<u8>>,
    max_skew_ms: u64,
    /// `(client_id, nonce)` -> token timestamp.
    seen: HashMap<(String, Vec<u8>), u64>,
}

impl ClientAuthVerifier {
    pub fn new(sfu_secret: &[u8], max_skew_ms: u64) -> Self {
        Self {
            sfu_secret: Zeroizing::new(sfu_secret.to_vec()),
            max_skew_ms,
            seen: HashMap::new(),
        }
    }

    pub fn with_default_skew(sfu_secret: &[u8]) -> Self {
        Self::new(sfu_secret, DEFAULT_MAX_CLOCK_SKEW_MS)
    }

    /// Number of nonces currently retained.
    pub fn cached_nonces(&self) -> usize {
        self.seen.len()
    }

    /// Verify `token` at wall-clock `now_ms`.
    ///
    /// # Errors
    /// `BadTag`, `Expired` or `Replay`, checked in that order. A key
    /// derivation failure is reported as `BadTag`: nothing was
    /// authenticated.
    pub fn verify(&mut self, token: &ClientAuthToken, now_ms: u64) -> Result<(), ClientAuthError> {
        let expected = client_auth_key(&self.sfu_secret, &token.client_id)
            .and_then(|key| {
                client_auth_tag(&*key, &token.call_id, &token.client_id, token.timestamp_ms, &token.nonce)
            })
            .map_err(|_| ClientAuthError::BadTag)?;
        if expected[..].ct_eq(token.tag.as_slice()).unwrap_u8() != 1 {
            tracing::debug!(client = %token.client_id, "client auth bad tag");
            return Err(ClientAuthError::BadTag);
        }

        let skew_ms = now_ms.abs_diff(token.timestamp_ms);
        if skew_ms > self.max_skew_ms {
            return Err(ClientAuthError::Expired { skew_ms });
        }

        self.evict(now_ms);
        let cache_key = (token.client_id.clone(), token.nonce.clone());
        if self.seen.contains_key(&cache_key) {
            tracing::debug!(client = %token.client_id, nonce = %fingerprint(&token.nonce), "client auth replay");
            return Err(ClientAuthError::Replay);
        }
        self.seen.insert(cache_key, token.timestamp_ms);
        Ok(())
    }

    /// Drop nonces whose tokens would now fail the skew check anyway.
    fn evict(&mut self, now_ms: u64) {
        let bound = self.max_skew_ms;
        self.seen.retain(|_, ts| now_ms.saturating_sub(*ts) <= bound);
    }
}
