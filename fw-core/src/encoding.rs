//! Encoding utilities: base64 and hex.
//!
//! Corpora carry binary fields as base64 text. Generators in different
//! languages disagree on alphabet and padding, so decoding accepts the
//! standard alphabet first and then falls back to URL-safe and unpadded
//! forms. Encoding always emits standard padded base64.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;

use crate::errors::OracleError;

/// Encode bytes to standard base64 (RFC 4648, with padding).
pub fn to_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decode base64, accepting standard, URL-safe and unpadded variants.
///
/// # Errors
/// Returns `OracleError::Decode` if no variant accepts the input. The
/// message carries the standard-alphabet error, which is the one
/// corpus authors expect to see.
pub fn from_base64(encoded: &str) -> Result<Vec<u8>, OracleError> {
    let primary = match STANDARD.decode(encoded) {
        Ok(bytes) => return Ok(bytes),
        Err(e) => e,
    };
    [URL_SAFE, STANDARD_NO_PAD, URL_SAFE_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(encoded).ok())
        .ok_or_else(|| OracleError::Decode(format!("invalid base64: {primary}")))
}

/// Encode bytes to lowercase hex string.
pub fn to_hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}

/// Decode a hex string (either case) to bytes.
///
/// # Errors
/// Returns `OracleError::Decode` on odd length or non-hex characters.
pub fn from_hex(encoded: &str) -> Result<Vec<u8>, OracleError> {
    if !encoded.is_ascii() {
        return Err(OracleError::Decode("non-ascii hex string".into()));
    }
    if encoded.len() % 2 != 0 {
        return Err(OracleError::Decode("odd-length hex string".into()));
    }
    (0..encoded.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&encoded[i..i + 2], 16)
                .map_err(|e| OracleError::Decode(format!("invalid hex at offset {i}: {e}")))
        })
        .collect()
}

/// Decode hex into a fixed-size array.
///
/// # Errors
/// Returns `OracleError::Decode` on invalid hex or a length other than `N`.
pub fn from_hex_array<const N: usize>(encoded: &str) -> Result<[u8; N], OracleError> {
    let bytes = from_hex(encoded)?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| OracleError::Decode(format!("expected {N} bytes, got {len}")))
}
