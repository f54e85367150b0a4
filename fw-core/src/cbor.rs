//! Canonical CBOR codec (RFC 8949 §4.2.1 core deterministic subset).
//!
//! The encoder is authoritative: two implementations agree on a value
//! exactly when they agree on `encode(value)`. Everything that gets
//! hashed or compared across languages goes through here.
//!
//! ## Rules
//! ```text
//! header(major, n) = major<<5 | n               n < 24
//!                  = major<<5 | 24, u8(n)       n <= 0xff
//!                  = major<<5 | 25, u16be(n)    n <= 0xffff
//!                  = major<<5 | 26, u32be(n)    n <= 0xffff_ffff
//!                  = major<<5 | 27, u64be(n)
//! map entries sorted by (len(enc(key)), enc(key)) bytewise
//! ```
//!
//! The value space is deliberately small: unsigned integers, byte and
//! text strings, arrays and maps. Anything else is an encode error
//! rather than a silently lossy conversion.

use std::cmp::Ordering;

use crate::encoding::to_hex;
use crate::errors::OracleError;
use crate::hash;

const MAJOR_UNSIGNED: u8 = 0;
const MAJOR_NEGATIVE: u8 = 1;
const MAJOR_BYTES: u8 = 2;
const MAJOR_TEXT: u8 = 3;
const MAJOR_ARRAY: u8 = 4;
const MAJOR_MAP: u8 = 5;
const MAJOR_TAG: u8 = 6;

/// Nesting bound for the decoder. Corpora never come close; this only
/// stops hostile input from exhausting the stack.
const MAX_DECODE_DEPTH: usize = 64;

/// 2^64 as f64: the smallest float JSON number outside the u64 domain.
const U64_DOMAIN_END: f64 = 18_446_744_073_709_551_616.0;

/// A value in the canonical encoding domain.
///
/// Map entries keep insertion order in memory; the encoder sorts them.
/// Equality is logical: two maps are equal when they hold the same
/// entries, with the same multiplicity, in any order.
#[derive(Debug, Clone)]
pub enum CanonicalValue {
    Unsigned(u64),
    Bytes(Vec<u8>),
    Text(String),
    Array(Vec<CanonicalValue>),
    Map(Vec<(CanonicalValue, CanonicalValue)>),
}

impl PartialEq for CanonicalValue {
    fn eq(&self, other: &Self) -> bool {
        use CanonicalValue::*;
        match (self, other) {
            (Unsigned(a), Unsigned(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            (Text(a), Text(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            (Map(a), Map(b)) => {
                type Entry = (CanonicalValue, CanonicalValue);
                let count = |entries: &[Entry], entry: &Entry| {
                    entries.iter().filter(|e| *e == entry).count()
                };
                a.len() == b.len() && a.iter().all(|entry| count(a, entry) == count(b, entry))
            }
            _ => false,
        }
    }
}

impl Eq for CanonicalValue {}

impl From<u64> for CanonicalValue {
    fn from(n: u64) -> Self {
        CanonicalValue::Unsigned(n)
    }
}

impl From<&str> for CanonicalValue {
    fn from(s: &str) -> Self {
        CanonicalValue::Text(s.to_owned())
    }
}

impl From<String> for CanonicalValue {
    fn from(s: String) -> Self {
        CanonicalValue::Text(s)
    }
}

impl From<&[u8]> for CanonicalValue {
    fn from(b: &[u8]) -> Self {
        CanonicalValue::Bytes(b.to_vec())
    }
}

impl From<Vec<u8>> for CanonicalValue {
    fn from(b: Vec<u8>) -> Self {
        CanonicalValue::Bytes(b)
    }
}

/// Ordering of encoded map keys: shorter encoding first, then bytewise.
pub fn canonical_key_order(a: &[u8], b: &[u8]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn write_header(out: &mut Vec<u8>, major: u8, n: u64) {
    let m = major << 5;
    if n < 24 {
        out.push(m | n as u8);
    } else if n <= u64::from(u8::MAX) {
        out.push(m | 24);
        out.push(n as u8);
    } else if n <= u64::from(u16::MAX) {
        out.push(m | 25);
        out.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= u64::from(u32::MAX) {
        out.push(m | 26);
        out.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        out.push(m | 27);
        out.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a value into its unique canonical byte sequence.
///
/// # Errors
/// Returns `OracleError::Encode` if a map holds two keys whose canonical
/// encodings are identical.
pub fn encode(value: &CanonicalValue) -> Result<Vec<u8>, OracleError> {
    let mut out = Vec::new();
    encode_into(value, &mut out)?;
    Ok(out)
}

/// Encode `value` prefixed with a CBOR tag header (major type 6).
///
/// Used for `{tag, data}` protocol vectors, where the tag names the
/// message variant.
pub fn encode_tagged(tag: u64, value: &CanonicalValue) -> Result<Vec<u8>, OracleError> {
    let mut out = Vec::new();
    write_header(&mut out, MAJOR_TAG, tag);
    encode_into(value, &mut out)?;
    Ok(out)
}

/// SHA-256 over the canonical encoding.
pub fn digest(value: &CanonicalValue) -> Result<[u8; 32], OracleError> {
    Ok(hash::sha256(&encode(value)?))
}

fn encode_into(value: &CanonicalValue, out: &mut Vec<u8>) -> Result<(), OracleError> {
    match value {
        CanonicalValue::Unsigned(n) => write_header(out, MAJOR_UNSIGNED, *n),
        CanonicalValue::Bytes(b) => {
            write_header(out, MAJOR_BYTES, b.len() as u64);
            out.extend_from_slice(b);
        }
        CanonicalValue::Text(s) => {
            write_header(out, MAJOR_TEXT, s.len() as u64);
            out.extend_from_slice(s.as_bytes());
        }
        CanonicalValue::Array(items) => {
            write_header(out, MAJOR_ARRAY, items.len() as u64);
            for item in items {
                encode_into(item, out)?;
            }
        }
        CanonicalValue::Map(entries) => {
            let mut encoded = entries
                .iter()
                .map(|(k, v)| Ok((encode(k)?, encode(v)?)))
                .collect::<Result<Vec<_>, OracleError>>()?;
            encoded.sort_by(|(a, _), (b, _)| canonical_key_order(a, b));
            if let Some(pair) = encoded.windows(2).find(|pair| pair[0].0 == pair[1].0) {
                return Err(OracleError::Encode(format!(
                    "duplicate map key {}",
                    to_hex(&pair[0].0)
                )));
            }
            write_header(out, MAJOR_MAP, encoded.len() as u64);
            for (k, v) in encoded {
                out.extend_from_slice(&k);
                out.extend_from_slice(&v);
            }
        }
    }
    Ok(())
}

/// Convert parsed JSON into the canonical value space.
///
/// Objects become text-keyed maps, strings stay text (base64 fields are
/// hashed as their text form, exactly as the other oracles do).
///
/// # Errors
/// `OracleError::Encode` for null, booleans, negative or fractional
/// numbers ("unsupported value kind") and integers at or beyond 2^64
/// ("integer exceeds 64-bit domain").
pub fn from_json(value: &serde_json::Value) -> Result<CanonicalValue, OracleError> {
    use serde_json::Value;
    match value {
        Value::Null => Err(OracleError::Encode("unsupported value kind: null".into())),
        Value::Bool(_) => Err(OracleError::Encode("unsupported value kind: bool".into())),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                return Ok(CanonicalValue::Unsigned(u));
            }
            if n.as_i64().is_some() {
                return Err(OracleError::Encode(
                    "unsupported value kind: negative integer".into(),
                ));
            }
            match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f >= U64_DOMAIN_END => Err(OracleError::Encode(
                    format!("integer exceeds 64-bit domain: {n}"),
                )),
                Some(f) if f.fract() == 0.0 && f < 0.0 => Err(OracleError::Encode(
                    "unsupported value kind: negative integer".into(),
                )),
                _ => Err(OracleError::Encode(format!(
                    "unsupported value kind: non-integer number {n}"
                ))),
            }
        }
        Value::String(s) => Ok(CanonicalValue::Text(s.clone())),
        Value::Array(items) => items
            .iter()
            .map(from_json)
            .collect::<Result<Vec<_>, _>>()
            .map(CanonicalValue::Array),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| Ok((CanonicalValue::Text(k.clone()), from_json(v)?)))
            .collect::<Result<Vec<_>, OracleError>>()
            .map(CanonicalValue::Map),
    }
}

// ── Decoder ──────────────────────────────────────────────────────────

/// Decode one canonical value, rejecting any non-canonical form.
///
/// # Errors
/// `OracleError::Decode` on truncation, trailing bytes, non-shortest
/// headers, indefinite lengths, unsupported major types, invalid UTF-8,
/// or map keys that are unsorted or duplicated.
pub fn decode(bytes: &[u8]) -> Result<CanonicalValue, OracleError> {
    let mut reader = Reader { buf: bytes, pos: 0 };
    let value = reader.value(0)?;
    reader.finish()?;
    Ok(value)
}

/// Decode a tagged value produced by [`encode_tagged`].
pub fn decode_tagged(bytes: &[u8]) -> Result<(u64, CanonicalValue), OracleError> {
    let mut reader = Reader { buf: bytes, pos: 0 };
    let (major, tag) = reader.header()?;
    if major != MAJOR_TAG {
        return Err(OracleError::Decode(format!(
            "expected tag header, found major type {major}"
        )));
    }
    let value = reader.value(0)?;
    reader.finish()?;
    Ok((tag, value))
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], OracleError> {
        if n > self.remaining() {
            return Err(OracleError::Decode(format!(
                "truncated input at offset {}",
                self.pos
            )));
        }
        let buf = self.buf;
        let slice = &buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn finish(&self) -> Result<(), OracleError> {
        if self.remaining() != 0 {
            return Err(OracleError::Decode(format!(
                "{} trailing bytes after canonical value",
                self.remaining()
            )));
        }
        Ok(())
    }

    fn header(&mut self) -> Result<(u8, u64), OracleError> {
        let offset = self.pos;
        let initial = self.take(1)?[0];
        let major = initial >> 5;
        let info = initial & 0x1f;
        let (arg, floor) = match info {
            0..=23 => return Ok((major, u64::from(info))),
            24 => (u64::from(self.take(1)?[0]), 24),
            25 => {
                let b = self.take(2)?;
                (u64::from(u16::from_be_bytes([b[0], b[1]])), 0x100)
            }
            26 => {
                let b = self.take(4)?;
                (u64::from(u32::from_be_bytes([b[0], b[1], b[2], b[3]])), 0x1_0000)
            }
            27 => {
                let mut b = [0u8; 8];
                b.copy_from_slice(self.take(8)?);
                (u64::from_be_bytes(b), 0x1_0000_0000)
            }
            31 => {
                return Err(OracleError::Decode(format!(
                    "indefinite length at offset {offset}"
                )))
            }
            _ => {
                return Err(OracleError::Decode(format!(
                    "reserved additional info {info} at offset {offset}"
                )))
            }
        };
        if arg < floor {
            return Err(OracleError::Decode(format!(
                "non-shortest header at offset {offset}"
            )));
        }
        Ok((major, arg))
    }

    /// Convert a length argument, refusing counts the input cannot hold.
    fn count(&self, arg: u64, min_item_bytes: usize) -> Result<usize, OracleError> {
        usize::try_from(arg)
            .ok()
            .filter(|n| n.saturating_mul(min_item_bytes) <= self.remaining())
            .ok_or_else(|| {
                OracleError::Decode(format!("length {arg} exceeds input at offset {}", self.pos))
            })
    }

    fn value(&mut self, depth: usize) -> Result<CanonicalValue, OracleError> {
        if depth > MAX_DECODE_DEPTH {
            return Err(OracleError::Decode("nesting too deep".into()));
        }
        let (major, arg) = self.header()?;
        match major {
            MAJOR_UNSIGNED => Ok(CanonicalValue::Unsigned(arg)),
            MAJOR_BYTES => {
                let n = self.count(arg, 1)?;
                Ok(CanonicalValue::Bytes(self.take(n)?.to_vec()))
            }
            MAJOR_TEXT => {
                let n = self.count(arg, 1)?;
                let raw = self.take(n)?;
                std::str::from_utf8(raw)
                    .map(|s| CanonicalValue::Text(s.to_owned()))
                    .map_err(|e| OracleError::Decode(format!("invalid utf-8 text: {e}")))
            }
            MAJOR_ARRAY => {
                let n = self.count(arg, 1)?;
                let mut items = Vec::with_capacity(n);
                for _ in 0..n {
                    items.push(self.value(depth + 1)?);
                }
                Ok(CanonicalValue::Array(items))
            }
            MAJOR_MAP => {
                let n = self.count(arg, 2)?;
                let buf = self.buf;
                let mut entries = Vec::with_capacity(n);
                let mut prev_key: Option<&[u8]> = None;
                for _ in 0..n {
                    let start = self.pos;
                    let key = self.value(depth + 1)?;
                    let key_bytes = &buf[start..self.pos];
                    if let Some(prev) = prev_key {
                        if canonical_key_order(prev, key_bytes) != Ordering::Less {
                            return Err(OracleError::Decode(format!(
                                "map key out of canonical order or duplicated at offset {start}"
                            )));
                        }
                    }
                    prev_key = Some(key_bytes);
                    let value = self.value(depth + 1)?;
                    entries.push((key, value));
                }
                Ok(CanonicalValue::Map(entries))
            }
            MAJOR_NEGATIVE => Err(OracleError::Decode(
                "negative integers are outside the canonical value space".into(),
            )),
            MAJOR_TAG => Err(OracleError::Decode(
                "nested tags are outside the canonical value space".into(),
            )),
            _ => Err(OracleError::Decode(format!(
                "unsupported major type {major}"
            ))),
        }
    }
}
