//! Conformance: Canonical Encoding
//!
//! Encoding is a pure function of logical content. Map insertion order
//! never reaches the wire, keys sort by encoded length then bytes, and
//! the strict decoder refuses every non-canonical form.

use fw_core::cbor::{self, CanonicalValue};
use fw_core::errors::OracleError;
use fw_core::schema::VectorSet;

fn text_map(entries: &[(&str, u64)]) -> CanonicalValue {
    CanonicalValue::Map(
        entries
            .iter()
            .map(|(k, v)| (CanonicalValue::from(*k), CanonicalValue::from(*v)))
            .collect(),
    )
}

/// Reordering map entries MUST NOT change the encoding.
#[test]
fn conformance_map_insertion_order_is_invisible() {
    let forward = text_map(&[("a", 1), ("b", 2), ("aa", 3)]);
    let reverse = text_map(&[("aa", 3), ("b", 2), ("a", 1)]);
    let rotated = text_map(&[("b", 2), ("aa", 3), ("a", 1)]);

    let expected = cbor::encode(&forward).unwrap();
    assert_eq!(cbor::encode(&reverse).unwrap(), expected);
    assert_eq!(cbor::encode(&rotated).unwrap(), expected);
    assert_eq!(forward, reverse, "logical equality ignores map order");
}

/// Shorter encoded keys sort first, regardless of byte value.
#[test]
fn conformance_keys_sort_length_first() {
    let value = text_map(&[("aa", 3), ("b", 2), ("a", 1)]);
    assert_eq!(
        fw_core::encoding::to_hex(&cbor::encode(&value).unwrap()),
        "a361610161620262616103"
    );
}

/// Integer headers MUST use the shortest form.
#[test]
fn conformance_integer_headers_are_shortest() {
    let cases: [(u64, &str); 6] = [
        (0, "00"),
        (23, "17"),
        (24, "1818"),
        (255, "18ff"),
        (256, "190100"),
        (u64::MAX, "1bffffffffffffffff"),
    ];
    for (value, hex) in cases {
        let encoded = cbor::encode(&CanonicalValue::Unsigned(value)).unwrap();
        assert_eq!(fw_core::encoding::to_hex(&encoded), hex, "value {value}");
    }
}

/// The decoder rejects a one-byte header carrying a value below 24.
#[test]
fn conformance_decode_rejects_non_shortest_header() {
    let err = cbor::decode(&[0x18, 0x05]).unwrap_err();
    assert!(matches!(err, OracleError::Decode(_)), "got {err}");
}

/// Duplicate keys are an encode error, not silently merged.
#[test]
fn conformance_duplicate_keys_rejected() {
    let dup = text_map(&[("k", 1), ("k", 2)]);
    assert!(matches!(cbor::encode(&dup), Err(OracleError::Encode(_))));
}

/// Every schema corpus message survives canonical encode then strict decode.
#[test]
fn conformance_corpus_messages_decode_strictly() {
    let set: VectorSet =
        fw_core::corpus::load(&crate::vectors_dir().join("cbor_test_vectors.json")).unwrap();
    for (name, vector) in &set.0 {
        let Ok(value) = cbor::from_json(&vector.data) else {
            // Negative vectors may carry values outside the canonical model.
            assert!(!vector.expect_valid, "{name} must be encodable");
            continue;
        };
        let tagged = cbor::encode_tagged(vector.tag, &value).unwrap();
        let (tag, decoded) = cbor::decode_tagged(&tagged).unwrap();
        assert_eq!(tag, vector.tag, "{name}");
        assert_eq!(decoded, value, "{name}");
    }
}
