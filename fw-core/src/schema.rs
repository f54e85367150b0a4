//! Schema validator for protocol message variants.
//!
//! Dispatch is on the `type` discriminator. Within a variant every
//! declared field is checked and every violation is reported; there is
//! no fail-fast, so a corpus can assert the complete error set.
//!
//! Binary fields travel as base64 text and are range-checked on their
//! decoded length. Fields a variant does not declare produce warnings,
//! never errors.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::constants::*;
use crate::corpus::Corpus;
use crate::encoding;
use crate::errors::OracleError;
use crate::report::{ScenarioReport, Summary};

/// Known message variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    HandshakeInit,
    HandshakeResponse,
    HandshakeComplete,
    DrBackup,
    DrRestore,
    DrReset,
    Join,
    Leave,
    Data,
}

impl MessageType {
    pub const ALL: [MessageType; 9] = [
        MessageType::HandshakeInit,
        MessageType::HandshakeResponse,
        MessageType::HandshakeComplete,
        MessageType::DrBackup,
        MessageType::DrRestore,
        MessageType::DrReset,
        MessageType::Join,
        MessageType::Leave,
        MessageType::Data,
    ];

    /// Wire name carried in the `type` field.
    pub fn name(self) -> &'static str {
        match self {
            MessageType::HandshakeInit => "HANDSHAKE_INIT",
            MessageType::HandshakeResponse => "HANDSHAKE_RESPONSE",
            MessageType::HandshakeComplete => "HANDSHAKE_COMPLETE",
            MessageType::DrBackup => "DR_BACKUP",
            MessageType::DrRestore => "DR_RESTORE",
            MessageType::DrReset => "DR_RESET",
            MessageType::Join => "JOIN",
            MessageType::Leave => "LEAVE",
            MessageType::Data => "DATA",
        }
    }

    pub fn tag(self) -> u64 {
        match self {
            MessageType::HandshakeInit => TAG_HANDSHAKE_INIT,
            MessageType::HandshakeResponse => TAG_HANDSHAKE_RESPONSE,
            MessageType::HandshakeComplete => TAG_HANDSHAKE_COMPLETE,
            MessageType::DrBackup => TAG_DR_BACKUP,
            MessageType::DrRestore => TAG_DR_RESTORE,
            MessageType::DrReset => TAG_DR_RESET,
            MessageType::Join => TAG_JOIN,
            MessageType::Leave => TAG_LEAVE,
            MessageType::Data => TAG_DATA,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn from_tag(tag: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }

    /// Declared fields, excluding the `type` discriminator itself.
    pub fn fields(self) -> &'static [FieldSpec] {
        match self {
            MessageType::HandshakeInit => HANDSHAKE_INIT_FIELDS,
            MessageType::HandshakeResponse => HANDSHAKE_RESPONSE_FIELDS,
            MessageType::HandshakeComplete => HANDSHAKE_COMPLETE_FIELDS,
            MessageType::DrBackup => DR_BACKUP_FIELDS,
            MessageType::DrRestore => DR_RESTORE_FIELDS,
            MessageType::DrReset => DR_RESET_FIELDS,
            MessageType::Join => JOIN_FIELDS,
            MessageType::Leave => LEAVE_FIELDS,
            MessageType::Data => DATA_FIELDS,
        }
    }
}

/// Primitive kind and bounds of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// UTF-8 text; an empty `allowed` set accepts any value.
    Text { allowed: &'static [&'static str] },
    /// Unsigned integer within an inclusive range.
    Integer { min: u64, max: u64 },
    /// Base64 text whose decoded length lies in an inclusive range.
    Binary { min: usize, max: usize },
}

impl FieldKind {
    fn expected(self) -> &'static str {
        match self {
            FieldKind::Text { .. } => "string",
            FieldKind::Integer { .. } => "integer",
            FieldKind::Binary { .. } => "base64 string",
        }
    }
}

/// A required field of a message variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

const fn binary(name: &'static str, len: usize) -> FieldSpec {
    FieldSpec { name, kind: FieldKind::Binary { min: len, max: len } }
}

const fn binary_range(name: &'static str, min: usize, max: usize) -> FieldSpec {
    FieldSpec { name, kind: FieldKind::Binary { min, max } }
}

const fn integer(name: &'static str, min: u64, max: u64) -> FieldSpec {
    FieldSpec { name, kind: FieldKind::Integer { min, max } }
}

const fn text(name: &'static str, allowed: &'static [&'static str]) -> FieldSpec {
    FieldSpec { name, kind: FieldKind::Text { allowed } }
}

const VERSION: FieldSpec = integer("version", 1, 255);
const TIMESTAMP: FieldSpec = integer("timestamp", 0, u64::MAX);

/// Largest DR backup blob accepted.
pub const MAX_DR_DATA_LENGTH: usize = 4096;
/// Largest DATA frame ciphertext accepted.
pub const MAX_DATA_CIPHERTEXT_LENGTH: usize = 65_536;
/// Room identifiers are short printable names.
pub const MAX_ROOM_ID_LENGTH: usize = 256;

pub const DR_RESET_REASONS: &[&str] = &["user_initiated", "security_breach", "device_lost"];

static HANDSHAKE_INIT_FIELDS: &[FieldSpec] = &[
    VERSION,
    binary("client_id", ID_LENGTH),
    binary("x25519_public_key", X25519_PUBLIC_KEY_LENGTH),
    binary("kyber_public_key", KYBER_PUBLIC_KEY_LENGTH),
    TIMESTAMP,
    binary("nonce", PROTOCOL_NONCE_LENGTH),
];

static HANDSHAKE_RESPONSE_FIELDS: &[FieldSpec] = &[
    VERSION,
    binary("server_id", ID_LENGTH),
    binary("x25519_public_key", X25519_PUBLIC_KEY_LENGTH),
    binary("kyber_ciphertext", KYBER_CIPHERTEXT_LENGTH),
    TIMESTAMP,
    binary("nonce", PROTOCOL_NONCE_LENGTH),
];

static HANDSHAKE_COMPLETE_FIELDS: &[FieldSpec] = &[
    VERSION,
    binary("session_id", ID_LENGTH),
    binary("handshake_hash", HASH_LENGTH),
    TIMESTAMP,
];

static DR_BACKUP_FIELDS: &[FieldSpec] = &[
    VERSION,
    binary("device_id", ID_LENGTH),
    binary_range("dr_data", 1, MAX_DR_DATA_LENGTH),
    integer("backup_version", 1, 255),
    TIMESTAMP,
];

static DR_RESTORE_FIELDS: &[FieldSpec] = &[
    VERSION,
    binary("device_id", ID_LENGTH),
    binary("restore_token", 32),
    TIMESTAMP,
];

static DR_RESET_FIELDS: &[FieldSpec] = &[
    VERSION,
    binary("device_id", ID_LENGTH),
    text("reset_reason", DR_RESET_REASONS),
    TIMESTAMP,
];

static JOIN_FIELDS: &[FieldSpec] = &[
    VERSION,
    text("room_id", &[]),
    binary("client_id", ID_LENGTH),
    TIMESTAMP,
    binary("nonce", PROTOCOL_NONCE_LENGTH),
];

static LEAVE_FIELDS: &[FieldSpec] = &[
    VERSION,
    text("room_id", &[]),
    binary("client_id", ID_LENGTH),
    TIMESTAMP,
];

static DATA_FIELDS: &[FieldSpec] = &[
    VERSION,
    text("room_id", &[]),
    binary("sender_id", ID_LENGTH),
    integer("sequence", 0, u64::MAX),
    binary_range("ciphertext", AEAD_TAG_LENGTH, MAX_DATA_CIPHERTEXT_LENGTH),
];

// ── Violations ───────────────────────────────────────────────────────

/// One violated constraint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaViolation {
    #[error("Message must be an object")]
    NotAnObject,
    #[error("Missing 'type' field")]
    MissingType,
    #[error("Type field must be string")]
    TypeNotText,
    #[error("Unknown message type: {0}")]
    UnknownType(String),
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    /// Present but `null`; distinct from both absence and a wrong type.
    #[error("Field {field} must be {expected}, got null")]
    NullValue { field: &'static str, expected: &'static str },
    #[error("Field {field} must be {expected}")]
    WrongType { field: &'static str, expected: &'static str },
    #[error("Field {field} must be valid base64 (error: {reason})")]
    InvalidBase64 { field: &'static str, reason: String },
    #[error("Field {field} wrong size: {actual} not in {min}..={max}")]
    LengthOutOfRange { field: &'static str, actual: usize, min: usize, max: usize },
    #[error("Field {field} out of range: {value} not in {min}..={max}")]
    ValueOutOfRange { field: &'static str, value: String, min: u64, max: u64 },
    #[error("Field {field} has invalid value: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("Tag {actual:#x} does not match {message_type} ({expected:#x})")]
    TagMismatch { message_type: &'static str, expected: u64, actual: u64 },
}

impl SchemaViolation {
    /// Field the violation concerns, if any.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            SchemaViolation::MissingField(field)
            | SchemaViolation::NullValue { field, .. }
            | SchemaViolation::WrongType { field, .. }
            | SchemaViolation::InvalidBase64 { field, .. }
            | SchemaViolation::LengthOutOfRange { field, .. }
            | SchemaViolation::ValueOutOfRange { field, .. }
            | SchemaViolation::InvalidValue { field, .. } => Some(*field),
            _ => None,
        }
    }
}

impl From<SchemaViolation> for OracleError {
    fn from(v: SchemaViolation) -> Self {
        OracleError::Schema(v.to_string())
    }
}

/// Result of validating one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub message_type: Option<MessageType>,
    pub errors: Vec<SchemaViolation>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    fn finish(mut self) -> Self {
        self.valid = self.errors.is_empty();
        self
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    /// Collapse into a single `OracleError::Schema`, or `Ok` when valid.
    pub fn into_result(self) -> Result<(), OracleError> {
        if self.valid {
            return Ok(());
        }
        Err(OracleError::Schema(self.error_messages().join("; ")))
    }
}

/// Validate a message against its variant's field contract.
pub fn validate(message: &Value) -> ValidationReport {
    let mut report = ValidationReport {
        valid: false,
        message_type: None,
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    let Some(fields) = message.as_object() else {
        report.errors.push(SchemaViolation::NotAnObject);
        return report;
    };
    let type_name = match fields.get("type") {
        None => {
            report.errors.push(SchemaViolation::MissingType);
            return report;
        }
        Some(Value::String(s)) => s,
        Some(_) => {
            report.errors.push(SchemaViolation::TypeNotText);
            return report;
        }
    };
    let Some(message_type) = MessageType::from_name(type_name) else {
        report.errors.push(SchemaViolation::UnknownType(type_name.clone()));
        return report;
    };
    report.message_type = Some(message_type);

    let specs = message_type.fields();
    for spec in specs {
        match fields.get(spec.name) {
            None => report.errors.push(SchemaViolation::MissingField(spec.name)),
            Some(value) => {
                if let Err(v) = check_field(spec, value) {
                    report.errors.push(v);
                }
            }
        }
    }
    for name in fields.keys() {
        if name != "type" && !specs.iter().any(|s| s.name == name) {
            report.warnings.push(format!("Unknown field: {name}"));
        }
    }
    report.finish()
}

fn check_field(spec: &FieldSpec, value: &Value) -> Result<(), SchemaViolation> {
    let field = spec.name;
    if value.is_null() {
        return Err(SchemaViolation::NullValue { field, expected: spec.kind.expected() });
    }
    let wrong_type = || SchemaViolation::WrongType { field, expected: spec.kind.expected() };
    match spec.kind {
        FieldKind::Text { allowed } => {
            let s = value.as_str().ok_or_else(wrong_type)?;
            if !allowed.is_empty() && !allowed.contains(&s) {
                return Err(SchemaViolation::InvalidValue { field, value: s.to_owned() });
            }
            if allowed.is_empty() && (s.is_empty() || s.len() > MAX_ROOM_ID_LENGTH) {
                return Err(SchemaViolation::InvalidValue { field, value: s.to_owned() });
            }
        }
        FieldKind::Integer { min, max } => {
            let Value::Number(n) = value else {
                return Err(wrong_type());
            };
            match n.as_u64() {
                Some(v) if (min..=max).contains(&v) => {}
                Some(v) => {
                    return Err(SchemaViolation::ValueOutOfRange { field, value: v.to_string(), min, max })
                }
                None if n.is_i64() => {
                    return Err(SchemaViolation::ValueOutOfRange { field, value: n.to_string(), min, max })
                }
                None => return Err(wrong_type()),
            }
        }
        FieldKind::Binary { min, max } => {
            let s = value.as_str().ok_or_else(wrong_type)?;
            let bytes = encoding::from_base64(s).map_err(|e| SchemaViolation::InvalidBase64 {
                field,
                reason: decode_reason(e),
            })?;
            if !(min..=max).contains(&bytes.len()) {
                return Err(SchemaViolation::LengthOutOfRange { field, actual: bytes.len(), min, max });
            }
        }
    }
    Ok(())
}

fn decode_reason(err: OracleError) -> String {
    match err {
        OracleError::Decode(msg) => msg,
        other => other.to_string(),
    }
}

// ── Vectors ──────────────────────────────────────────────────────────

/// A named `{tag, data}` protocol vector.
#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolVector {
    pub tag: u64,
    pub data: Value,
    /// Negative vectors set this to `false`.
    #[serde(default = "default_true")]
    pub expect_valid: bool,
    /// Fields that must appear among the violations of a negative vector.
    #[serde(default)]
    pub expected_error_fields: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// Vector corpus keyed by vector name.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct VectorSet(pub BTreeMap<String, ProtocolVector>);

impl Corpus for VectorSet {
    fn scenario_count(&self) -> usize {
        self.0.len()
    }
}

/// Validate a vector's payload and check its declared tag.
pub fn validate_vector(vector: &ProtocolVector) -> ValidationReport {
    let mut report = validate(&vector.data);
    if let Some(message_type) = report.message_type {
        if message_type.tag() != vector.tag {
            report.errors.push(SchemaViolation::TagMismatch {
                message_type: message_type.name(),
                expected: message_type.tag(),
                actual: vector.tag,
            });
        }
    }
    report.finish()
}

/// Validate every vector in the set, one scenario per vector.
pub fn run_vectors(set: &VectorSet) -> Result<Summary, OracleError> {
    let mut summary = Summary::new("rust", "schema");
    for (name, vector) in &set.0 {
        let validation = validate_vector(vector);
        let mut report = ScenarioReport::new(name.as_str());
        report.errors = validation.error_messages();
        report.notes = validation.warnings.clone();
        if let Some(t) = validation.message_type {
            report.set_metric("message_type", t.name());
        }
        report.check(validation.valid == vector.expect_valid, || {
            format!(
                "expected {}, got {}",
                verdict(vector.expect_valid),
                verdict(validation.valid)
            )
        });
        for field in &vector.expected_error_fields {
            let flagged = validation.errors.iter().any(|e| e.field() == Some(field.as_str()));
            report.check(flagged, || format!("missing expected violation on field {field}"));
        }
        tracing::debug!(vector = %name, valid = validation.valid, "schema vector");
        summary.record(report)?;
    }
    tracing::info!(passed = summary.passed, failed = summary.failed, "schema vectors");
    Ok(summary)
}

fn verdict(valid: bool) -> &'static str {
    if valid {
        "valid"
    } else {
        "invalid"
    }
}
