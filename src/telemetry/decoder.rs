//! Payload decoding with lenient per-field access.
//!
//! Only the outer shape is strict: the payload must be a UTF-8 JSON object.
//! Every field inside it is read on demand and falls back to a caller-supplied
//! default when it is missing, `null` or of an unusable type.

use crate::error::DecodeError;
use serde_json::{Map, Value};

/// `message_type` used when the field is absent.
pub const UNKNOWN_MESSAGE_TYPE: &str = "unknown";

/// A payload that parsed as a JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    message_type: String,
    fields: Map<String, Value>,
}

/// Parses raw payload bytes into a [`DecodedMessage`].
pub fn decode(payload: &[u8]) -> Result<DecodedMessage, DecodeError> {
    let text =
        std::str::from_utf8(payload).map_err(|e| DecodeError::InvalidUtf8(e.to_string()))?;
    let value: Value =
        serde_json::from_str(text).map_err(|e| DecodeError::MalformedJson(e.to_string()))?;

    let fields = match value {
        Value::Object(fields) => fields,
        other => return Err(DecodeError::NotAnObject(json_type_name(&other))),
    };

    let message_type = string_of(fields.get("message_type"))
        .unwrap_or_else(|| UNKNOWN_MESSAGE_TYPE.to_string());

    Ok(DecodedMessage {
        message_type,
        fields,
    })
}

impl DecodedMessage {
    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    /// String field; numbers and booleans are rendered as text.
    pub fn str_or(&self, key: &str, default: &str) -> String {
        string_of(self.fields.get(key)).unwrap_or_else(|| default.to_string())
    }

    /// Integer field; floats are truncated towards zero, numeric strings parsed.
    pub fn int_or(&self, key: &str, default: i64) -> i64 {
        match self.fields.get(key) {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .unwrap_or(default),
            Some(Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .map(|f| f as i64)
                .unwrap_or(default),
            _ => default,
        }
    }

    /// Float field; numeric strings are parsed.
    pub fn f64_or(&self, key: &str, default: f64) -> f64 {
        number_of(self.fields.get(key)).unwrap_or(default)
    }

    /// Boolean field; `"true"` and `"false"` strings are accepted.
    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        match self.fields.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => true,
            Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => false,
            _ => default,
        }
    }

    /// Length of an array field, `None` when absent or not an array.
    pub fn array_len(&self, key: &str) -> Option<usize> {
        match self.fields.get(key) {
            Some(Value::Array(items)) => Some(items.len()),
            _ => None,
        }
    }

    /// First two numeric elements of an array field.
    ///
    /// A missing array yields `default`; a short or mistyped array falls back
    /// per element.
    pub fn pair_or(&self, key: &str, default: (f64, f64)) -> (f64, f64) {
        match self.fields.get(key) {
            Some(Value::Array(items)) => (
                number_of(items.first()).unwrap_or(default.0),
                number_of(items.get(1)).unwrap_or(default.1),
            ),
            _ => default,
        }
    }
}

fn string_of(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn number_of(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
