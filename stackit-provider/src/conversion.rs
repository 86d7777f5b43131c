//! Conversions between API payloads and the declarative model

use serde_json::Value as Json;
use stackit_core::resource::number_to_int64;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MappingError {
    #[error("found attribute '{attribute}' of type {found}, failed to assert as {expected}")]
    TypeMismatch {
        attribute: String,
        found: &'static str,
        expected: &'static str,
    },

    #[error("found attribute '{attribute}' with element of type {found}, failed to assert as string")]
    ListElement {
        attribute: String,
        found: &'static str,
    },

    #[error("attribute '{attribute}' value {value} does not fit in int64")]
    OutOfRange { attribute: String, value: String },

    #[error("{0}")]
    Missing(String),
}

/// JSON type name used in mapping errors
pub fn json_type_name(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(n) if n.is_f64() => "float64",
        Json::Number(_) => "int64",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

/// Normalize any JSON number into an int64
///
/// Signed integers pass through, unsigned integers pass when they fit, finite
/// floats are truncated toward zero. Anything else is a mapping error.
pub fn normalize_int64(attribute: &str, value: &Json) -> Result<i64, MappingError> {
    let Json::Number(n) = value else {
        return Err(MappingError::TypeMismatch {
            attribute: attribute.to_string(),
            found: json_type_name(value),
            expected: "int",
        });
    };

    number_to_int64(n).ok_or_else(|| MappingError::OutOfRange {
        attribute: attribute.to_string(),
        value: n.to_string(),
    })
}
