//! Turns accumulated model output into a [`CleanedResult`].
//!
//! Without a schema the text is returned untouched. With one, the text is
//! parsed as JSON and checked field by field; the first field that is missing
//! or of the wrong kind is reported with its path. Values are never coerced.

use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::schema::{SchemaDescriptor, field_path, index_path};
use crate::error::{CleanError, Result};

/// The outcome of cleaning a model answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CleanedResult {
    /// No schema was configured; the answer as generated.
    RawText(String),
    /// The parsed answer, validated against the configured schema. Undeclared
    /// fields are kept.
    ValidatedData(Value),
}

impl CleanedResult {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CleanedResult::RawText(text) => Some(text),
            CleanedResult::ValidatedData(_) => None,
        }
    }

    pub fn as_data(&self) -> Option<&Value> {
        match self {
            CleanedResult::RawText(_) => None,
            CleanedResult::ValidatedData(value) => Some(value),
        }
    }

    /// Deserializes the result into `T`.
    ///
    /// Validated data is converted directly; raw text is parsed as JSON first.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        let value = match self {
            CleanedResult::RawText(text) => serde_json::from_str(text)?,
            CleanedResult::ValidatedData(value) => serde_json::from_value(value.clone())?,
        };
        Ok(value)
    }

    /// Renders the result as YAML, keeping the answer's field order.
    ///
    /// Raw text is returned as generated.
    pub fn to_yaml(&self) -> Result<String> {
        match self {
            CleanedResult::RawText(text) => Ok(text.clone()),
            CleanedResult::ValidatedData(value) => Ok(serde_yaml::to_string(value)?),
        }
    }
}

impl fmt::Display for CleanedResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanedResult::RawText(text) => f.write_str(text),
            CleanedResult::ValidatedData(value) => {
                let pretty = serde_json::to_string_pretty(value).map_err(|_| fmt::Error)?;
                f.write_str(&pretty)
            }
        }
    }
}

/// Cleans `raw_text` against an optional schema.
///
/// # Errors
///
/// - [`CleanError::MalformedOutput`] if a schema is given and the text is not
///   valid JSON.
/// - [`CleanError::SchemaMismatch`] naming the first offending field path if
///   the JSON does not conform.
///
/// # Example
/// ```
/// use autoreview::core::{CleanedResult, FieldDescriptor, SchemaDescriptor, clean};
///
/// assert_eq!(
///     clean("plain text", None).unwrap(),
///     CleanedResult::RawText("plain text".to_string())
/// );
///
/// let schema = SchemaDescriptor::object([FieldDescriptor::required(
///     "score",
///     SchemaDescriptor::Number,
/// )]);
/// let err = clean(r#"{"score": "five"}"#, Some(&schema)).unwrap_err();
/// assert_eq!(
///     err.to_string(),
///     "schema mismatch at `score`: expected number, found string"
/// );
/// ```
pub fn clean(
    raw_text: &str,
    schema: Option<&SchemaDescriptor>,
) -> std::result::Result<CleanedResult, CleanError> {
    let Some(schema) = schema else {
        return Ok(CleanedResult::RawText(raw_text.to_string()));
    };

    let value: Value = serde_json::from_str(raw_text).map_err(|err| CleanError::MalformedOutput {
        raw_text: raw_text.to_string(),
        line: err.line(),
        column: err.column(),
        message: err.to_string(),
    })?;

    validate(&value, schema, "")?;
    Ok(CleanedResult::ValidatedData(value))
}

fn validate(
    value: &Value,
    schema: &SchemaDescriptor,
    path: &str,
) -> std::result::Result<(), CleanError> {
    match (schema, value) {
        (SchemaDescriptor::Any, _)
        | (SchemaDescriptor::String, Value::String(_))
        | (SchemaDescriptor::Boolean, Value::Bool(_))
        | (SchemaDescriptor::Number, Value::Number(_)) => Ok(()),
        (SchemaDescriptor::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(()),
        (SchemaDescriptor::Array { items }, Value::Array(elements)) => {
            for (index, element) in elements.iter().enumerate() {
                validate(element, items, &index_path(path, index))?;
            }
            Ok(())
        }
        (SchemaDescriptor::Object { fields }, Value::Object(map)) => {
            for field in fields {
                let path = field_path(path, &field.name);
                match map.get(&field.name) {
                    None | Some(Value::Null) if !field.required => {}
                    None => return Err(mismatch(path, field.schema.type_name(), "missing")),
                    Some(value) => validate(value, &field.schema, &path)?,
                }
            }
            Ok(())
        }
        (expected, actual) => Err(mismatch(
            path.to_string(),
            expected.type_name(),
            json_kind(actual),
        )),
    }
}

fn mismatch(path: String, expected: &str, actual: &str) -> CleanError {
    CleanError::SchemaMismatch {
        path,
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
