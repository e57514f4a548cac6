//! Row deserializers
//!
//! Each supported format compiles into a [`RowDeserializer`]: a black box
//! turning one message into one [`Row`] shaped by the row schema it was
//! built with.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::schema::{Row, RowSchema};

pub mod grok;
pub mod hessian;
pub mod json;
pub mod protobuf;

pub use grok::GrokRowDeserializer;
pub use hessian::HessianRowDeserializer;
pub use json::JsonRowDeserializer;
pub use protobuf::ProtobufRowDeserializer;

/// Format tags understood by the compiler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatType {
    /// Hessian 2 serialized objects
    Hessian,
    /// Protocol-buffer wire format
    Pb,
    Json,
    /// Grok / regex extraction from text
    Grok,
}

impl FormatType {
    pub const ALL: [FormatType; 4] = [Self::Hessian, Self::Pb, Self::Json, Self::Grok];

    /// Case-insensitive lookup of a discriminator
    pub fn parse(discriminator: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(discriminator))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hessian => "hessian",
            Self::Pb => "pb",
            Self::Json => "json",
            Self::Grok => "grok",
        }
    }
}

impl fmt::Display for FormatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while decoding a single message
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Invalid JSON message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Message is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Expected {expected}, found {found}")]
    UnexpectedShape { expected: &'static str, found: String },

    #[error("Field '{field}' cannot be read as {expected}")]
    Coerce { field: String, expected: &'static str },

    #[error("Message does not match pattern")]
    NoMatch,

    #[error("Source field '{0}' is missing or not a string")]
    MissingField(String),

    #[error("Truncated {format} message at offset {offset}")]
    Truncated { format: &'static str, offset: usize },

    #[error("Malformed {format} message at offset {offset}: {message}")]
    Malformed {
        format: &'static str,
        offset: usize,
        message: String,
    },

    #[error("Expected type {expected}, found {found}")]
    ClassMismatch { expected: String, found: String },
}

/// Runtime component produced by compiling a format descriptor
pub trait RowDeserializer: Send + Sync + fmt::Debug {
    /// Which format this deserializer was compiled from
    fn format(&self) -> FormatType;

    /// The row schema produced rows conform to
    fn schema(&self) -> &RowSchema;

    /// Decode one message into a row
    fn deserialize(&self, message: &[u8]) -> Result<Row, DecodeError>;
}

/// Build a row by looking each schema column up by name and coercing it
pub(crate) fn project<F>(schema: &RowSchema, mut lookup: F) -> Result<Row, DecodeError>
where
    F: FnMut(&str) -> Option<Value>,
{
    let mut values = Vec::with_capacity(schema.len());
    for field in &schema.fields {
        let raw = lookup(&field.name).unwrap_or(Value::Null);
        let value = field.field_type.coerce(raw).ok_or_else(|| DecodeError::Coerce {
            field: field.name.clone(),
            expected: field.field_type.as_str(),
        })?;
        values.push(value);
    }
    Ok(Row::new(values))
}

/// Short description of a JSON value's kind, for error messages
pub(crate) fn kind_of(value: &Value) -> String {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldType, SchemaField};
    use serde_json::json;

    #[test]
    fn test_format_type_parse_is_case_insensitive() {
        assert_eq!(FormatType::parse("json"), Some(FormatType::Json));
        assert_eq!(FormatType::parse("JSON"), Some(FormatType::Json));
        assert_eq!(FormatType::parse("Hessian"), Some(FormatType::Hessian));
        assert_eq!(FormatType::parse("PB"), Some(FormatType::Pb));
        assert_eq!(FormatType::parse("gRoK"), Some(FormatType::Grok));
        assert_eq!(FormatType::parse("avro"), None);
        assert_eq!(FormatType::parse(""), None);
    }

    #[test]
    fn test_project_coerces_and_fills_nulls() {
        let schema = RowSchema::new(vec![
            SchemaField::new("a", FieldType::Int),
            SchemaField::new("b", FieldType::String),
        ]);
        let row = project(&schema, |name| (name == "a").then(|| json!("5"))).unwrap();
        assert_eq!(row.values(), &[json!(5), Value::Null]);
    }

    #[test]
    fn test_project_reports_column_on_coerce_failure() {
        let schema = RowSchema::new(vec![SchemaField::new("flag", FieldType::Bool)]);
        let err = project(&schema, |_| Some(json!(3))).unwrap_err();
        assert!(matches!(err, DecodeError::Coerce { ref field, expected: "bool" } if field == "flag"));
    }
}
