//! Row schema and decoded rows
//!
//! The row schema is supplied by the downstream pipeline: an ordered list of
//! named, typed columns. Every deserializer produces [`Row`]s aligned with it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tracing::debug;

/// Column type in a row schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    #[serde(alias = "long", alias = "integer")]
    Int,
    #[serde(alias = "double")]
    Float,
    #[serde(alias = "boolean")]
    Bool,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
        }
    }

    /// Convert `value` into this column type, or `None` when it cannot be represented
    pub fn coerce(&self, value: Value) -> Option<Value> {
        if value.is_null() {
            return Some(Value::Null);
        }
        match self {
            Self::String => Some(match value {
                Value::String(s) => Value::String(s),
                Value::Bool(b) => Value::String(b.to_string()),
                Value::Number(n) => Value::String(n.to_string()),
                other => Value::String(other.to_string()),
            }),
            Self::Int => match value {
                Value::Number(n) => match n.as_i64() {
                    Some(i) => Some(Value::from(i)),
                    None => n
                        .as_f64()
                        .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                        .map(|f| Value::from(f as i64)),
                },
                Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
                _ => None,
            },
            Self::Float => match value {
                Value::Number(n) => n.as_f64().and_then(Number::from_f64).map(Value::Number),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number),
                _ => None,
            },
            Self::Bool => match value {
                Value::Bool(b) => Some(Value::Bool(b)),
                Value::String(s) if s.trim().eq_ignore_ascii_case("true") => Some(Value::Bool(true)),
                Value::String(s) if s.trim().eq_ignore_ascii_case("false") => Some(Value::Bool(false)),
                _ => None,
            },
        }
    }
}

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,

    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl SchemaField {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// Target row type a deserializer produces records in
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSchema {
    #[serde(default)]
    pub fields: Vec<SchemaField>,
}

impl RowSchema {
    pub fn new(fields: Vec<SchemaField>) -> Self {
        Self { fields }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// One decoded record, values ordered like the schema columns
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Look a column up by name
    pub fn field<'a>(&'a self, schema: &RowSchema, name: &str) -> Option<&'a Value> {
        schema.index_of(name).and_then(|i| self.values.get(i))
    }

    /// Render as a JSON object keyed by column name
    pub fn to_json(&self, schema: &RowSchema) -> Value {
        debug!(columns = schema.len(), "Row::to_json: called");
        let mut object = Map::with_capacity(schema.len());
        for (field, value) in schema.fields.iter().zip(self.values.iter()) {
            object.insert(field.name.clone(), value.clone());
        }
        Value::Object(object)
    }
}
