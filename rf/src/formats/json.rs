//! JSON object -> row

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::{DecodeError, FormatType, RowDeserializer, kind_of, project};
use crate::schema::{Row, RowSchema};

/// Reads each schema column from the same-named member of a JSON object
#[derive(Debug, Clone)]
pub struct JsonRowDeserializer {
    schema: Arc<RowSchema>,
}

impl JsonRowDeserializer {
    pub fn new(schema: Arc<RowSchema>) -> Self {
        debug!(columns = schema.len(), "JsonRowDeserializer::new: called");
        Self { schema }
    }
}

impl RowDeserializer for JsonRowDeserializer {
    fn format(&self) -> FormatType {
        FormatType::Json
    }

    fn schema(&self) -> &RowSchema {
        &self.schema
    }

    fn deserialize(&self, message: &[u8]) -> Result<Row, DecodeError> {
        let mut object = match serde_json::from_slice::<Value>(message)? {
            Value::Object(object) => object,
            other => {
                return Err(DecodeError::UnexpectedShape {
                    expected: "JSON object",
                    found: kind_of(&other),
                });
            }
        };
        project(&self.schema, |name| object.remove(name))
    }
}
