//! Protocol-buffer wire format -> row
//!
//! Fields are decoded by tag number against the resolved type; values are
//! then matched to schema columns by field name. Unknown tags are skipped and
//! the last occurrence of a repeated tag wins.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Number, Value};
use tracing::{debug, trace};

use super::{DecodeError, FormatType, RowDeserializer, project};
use crate::registry::{TypeDescriptor, TypeField};
use crate::schema::{FieldType, Row, RowSchema};

const FORMAT: &str = "pb";

const WIRE_VARINT: u64 = 0;
const WIRE_FIXED64: u64 = 1;
const WIRE_LEN: u64 = 2;
const WIRE_FIXED32: u64 = 5;

const MAX_FIELD_NUMBER: u64 = (1 << 29) - 1;

/// Decodes protobuf-encoded messages of one registered type
#[derive(Debug, Clone)]
pub struct ProtobufRowDeserializer {
    schema: Arc<RowSchema>,
    message_type: Arc<TypeDescriptor>,
}

impl ProtobufRowDeserializer {
    pub fn new(schema: Arc<RowSchema>, message_type: Arc<TypeDescriptor>) -> Self {
        debug!(type_name = %message_type.name, "ProtobufRowDeserializer::new: called");
        Self { schema, message_type }
    }

    pub fn message_type(&self) -> &TypeDescriptor {
        &self.message_type
    }
}

impl RowDeserializer for ProtobufRowDeserializer {
    fn format(&self) -> FormatType {
        FormatType::Pb
    }

    fn schema(&self) -> &RowSchema {
        &self.schema
    }

    fn deserialize(&self, message: &[u8]) -> Result<Row, DecodeError> {
        let mut reader = WireReader::new(message);
        let mut decoded: HashMap<&str, Value> = HashMap::new();

        while !reader.is_empty() {
            let at = reader.pos;
            let key = reader.varint()?;
            let wire_type = key & 0x7;
            let number = match key >> 3 {
                0 => return Err(reader.malformed(at, "field number 0")),
                n if n > MAX_FIELD_NUMBER => {
                    return Err(reader.malformed(at, &format!("field number {} out of range", n)));
                }
                n => n as u32,
            };
            let field = self.message_type.field_by_number(number);
            trace!(number, wire_type, known = field.is_some(), "pb field");

            let value = match wire_type {
                WIRE_VARINT => {
                    let raw = reader.varint()?;
                    field.map(|f| varint_value(raw, f))
                }
                WIRE_FIXED64 => {
                    let raw = reader.fixed::<8>()?;
                    field.map(|f| fixed64_value(raw, f))
                }
                WIRE_LEN => {
                    let len = reader.varint()? as usize;
                    let bytes = reader.take(len)?;
                    match field {
                        Some(_) => Some(Value::String(
                            std::str::from_utf8(bytes)
                                .map_err(|_| reader.malformed(at, "length-delimited field is not UTF-8"))?
                                .to_string(),
                        )),
                        None => None,
                    }
                }
                WIRE_FIXED32 => {
                    let raw = reader.fixed::<4>()?;
                    field.map(|f| fixed32_value(raw, f))
                }
                other => {
                    return Err(reader.malformed(at, &format!("unsupported wire type {}", other)));
                }
            };

            if let (Some(field), Some(value)) = (field, value) {
                decoded.insert(field.name.as_str(), value);
            }
        }

        project(&self.schema, |name| decoded.remove(name))
    }
}

fn varint_value(raw: u64, field: &TypeField) -> Value {
    match field.field_type {
        FieldType::Bool => Value::Bool(raw != 0),
        FieldType::Int => Value::from(raw as i64),
        FieldType::Float => float(raw as f64),
        FieldType::String => Value::String(raw.to_string()),
    }
}

fn fixed64_value(raw: [u8; 8], field: &TypeField) -> Value {
    match field.field_type {
        FieldType::Float => float(f64::from_le_bytes(raw)),
        FieldType::Bool => Value::Bool(u64::from_le_bytes(raw) != 0),
        FieldType::Int => Value::from(i64::from_le_bytes(raw)),
        FieldType::String => Value::String(i64::from_le_bytes(raw).to_string()),
    }
}

fn fixed32_value(raw: [u8; 4], field: &TypeField) -> Value {
    match field.field_type {
        FieldType::Float => float(f32::from_le_bytes(raw) as f64),
        FieldType::Bool => Value::Bool(u32::from_le_bytes(raw) != 0),
        FieldType::Int => Value::from(i32::from_le_bytes(raw) as i64),
        FieldType::String => Value::String(i32::from_le_bytes(raw).to_string()),
    }
}

fn float(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn truncated(&self) -> DecodeError {
        DecodeError::Truncated {
            format: FORMAT,
            offset: self.pos,
        }
    }

    fn malformed(&self, offset: usize, message: &str) -> DecodeError {
        DecodeError::Malformed {
            format: FORMAT,
            offset,
            message: message.to_string(),
        }
    }

    fn varint(&mut self) -> Result<u64, DecodeError> {
        let start = self.pos;
        let mut value = 0u64;
        for shift in (0..64).step_by(7) {
            let byte = *self.buf.get(self.pos).ok_or_else(|| self.truncated())?;
            self.pos += 1;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(self.malformed(start, "varint longer than 10 bytes"))
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(len).ok_or_else(|| self.truncated())?;
        let bytes = self.buf.get(self.pos..end).ok_or_else(|| self.truncated())?;
        self.pos = end;
        Ok(bytes)
    }

    fn fixed<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let bytes = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }
}
