//! Hessian 2 serialized objects -> row
//!
//! Supports the value subset produced when serializing plain data objects:
//! null, booleans, every compact int/long/double form, dates, chunked
//! strings, lists, maps, class definitions with object instances, and back
//! references. Binary blobs are rejected.
//!
//! The message must hold one object (or map). An object's class must match the
//! resolved type; only fields the type declares reach the row.

use std::sync::Arc;

use serde_json::{Map, Number, Value};
use tracing::debug;

use super::{DecodeError, FormatType, RowDeserializer, kind_of, project};
use crate::registry::TypeDescriptor;
use crate::schema::{Row, RowSchema};

const FORMAT: &str = "hessian";

/// Nesting limit for containers and objects
const MAX_DEPTH: usize = 64;

/// Decodes Hessian-serialized instances of one registered type
#[derive(Debug, Clone)]
pub struct HessianRowDeserializer {
    schema: Arc<RowSchema>,
    class: Arc<TypeDescriptor>,
}

impl HessianRowDeserializer {
    pub fn new(schema: Arc<RowSchema>, class: Arc<TypeDescriptor>) -> Self {
        debug!(class = %class.name, "HessianRowDeserializer::new: called");
        Self { schema, class }
    }

}

impl RowDeserializer for HessianRowDeserializer {
    fn format(&self) -> FormatType {
        FormatType::Hessian
    }

    fn schema(&self) -> &RowSchema {
        &self.schema
    }

    fn deserialize(&self, message: &[u8]) -> Result<Row, DecodeError> {
        let mut reader = HessianReader::new(message);
        let (class_name, mut fields) = reader.read_top()?;

        if let Some(found) = class_name {
            if found != self.class.name {
                return Err(DecodeError::ClassMismatch {
                    expected: self.class.name.clone(),
                    found,
                });
            }
        }

        project(&self.schema, |name| {
            if self.class.field(name).is_some() {
                fields.remove(name)
            } else {
                None
            }
        })
    }
}

#[derive(Debug, Clone)]
struct ClassDef {
    name: String,
    fields: Vec<String>,
}

struct HessianReader<'a> {
    buf: &'a [u8],
    pos: usize,
    classes: Vec<ClassDef>,
    types: Vec<String>,
    refs: Vec<Value>,
    depth: usize,
}

impl<'a> HessianReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            classes: Vec::new(),
            types: Vec::new(),
            refs: Vec::new(),
            depth: 0,
        }
    }

    fn truncated(&self) -> DecodeError {
        DecodeError::Truncated {
            format: FORMAT,
            offset: self.pos,
        }
    }

    fn malformed(&self, offset: usize, message: impl Into<String>) -> DecodeError {
        DecodeError::Malformed {
            format: FORMAT,
            offset,
            message: message.into(),
        }
    }

    fn peek(&self) -> Result<u8, DecodeError> {
        self.buf.get(self.pos).copied().ok_or_else(|| self.truncated())
    }

    fn byte(&mut self) -> Result<u8, DecodeError> {
        let b = self.peek()?;
        self.pos += 1;
        Ok(b)
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

    /// Top-level value: class definitions, then one object or map
    fn read_top(&mut self) -> Result<(Option<String>, Map<String, Value>), DecodeError> {
        loop {
            let tag = self.peek()?;
            match tag {
                b'C' => {
                    self.pos += 1;
                    self.read_class_def()?;
                }
                b'O' => {
                    self.pos += 1;
                    let index = self.read_index()?;
                    let (name, fields) = self.read_object(index)?;
                    return Ok((Some(name), fields));
                }
                0x60..=0x6f => {
                    self.pos += 1;
                    let (name, fields) = self.read_object((tag - 0x60) as usize)?;
                    return Ok((Some(name), fields));
                }
                b'H' => {
                    self.pos += 1;
                    return Ok((None, self.read_map()?));
                }
                b'M' => {
                    self.pos += 1;
                    let type_name = self.read_type()?;
                    let fields = self.read_map()?;
                    return Ok(((!type_name.is_empty()).then_some(type_name), fields));
                }
                _ => {
                    let value = self.read_value()?;
                    return Err(DecodeError::UnexpectedShape {
                        expected: "Hessian object or map",
                        found: kind_of(&value),
                    });
                }
            }
        }
    }

    fn read_value(&mut self) -> Result<Value, DecodeError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.malformed(self.pos, format!("nested too deeply (limit {})", MAX_DEPTH)));
        }
        self.depth += 1;
        let value = self.read_tagged();
        self.depth -= 1;
        value
    }

    fn read_tagged(&mut self) -> Result<Value, DecodeError> {
        let at = self.pos;
        let tag = self.byte()?;
        let value = match tag {
            b'N' => Value::Null,
            b'T' => Value::Bool(true),
            b'F' => Value::Bool(false),

            // int
            0x80..=0xbf => Value::from(i64::from(tag) - 0x90),
            0xc0..=0xcf => {
                let b1 = self.byte()?;
                Value::from(((i64::from(tag) - 0xc8) << 8) + i64::from(b1))
            }
            0xd0..=0xd7 => {
                let [b1, b2] = self.fixed::<2>()?;
                Value::from(((i64::from(tag) - 0xd4) << 16) + (i64::from(b1) << 8) + i64::from(b2))
            }
            b'I' => Value::from(i64::from(i32::from_be_bytes(self.fixed::<4>()?))),

            // long
            0xd8..=0xef => Value::from(i64::from(tag) - 0xe0),
            0xf0..=0xff => {
                let b1 = self.byte()?;
                Value::from(((i64::from(tag) - 0xf8) << 8) + i64::from(b1))
            }
            0x38..=0x3f => {
                let [b1, b2] = self.fixed::<2>()?;
                Value::from(((i64::from(tag) - 0x3c) << 16) + (i64::from(b1) << 8) + i64::from(b2))
            }
            0x59 => Value::from(i64::from(i32::from_be_bytes(self.fixed::<4>()?))),
            b'L' => Value::from(i64::from_be_bytes(self.fixed::<8>()?)),

            // double
            0x5b => float(0.0),
            0x5c => float(1.0),
            0x5d => float(f64::from(i8::from_be_bytes(self.fixed::<1>()?))),
            0x5e => float(f64::from(i16::from_be_bytes(self.fixed::<2>()?))),
            0x5f => float(f64::from(i32::from_be_bytes(self.fixed::<4>()?)) / 1000.0),
            b'D' => float(f64::from_be_bytes(self.fixed::<8>()?)),

            // date, as epoch millis
            0x4a => Value::from(i64::from_be_bytes(self.fixed::<8>()?)),
            0x4b => Value::from(i64::from(i32::from_be_bytes(self.fixed::<4>()?)) * 60_000),

            0x00..=0x1f | 0x30..=0x33 | b'S' | b'R' => Value::String(self.read_string_body(tag)?),

            b'H' => Value::Object(self.read_map()?),
            b'M' => {
                self.read_type()?;
                Value::Object(self.read_map()?)
            }

            b'C' => {
                self.read_class_def()?;
                self.read_value()?
            }
            b'O' => {
                let index = self.read_index()?;
                Value::Object(self.read_object(index)?.1)
            }
            0x60..=0x6f => Value::Object(self.read_object((tag - 0x60) as usize)?.1),

            0x55 => {
                self.read_type()?;
                self.read_list(None)?
            }
            0x56 => {
                self.read_type()?;
                let len = self.read_index()?;
                self.read_list(Some(len))?
            }
            0x57 => self.read_list(None)?,
            0x58 => {
                let len = self.read_index()?;
                self.read_list(Some(len))?
            }
            0x70..=0x77 => {
                self.read_type()?;
                self.read_list(Some((tag - 0x70) as usize))?
            }
            0x78..=0x7f => self.read_list(Some((tag - 0x78) as usize))?,

            b'Q' => {
                let index = self.read_index()?;
                self.refs
                    .get(index)
                    .cloned()
                    .ok_or_else(|| self.malformed(at, format!("unknown back reference {}", index)))?
            }

            0x20..=0x2f | 0x34..=0x37 | b'A' | b'B' => {
                return Err(self.malformed(at, "binary values are not supported"));
            }
            other => return Err(self.malformed(at, format!("unexpected tag 0x{:02x}", other))),
        };
        Ok(value)
    }

    /// An int used as a length or table index
    fn read_index(&mut self) -> Result<usize, DecodeError> {
        let at = self.pos;
        self.read_value()?
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| self.malformed(at, "expected a non-negative int"))
    }

    /// A type is either a new type name or an index into earlier names
    fn read_type(&mut self) -> Result<String, DecodeError> {
        let at = self.pos;
        match self.read_value()? {
            Value::String(name) => {
                self.types.push(name.clone());
                Ok(name)
            }
            Value::Number(n) => n
                .as_u64()
                .and_then(|i| self.types.get(i as usize).cloned())
                .ok_or_else(|| self.malformed(at, "unknown type reference")),
            _ => Err(self.malformed(at, "expected a type name or reference")),
        }
    }

    fn read_class_def(&mut self) -> Result<(), DecodeError> {
        let at = self.pos;
        let Value::String(name) = self.read_value()? else {
            return Err(self.malformed(at, "class name must be a string"));
        };
        let count = self.read_index()?;
        let mut fields = Vec::with_capacity(count.min(256));
        for _ in 0..count {
            let at = self.pos;
            let Value::String(field) = self.read_value()? else {
                return Err(self.malformed(at, "field name must be a string"));
            };
            fields.push(field);
        }
        debug!(%name, fields = fields.len(), "hessian class definition");
        self.classes.push(ClassDef { name, fields });
        Ok(())
    }

    fn read_object(&mut self, index: usize) -> Result<(String, Map<String, Value>), DecodeError> {
        let class = self
            .classes
            .get(index)
            .cloned()
            .ok_or_else(|| self.malformed(self.pos, format!("unknown class definition {}", index)))?;
        let slot = self.reserve_ref();
        let mut object = Map::with_capacity(class.fields.len());
        for field in class.fields {
            let value = self.read_value()?;
            object.insert(field, value);
        }
        self.refs[slot] = Value::Object(object.clone());
        Ok((class.name, object))
    }

    fn read_map(&mut self) -> Result<Map<String, Value>, DecodeError> {
        let slot = self.reserve_ref();
        let mut map = Map::new();
        while self.peek()? != b'Z' {
            let key = match self.read_value()? {
                Value::String(s) => s,
                other => other.to_string(),
            };
            let value = self.read_value()?;
            map.insert(key, value);
        }
        self.pos += 1;
        self.refs[slot] = Value::Object(map.clone());
        Ok(map)
    }

    fn read_list(&mut self, len: Option<usize>) -> Result<Value, DecodeError> {
        let slot = self.reserve_ref();
        let mut items = Vec::new();
        match len {
            Some(len) => {
                for _ in 0..len {
                    items.push(self.read_value()?);
                }
            }
            None => {
                while self.peek()? != b'Z' {
                    items.push(self.read_value()?);
                }
                self.pos += 1;
            }
        }
        let list = Value::Array(items);
        self.refs[slot] = list.clone();
        Ok(list)
    }

    // Containers are numbered in the order they start.
    fn reserve_ref(&mut self) -> usize {
        self.refs.push(Value::Null);
        self.refs.len() - 1
    }

    fn read_string_body(&mut self, first: u8) -> Result<String, DecodeError> {
        let mut out = String::new();
        let mut tag = first;
        loop {
            let at = self.pos;
            let (len, last) = match tag {
                0x00..=0x1f => (tag as usize, true),
                0x30..=0x33 => ((((tag - 0x30) as usize) << 8) | self.byte()? as usize, true),
                b'S' => (u16::from_be_bytes(self.fixed::<2>()?) as usize, true),
                b'R' => (u16::from_be_bytes(self.fixed::<2>()?) as usize, false),
                _ => return Err(self.malformed(at, "expected a string chunk")),
            };
            self.read_chars(len, &mut out)?;
            if last {
                return Ok(out);
            }
            tag = self.byte()?;
        }
    }

    // Lengths count UTF-16 units, so 4-byte sequences count twice. Java
    // writes a supplementary character as two 3-byte surrogate halves.
    fn read_chars(&mut self, units: usize, out: &mut String) -> Result<(), DecodeError> {
        let mut read = 0;
        while read < units {
            let at = self.pos;
            let lead = self.peek()?;
            if lead == 0xed && self.buf.get(self.pos + 1).is_some_and(|b| *b >= 0xa0) {
                let high = self.read_surrogate()?;
                let low = self.read_surrogate()?;
                let ch = char::decode_utf16([high, low])
                    .next()
                    .and_then(Result::ok)
                    .ok_or_else(|| self.malformed(at, "unpaired surrogate"))?;
                out.push(ch);
                read += 2;
                continue;
            }
            let width = match lead {
                0x00..=0x7f => 1,
                0xc0..=0xdf => 2,
                0xe0..=0xef => 3,
                0xf0..=0xf7 => 4,
                _ => return Err(self.malformed(at, "invalid UTF-8 lead byte")),
            };
            let bytes = self.take(width)?;
            let s = std::str::from_utf8(bytes).map_err(|_| self.malformed(at, "invalid UTF-8 sequence"))?;
            out.push_str(s);
            read += if width == 4 { 2 } else { 1 };
        }
        Ok(())
    }

    /// One UTF-16 surrogate written as a 3-byte `ED A0..BF xx` sequence
    fn read_surrogate(&mut self) -> Result<u16, DecodeError> {
        let at = self.pos;
        match *self.take(3)? {
            [0xed, b1 @ 0xa0..=0xbf, b2 @ 0x80..=0xbf] => Ok(0xd000 | (u16::from(b1 & 0x3f) << 6) | u16::from(b2 & 0x3f)),
            _ => Err(self.malformed(at, "unpaired surrogate")),
        }
    }
}

fn float(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}
