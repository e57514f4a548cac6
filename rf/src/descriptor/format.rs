//! Format descriptor
//!
//! Configuration shape (keys are normalized before binding):
//!
//! ```yaml
//! type: grok
//! properties:
//!   regular: "%{IP:client} %{WORD:method}"
//!   retain: true
//!   field-name: message
//! ```
//!
//! | type      | required    | optional            |
//! |-----------|-------------|---------------------|
//! | `hessian` | `className` |                     |
//! | `pb`      | `className` |                     |
//! | `json`    |             |                     |
//! | `grok`    | `regular`   | `retain`, `fieldName` |
//!
//! The type is matched case-insensitively. An unknown type passes
//! [`validate`](Descriptor::validate) and is rejected by
//! [`transform_with`](Descriptor::transform_with).

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::{Descriptor, DescriptorError};
use crate::formats::{
    FormatType, GrokRowDeserializer, HessianRowDeserializer, JsonRowDeserializer, ProtobufRowDeserializer,
    RowDeserializer,
};
use crate::registry::TypeRegistry;
use crate::schema::RowSchema;

pub const KEY_CLASS_NAME: &str = "className";
pub const KEY_REGULAR: &str = "regular";
pub const KEY_RETAIN: &str = "retain";
pub const KEY_FIELD_NAME: &str = "fieldName";

/// Validated settings for the grok format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrokSpec {
    pub regular: String,
    pub retain: bool,
    pub field_name: Option<String>,
}

/// Typed view of a validated format descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatSpec {
    Hessian { class_name: String },
    Pb { class_name: String },
    Json,
    Grok(GrokSpec),
    /// Discriminator present but not a known format
    Unsupported(String),
}

impl FormatSpec {
    pub fn format_type(&self) -> Option<FormatType> {
        match self {
            Self::Hessian { .. } => Some(FormatType::Hessian),
            Self::Pb { .. } => Some(FormatType::Pb),
            Self::Json => Some(FormatType::Json),
            Self::Grok(_) => Some(FormatType::Grok),
            Self::Unsupported(_) => None,
        }
    }
}

/// What a format needs from the surrounding pipeline
#[derive(Debug, Clone)]
pub struct FormatInput<'a> {
    pub schema: Arc<RowSchema>,
    pub registry: &'a TypeRegistry,
}

impl<'a> FormatInput<'a> {
    pub fn new(schema: Arc<RowSchema>, registry: &'a TypeRegistry) -> Self {
        Self { schema, registry }
    }
}

/// Row deserializer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormatDescriptor {
    #[serde(rename = "type", default)]
    type_name: Option<String>,

    #[serde(default)]
    properties: BTreeMap<String, Value>,

    #[serde(skip)]
    spec: Option<FormatSpec>,
}

impl FormatDescriptor {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            ..Self::default()
        }
    }

    /// Add a property; `key` is expected in canonical (normalized) spelling
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self.spec = None;
        self
    }

    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    /// The typed view built by `validate`
    pub fn spec(&self) -> Option<&FormatSpec> {
        self.spec.as_ref()
    }

    /// Non-null property by canonical key. Falls back to an ASCII
    /// case-insensitive match, since `className` normalizes to `classname`.
    fn property(&self, key: &str) -> Option<&Value> {
        self.properties
            .get(key)
            .or_else(|| {
                self.properties
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(key))
                    .map(|(_, v)| v)
            })
            .filter(|v| !v.is_null())
    }

    fn property_string(&self, key: &str) -> Option<String> {
        self.property(key).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    fn require(&self, format: FormatType, key: &str) -> Result<String, DescriptorError> {
        self.property_string(key).ok_or_else(|| {
            DescriptorError::Validation(format!("format '{}' requires property '{}'", format, key))
        })
    }

    /// `true` only for a boolean true or the string "true" (any case)
    fn retain(&self) -> bool {
        match self.property(KEY_RETAIN) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }
}

impl Descriptor for FormatDescriptor {
    type Param<'a> = FormatInput<'a>;
    type Output = Box<dyn RowDeserializer>;

    fn name(&self) -> &'static str {
        "format"
    }

    fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    fn validate(&mut self) -> Result<(), DescriptorError> {
        debug!(type_name = ?self.type_name, properties = self.properties.len(), "FormatDescriptor::validate: called");
        let Some(type_name) = self.type_name.as_deref() else {
            debug!("FormatDescriptor::validate: type missing");
            return Err(DescriptorError::Validation("format type must not be empty".to_string()));
        };

        let spec = match FormatType::parse(type_name) {
            Some(format @ FormatType::Hessian) => FormatSpec::Hessian {
                class_name: self.require(format, KEY_CLASS_NAME)?,
            },
            Some(format @ FormatType::Pb) => FormatSpec::Pb {
                class_name: self.require(format, KEY_CLASS_NAME)?,
            },
            Some(FormatType::Json) => FormatSpec::Json,
            Some(format @ FormatType::Grok) => FormatSpec::Grok(GrokSpec {
                regular: self.require(format, KEY_REGULAR)?,
                retain: self.retain(),
                field_name: self.property_string(KEY_FIELD_NAME),
            }),
            None => {
                debug!(%type_name, "FormatDescriptor::validate: unknown type, rejected at transform");
                FormatSpec::Unsupported(type_name.to_string())
            }
        };

        debug!(?spec, "FormatDescriptor::validate: valid");
        self.spec = Some(spec);
        Ok(())
    }

    fn is_valid(&self) -> bool {
        self.spec.is_some()
    }

    fn transform_with(&self, input: FormatInput<'_>) -> Result<Box<dyn RowDeserializer>, DescriptorError> {
        let Some(spec) = self.spec.as_ref() else {
            panic!("FormatDescriptor::transform_with called before validate()");
        };
        debug!(?spec, columns = input.schema.len(), "FormatDescriptor::transform_with: called");

        let deserializer: Box<dyn RowDeserializer> = match spec {
            FormatSpec::Hessian { class_name } => {
                let class = input.registry.resolve(class_name)?;
                Box::new(HessianRowDeserializer::new(input.schema, class))
            }
            FormatSpec::Pb { class_name } => {
                let message_type = input.registry.resolve(class_name)?;
                Box::new(ProtobufRowDeserializer::new(input.schema, message_type))
            }
            FormatSpec::Json => Box::new(JsonRowDeserializer::new(input.schema)),
            FormatSpec::Grok(grok) => {
                let deserializer =
                    GrokRowDeserializer::new(input.schema, &grok.regular, grok.retain, grok.field_name.clone())
                        .map_err(|source| DescriptorError::Pattern {
                            pattern: grok.regular.clone(),
                            source,
                        })?;
                Box::new(deserializer)
            }
            FormatSpec::Unsupported(type_name) => {
                return Err(DescriptorError::UnsupportedFormat(type_name.clone()));
            }
        };

        info!(format = %deserializer.format(), "Compiled format descriptor");
        Ok(deserializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::ConfigBinder;
    use crate::registry::{TypeDescriptor, TypeField};
    use crate::schema::{FieldType, SchemaField};

    fn schema() -> Arc<RowSchema> {
        Arc::new(RowSchema::new(vec![
            SchemaField::new("id", FieldType::Int),
            SchemaField::new("name", FieldType::String),
        ]))
    }

    fn registry() -> TypeRegistry {
        [TypeDescriptor::new(
            "com.example.Foo",
            vec![TypeField {
                name: "id".to_string(),
                number: Some(1),
                field_type: FieldType::Int,
            }],
        )]
        .into_iter()
        .collect()
    }

    fn compile(descriptor: &FormatDescriptor) -> Result<Box<dyn RowDeserializer>, DescriptorError> {
        let registry = registry();
        descriptor.transform_with(FormatInput::new(schema(), &registry))
    }

    fn valid(descriptor: FormatDescriptor) -> FormatDescriptor {
        let mut descriptor = descriptor;
        descriptor.validate().unwrap();
        descriptor
    }

    #[test]
    fn test_every_supported_format_compiles() {
        let cases = [
            (FormatDescriptor::new("hessian").with_property(KEY_CLASS_NAME, "com.example.Foo"), FormatType::Hessian),
            (FormatDescriptor::new("pb").with_property(KEY_CLASS_NAME, "com.example.Foo"), FormatType::Pb),
            (FormatDescriptor::new("json"), FormatType::Json),
            (FormatDescriptor::new("grok").with_property(KEY_REGULAR, "%{INT:id}"), FormatType::Grok),
        ];
        for (descriptor, expected) in cases {
            let descriptor = valid(descriptor);
            assert!(descriptor.is_valid());
            let deserializer = compile(&descriptor).unwrap();
            assert_eq!(deserializer.format(), expected);
        }
    }

    #[test]
    fn test_type_is_case_insensitive() {
        let descriptor = valid(FormatDescriptor::new("JSON"));
        assert_eq!(compile(&descriptor).unwrap().format(), FormatType::Json);

        let descriptor = valid(FormatDescriptor::new("Hessian").with_property(KEY_CLASS_NAME, "com.example.Foo"));
        assert_eq!(compile(&descriptor).unwrap().format(), FormatType::Hessian);
    }

    #[test]
    fn test_missing_type_fails_validation() {
        let mut descriptor = FormatDescriptor::default().with_property(KEY_CLASS_NAME, "com.example.Foo");
        let err = descriptor.validate().unwrap_err();
        assert!(matches!(err, DescriptorError::Validation(_)));
        assert!(!descriptor.is_valid());
    }

    #[test]
    fn test_unsupported_type_passes_validation_and_fails_transform() {
        let descriptor = valid(FormatDescriptor::new("avro"));
        assert_eq!(descriptor.spec(), Some(&FormatSpec::Unsupported("avro".to_string())));
        let err = compile(&descriptor).unwrap_err();
        assert!(matches!(err, DescriptorError::UnsupportedFormat(ref t) if t == "avro"));
    }

    #[test]
    fn test_binary_formats_require_class_name() {
        for type_name in ["hessian", "pb"] {
            let mut descriptor = FormatDescriptor::new(type_name).with_property("other", "x");
            let err = descriptor.validate().unwrap_err();
            assert!(matches!(err, DescriptorError::Validation(ref m) if m.contains(KEY_CLASS_NAME)));
        }
    }

    #[test]
    fn test_null_property_counts_as_missing() {
        let mut descriptor = FormatDescriptor::new("pb").with_property(KEY_CLASS_NAME, Value::Null);
        assert!(descriptor.validate().is_err());
    }

    #[test]
    fn test_grok_requires_regular() {
        let mut descriptor = FormatDescriptor::new("grok").with_property(KEY_RETAIN, true);
        let err = descriptor.validate().unwrap_err();
        assert!(matches!(err, DescriptorError::Validation(ref m) if m.contains(KEY_REGULAR)));
    }

    #[test]
    fn test_grok_defaults() {
        let descriptor = valid(FormatDescriptor::new("grok").with_property(KEY_REGULAR, "%{INT:id}"));
        assert_eq!(
            descriptor.spec(),
            Some(&FormatSpec::Grok(GrokSpec {
                regular: "%{INT:id}".to_string(),
                retain: false,
                field_name: None,
            }))
        );
        let deserializer = compile(&descriptor).unwrap();
        let row = deserializer.deserialize(b"id=42").unwrap();
        assert_eq!(row.values(), &[serde_json::json!(42), Value::Null]);

        // No field name: a JSON message is matched as plain text. No retain:
        // the "name" member does not fill its column.
        let row = deserializer.deserialize(br#"{"name": "bob", "n": 7}"#).unwrap();
        assert_eq!(row.values(), &[serde_json::json!(7), Value::Null]);
    }

    #[test]
    fn test_grok_retain_parsing() {
        let retain = |value: Value| {
            let descriptor = valid(
                FormatDescriptor::new("grok")
                    .with_property(KEY_REGULAR, ".*")
                    .with_property(KEY_RETAIN, value),
            );
            match descriptor.spec() {
                Some(FormatSpec::Grok(grok)) => grok.retain,
                other => panic!("unexpected spec {:?}", other),
            }
        };
        assert!(retain(Value::Bool(true)));
        assert!(retain(Value::from("TRUE")));
        assert!(!retain(Value::from("yes")));
        assert!(!retain(Value::from(1)));
        assert!(!retain(Value::Bool(false)));
    }

    #[test]
    fn test_invalid_pattern_fails_at_transform() {
        let descriptor = valid(FormatDescriptor::new("grok").with_property(KEY_REGULAR, "([unclosed"));
        let err = compile(&descriptor).unwrap_err();
        assert!(matches!(err, DescriptorError::Pattern { ref pattern, .. } if pattern == "([unclosed"));
    }

    #[test]
    fn test_unknown_class_fails_at_transform() {
        let descriptor = valid(FormatDescriptor::new("pb").with_property(KEY_CLASS_NAME, "com.example.Missing"));
        let err = compile(&descriptor).unwrap_err();
        assert!(matches!(err, DescriptorError::ClassResolution(ref n) if n == "com.example.Missing"));
    }

    #[test]
    fn test_transform_without_param_is_unsupported() {
        let descriptor = valid(FormatDescriptor::new("json"));
        let err = descriptor.transform().unwrap_err();
        assert!(matches!(err, DescriptorError::UnsupportedOperation(_)));

        let unvalidated = FormatDescriptor::new("json");
        assert!(matches!(unvalidated.transform(), Err(DescriptorError::UnsupportedOperation(_))));
    }

    #[test]
    #[should_panic(expected = "before validate")]
    fn test_transform_before_validate_panics() {
        let descriptor = FormatDescriptor::new("json");
        let _ = compile(&descriptor);
    }

    #[test]
    fn test_bound_from_kebab_case_yaml() {
        let text = "type: grok\nproperties:\n  regular: '%{WORD:name}'\n  field-name: message\n  RETAIN: 'true'\n";
        let mut descriptor: FormatDescriptor = ConfigBinder::new().bind_str(text).unwrap();
        descriptor.validate().unwrap();
        assert_eq!(
            descriptor.spec(),
            Some(&FormatSpec::Grok(GrokSpec {
                regular: "%{WORD:name}".to_string(),
                retain: true,
                field_name: Some("message".to_string()),
            }))
        );
    }

    #[test]
    fn test_camel_case_authored_key_still_resolves() {
        // "className" normalizes to "classname"
        let text = "type: pb\nproperties:\n  className: com.example.Foo\n";
        let mut descriptor: FormatDescriptor = ConfigBinder::new().bind_str(text).unwrap();
        assert!(descriptor.properties().contains_key("classname"));
        descriptor.validate().unwrap();
        assert_eq!(
            descriptor.spec(),
            Some(&FormatSpec::Pb {
                class_name: "com.example.Foo".to_string()
            })
        );
    }

    #[test]
    fn test_name() {
        assert_eq!(FormatDescriptor::new("json").name(), "format");
        assert_eq!(FormatDescriptor::new("json").type_name(), Some("json"));
    }
}
