//! Type registry
//!
//! Resolves fully-qualified type names (e.g. `com.example.Order`) to the field
//! layout the binary formats decode against. Registries are plain values
//! loaded from YAML:
//!
//! ```yaml
//! types:
//!   - name: com.example.Order
//!     fields:
//!       - { name: id, number: 1, type: long }
//!       - { name: item, number: 2, type: string }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::binder::{BindingError, ConfigBinder};
use crate::descriptor::DescriptorError;
use crate::schema::FieldType;

/// A field declared on a registered type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeField {
    pub name: String,

    /// Wire tag for the schema-based binary format
    #[serde(default)]
    pub number: Option<u32>,

    #[serde(rename = "type")]
    pub field_type: FieldType,
}

/// Resolved type: a name and its declared fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub name: String,

    #[serde(default)]
    pub fields: Vec<TypeField>,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>, fields: Vec<TypeField>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&TypeField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_by_number(&self, number: u32) -> Option<&TypeField> {
        self.fields.iter().find(|f| f.number == Some(number))
    }
}

#[derive(Debug, Default, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    types: Vec<TypeDescriptor>,
}

/// Name -> type lookup used when compiling `hessian` and `pb` formats
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, Arc<TypeDescriptor>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a type, replacing any earlier definition with the same name
    pub fn register(&mut self, descriptor: TypeDescriptor) {
        debug!(name = %descriptor.name, fields = descriptor.fields.len(), "TypeRegistry::register: called");
        self.types.insert(descriptor.name.clone(), Arc::new(descriptor));
    }

    /// Look a type up by its fully-qualified name
    pub fn resolve(&self, name: &str) -> Result<Arc<TypeDescriptor>, DescriptorError> {
        debug!(%name, "TypeRegistry::resolve: called");
        self.types
            .get(name)
            .cloned()
            .ok_or_else(|| DescriptorError::ClassResolution(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Parse a registry from YAML text
    pub fn from_yaml(binder: &ConfigBinder, text: &str) -> Result<Self, BindingError> {
        let file: RegistryFile = binder.bind_str(text)?;
        let mut registry = Self::new();
        registry.extend(file.types);
        Ok(registry)
    }

    /// Load a registry file and merge it into this one
    pub fn load_file(&mut self, binder: &ConfigBinder, path: &Path) -> Result<(), BindingError> {
        let file: RegistryFile = binder.bind_file(path)?;
        info!(path = %path.display(), types = file.types.len(), "Loaded type registry");
        self.extend(file.types);
        Ok(())
    }
}

impl Extend<TypeDescriptor> for TypeRegistry {
    fn extend<I: IntoIterator<Item = TypeDescriptor>>(&mut self, iter: I) {
        for descriptor in iter {
            self.register(descriptor);
        }
    }
}

impl FromIterator<TypeDescriptor> for TypeRegistry {
    fn from_iter<I: IntoIterator<Item = TypeDescriptor>>(iter: I) -> Self {
        let mut registry = Self::new();
        registry.extend(iter);
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const REGISTRY: &str = r#"
types:
  - name: com.example.Order
    fields:
      - { name: id, number: 1, type: long }
      - { name: item, number: 2, type: string }
  - name: com.example.Empty
"#;

    #[test]
    fn test_from_yaml_and_resolve() {
        let registry = TypeRegistry::from_yaml(&ConfigBinder::new(), REGISTRY).unwrap();
        assert_eq!(registry.len(), 2);

        let order = registry.resolve("com.example.Order").unwrap();
        assert_eq!(order.fields.len(), 2);
        assert_eq!(order.field("item").unwrap().field_type, FieldType::String);
        assert_eq!(order.field_by_number(1).unwrap().name, "id");
        assert!(order.field_by_number(9).is_none());

        assert!(registry.resolve("com.example.Empty").unwrap().fields.is_empty());
    }

    #[test]
    fn test_resolve_unknown_type() {
        let registry = TypeRegistry::new();
        let err = registry.resolve("com.example.Missing").unwrap_err();
        assert!(matches!(err, DescriptorError::ClassResolution(ref name) if name == "com.example.Missing"));
    }

    #[test]
    fn test_later_definitions_replace_earlier() {
        let mut registry: TypeRegistry = [TypeDescriptor::new("a.B", vec![])].into_iter().collect();
        registry.register(TypeDescriptor::new(
            "a.B",
            vec![TypeField {
                name: "x".to_string(),
                number: None,
                field_type: FieldType::Bool,
            }],
        ));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.resolve("a.B").unwrap().fields.len(), 1);
    }

    #[test]
    fn test_load_file_merges() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", REGISTRY).unwrap();

        let mut registry: TypeRegistry = [TypeDescriptor::new("a.B", vec![])].into_iter().collect();
        registry.load_file(&ConfigBinder::new(), file.path()).unwrap();
        assert_eq!(registry.len(), 3);
        assert!(registry.contains("a.B"));
        assert!(registry.contains("com.example.Order"));
    }
}
