//! Relaxed configuration binding
//!
//! [`ConfigBinder`] turns human-authored YAML/JSON (or an already-parsed map)
//! into a typed value. Every mapping key, at every depth, is passed through
//! [`normalize_key`] before the structural bind, so `class-name`,
//! `CLASS-NAME` and `className` all land on the same field. Unknown keys are
//! ignored.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};
use thiserror::Error;
use tracing::debug;

use crate::normalize::normalize_key;

/// Errors raised while binding raw configuration
#[derive(Debug, Error)]
pub enum BindingError {
    #[error("Malformed configuration: {0}")]
    Malformed(#[source] serde_yaml::Error),

    /// The message carries the path of the offending key, e.g. `properties.retain: ...`
    #[error("Invalid configuration field: {0}")]
    Field(#[source] serde_yaml::Error),

    #[error("Failed to read configuration file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Stateless binder from loosely-keyed configuration to typed values
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigBinder;

impl ConfigBinder {
    pub fn new() -> Self {
        Self
    }

    /// Bind YAML (or JSON) text
    pub fn bind_str<T: DeserializeOwned>(&self, text: &str) -> Result<T, BindingError> {
        debug!(len = text.len(), "ConfigBinder::bind_str: called");
        let raw: Value = serde_yaml::from_str(text).map_err(BindingError::Malformed)?;
        self.bind_value(raw)
    }

    /// Bind an already-parsed mapping
    pub fn bind_map<T: DeserializeOwned>(
        &self,
        raw: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<T, BindingError> {
        debug!(keys = raw.len(), "ConfigBinder::bind_map: called");
        let value = serde_yaml::to_value(raw).map_err(BindingError::Malformed)?;
        self.bind_value(value)
    }

    /// Read a file and bind its contents
    pub fn bind_file<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> Result<T, BindingError> {
        let path = path.as_ref();
        debug!(?path, "ConfigBinder::bind_file: called");
        let text = fs::read_to_string(path).map_err(|source| BindingError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.bind_str(&text)
    }

    /// Bind a parsed YAML value
    pub fn bind_value<T: DeserializeOwned>(&self, raw: Value) -> Result<T, BindingError> {
        let normalized = normalize_keys(raw);
        // Going back through text keeps serde_yaml's key path in field errors.
        let text = serde_yaml::to_string(&normalized).map_err(BindingError::Malformed)?;
        serde_yaml::from_str(&text).map_err(BindingError::Field)
    }
}

/// Rewrite every string mapping key in `value` into its canonical spelling.
///
/// Values are never touched; only keys are.
pub fn normalize_keys(value: Value) -> Value {
    match value {
        Value::Mapping(mapping) => {
            let mut out = Mapping::with_capacity(mapping.len());
            for (key, inner) in mapping {
                let key = match key {
                    Value::String(s) => Value::String(normalize_key(&s)),
                    other => other,
                };
                out.insert(key, normalize_keys(inner));
            }
            Value::Mapping(out)
        }
        Value::Sequence(items) => Value::Sequence(items.into_iter().map(normalize_keys).collect()),
        Value::Tagged(mut tagged) => {
            tagged.value = normalize_keys(tagged.value);
            Value::Tagged(tagged)
        }
        scalar => scalar,
    }
}
