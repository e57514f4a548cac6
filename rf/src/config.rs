//! rf configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::binder::ConfigBinder;
use crate::registry::TypeRegistry;

/// Main rf configuration
///
/// Keys are normalized on load, so `log-level` and `LOG-LEVEL` both bind.
/// Saved files use kebab-case, which normalizes back to the same fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all(serialize = "kebab-case", deserialize = "camelCase"))]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,

    /// Type registry files, merged in order
    pub registry_paths: Vec<PathBuf>,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .rowformat.yml
        let local_config = PathBuf::from(".rowformat.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/rowformat/rowformat.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("rowformat").join("rowformat.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read just the log level, ignoring every error.
    ///
    /// Runs before logging is set up, so failures here stay silent and are
    /// reported later by [`Config::load`].
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates = [
            config_path.cloned(),
            Some(PathBuf::from(".rowformat.yml")),
            dirs::config_dir().map(|p| p.join("rowformat").join("rowformat.yml")),
        ];
        candidates
            .into_iter()
            .flatten()
            .find(|p| p.exists())
            .and_then(|p| ConfigBinder::new().bind_file::<Self>(&p).ok())
            .and_then(|config| config.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: Self = ConfigBinder::new()
            .bind_file(&path)
            .context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content).context(format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }

    /// Build a type registry from the configured paths plus `extra`
    pub fn load_registry(&self, extra: &[PathBuf]) -> Result<TypeRegistry> {
        let binder = ConfigBinder::new();
        let mut registry = TypeRegistry::new();
        for path in self.registry_paths.iter().chain(extra) {
            registry
                .load_file(&binder, path)
                .context(format!("Failed to load type registry {}", path.display()))?;
        }
        Ok(registry)
    }
}
