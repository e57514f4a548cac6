//! Descriptor compilation pipeline
//!
//! raw config -> [`ConfigBinder`] -> [`FormatDescriptor`] -> `validate()` ->
//! `transform_with(schema)` -> [`RowDeserializer`]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::binder::ConfigBinder;
use crate::descriptor::{Descriptor, DescriptorError, FormatDescriptor, FormatInput};
use crate::formats::RowDeserializer;
use crate::registry::TypeRegistry;
use crate::schema::RowSchema;

/// Outcome of compiling many independent configurations
#[derive(Debug, Default)]
pub struct SeedReport {
    pub compiled: Vec<(String, Box<dyn RowDeserializer>)>,
    pub failed: Vec<(String, DescriptorError)>,
}

impl SeedReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Owns the binder and type registry used to compile format descriptors
#[derive(Debug, Clone, Default)]
pub struct DescriptorCompiler {
    binder: ConfigBinder,
    registry: TypeRegistry,
}

impl DescriptorCompiler {
    pub fn new(registry: TypeRegistry) -> Self {
        Self {
            binder: ConfigBinder::new(),
            registry,
        }
    }

    pub fn binder(&self) -> &ConfigBinder {
        &self.binder
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Validate and transform an already-bound descriptor
    pub fn compile(
        &self,
        mut descriptor: FormatDescriptor,
        schema: Arc<RowSchema>,
    ) -> Result<Box<dyn RowDeserializer>, DescriptorError> {
        debug!(type_name = ?descriptor.type_name(), "DescriptorCompiler::compile: called");
        descriptor.validate()?;
        descriptor.transform_with(FormatInput::new(schema, &self.registry))
    }

    pub fn compile_str(&self, text: &str, schema: Arc<RowSchema>) -> Result<Box<dyn RowDeserializer>, DescriptorError> {
        let descriptor: FormatDescriptor = self.binder.bind_str(text)?;
        self.compile(descriptor, schema)
    }

    pub fn compile_map(
        &self,
        raw: &serde_json::Map<String, serde_json::Value>,
        schema: Arc<RowSchema>,
    ) -> Result<Box<dyn RowDeserializer>, DescriptorError> {
        let descriptor: FormatDescriptor = self.binder.bind_map(raw)?;
        self.compile(descriptor, schema)
    }

    pub fn compile_file(
        &self,
        path: &Path,
        schema: Arc<RowSchema>,
    ) -> Result<Box<dyn RowDeserializer>, DescriptorError> {
        let descriptor: FormatDescriptor = self.binder.bind_file(path)?;
        self.compile(descriptor, schema)
    }

    /// Compile named configuration texts independently.
    ///
    /// A failing configuration is logged and recorded; it never stops the rest.
    pub fn seed<I>(&self, configs: I, schema: Arc<RowSchema>) -> SeedReport
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut report = SeedReport::default();
        for (name, text) in configs {
            let result = self.compile_str(&text, Arc::clone(&schema));
            record(&mut report, name, result);
        }
        log_report(&report);
        report
    }

    /// Like [`seed`](Self::seed), reading each configuration from a file
    pub fn seed_files(&self, paths: &[PathBuf], schema: Arc<RowSchema>) -> SeedReport {
        let mut report = SeedReport::default();
        for path in paths {
            let result = self.compile_file(path, Arc::clone(&schema));
            record(&mut report, path.display().to_string(), result);
        }
        log_report(&report);
        report
    }
}

fn record(report: &mut SeedReport, name: String, result: Result<Box<dyn RowDeserializer>, DescriptorError>) {
    match result {
        Ok(deserializer) => {
            debug!(%name, format = %deserializer.format(), "seed: compiled");
            report.compiled.push((name, deserializer));
        }
        Err(e) => {
            error!(%name, error = %e, "Failed to compile format configuration");
            report.failed.push((name, e));
        }
    }
}

fn log_report(report: &SeedReport) {
    info!(
        compiled = report.compiled.len(),
        failed = report.failed.len(),
        "Seeded format configurations"
    );
}
