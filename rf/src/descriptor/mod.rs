//! Descriptors: typed configuration units that compile into runtime components
//!
//! A descriptor is bound from configuration in an *unvalidated* state.
//! [`Descriptor::validate`] checks the discriminator and the properties it
//! requires and moves it to *valid*; only then may it be transformed.

use thiserror::Error;

use crate::binder::BindingError;
use crate::formats::grok::GrokError;

pub mod format;

pub use format::{FormatDescriptor, FormatInput, FormatSpec, GrokSpec};

/// Errors raised while validating or compiling a descriptor
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Type not found: {0}")]
    ClassResolution(String),

    #[error("Invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: GrokError,
    },

    #[error(transparent)]
    Binding(#[from] BindingError),
}

/// A polymorphic configuration unit
pub trait Descriptor {
    /// Contextual input `transform_with` needs
    type Param<'a>;

    /// Runtime component produced
    type Output;

    /// Component name, e.g. "format"
    fn name(&self) -> &'static str;

    /// The discriminator, if set
    fn type_name(&self) -> Option<&str>;

    /// Check the discriminator and required properties; Unvalidated -> Valid
    fn validate(&mut self) -> Result<(), DescriptorError>;

    fn is_valid(&self) -> bool;

    /// Parameterless transform. Descriptors that need context reject it.
    fn transform(&self) -> Result<Self::Output, DescriptorError> {
        Err(DescriptorError::UnsupportedOperation(format!(
            "{} cannot be transformed without a parameter",
            self.name()
        )))
    }

    /// Build the runtime component.
    ///
    /// # Panics
    ///
    /// When called before a successful [`Descriptor::validate`].
    fn transform_with(&self, param: Self::Param<'_>) -> Result<Self::Output, DescriptorError>;
}
