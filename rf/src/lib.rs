//! rowformat - compile format descriptors into row deserializers
//!
//! A format descriptor is a small configuration object (`type` plus a bag of
//! `properties`) naming a wire format. Descriptors are bound from loosely
//! spelled configuration, validated, and then compiled against a row schema
//! into a [`RowDeserializer`] that turns raw messages into typed rows.
//!
//! # Modules
//!
//! - [`normalize`] - canonical spelling of configuration keys
//! - [`binder`] - typed binding of raw configuration through the normalizer
//! - [`descriptor`] - the `Descriptor` contract and `FormatDescriptor`
//! - [`schema`] - row schemas, field types and rows
//! - [`registry`] - named type definitions for the binary formats
//! - [`formats`] - runtime deserializers (hessian, pb, json, grok)
//! - [`compiler`] - bind, validate and transform in one step, plus seeding
//! - [`config`] - tool configuration and loading
//! - [`cli`] - command-line interface

pub mod binder;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod descriptor;
pub mod formats;
pub mod normalize;
pub mod registry;
pub mod schema;

pub use binder::{BindingError, ConfigBinder};
pub use compiler::{DescriptorCompiler, SeedReport};
pub use config::Config;
pub use descriptor::{Descriptor, DescriptorError, FormatDescriptor, FormatInput, FormatSpec, GrokSpec};
pub use formats::{DecodeError, FormatType, RowDeserializer};
pub use normalize::normalize_key;
pub use registry::{TypeDescriptor, TypeField, TypeRegistry};
pub use schema::{FieldType, Row, RowSchema, SchemaField};
