//! Error types for registry operations and configuration loading.

use opdecl_schema::{DispatchKey, OperatorName};
use std::path::PathBuf;

/// Registrations the registry refuses because they contradict its state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error(
        "Only a single definition block is allowed per namespace, but namespace {namespace} has multiple. \
         Previous registration of the definition block for namespace {namespace} was {previous}; \
         latest registration was {current}"
    )]
    DuplicateNamespace {
        namespace: String,
        previous: String,
        current: String,
    },

    #[error(
        "Tried to register operator {new}, but an operator with the same name and overload name \
         was already defined with a different schema: {existing} ({previous})"
    )]
    ConflictingDefinition {
        name: OperatorName,
        existing: String,
        new: String,
        previous: String,
    },

    #[error(
        "Inferred operator schema for a kernel function doesn't match the expected function schema. \
         operator: {name}; expected schema: {declared}; inferred schema: {inferred} ({debug})"
    )]
    InferredSchemaMismatch {
        name: OperatorName,
        declared: String,
        inferred: String,
        debug: String,
    },

    #[error(
        "Tried to register multiple fallbacks for the same dispatch key {dispatch_key}. \
         Previous registration was {previous}; latest registration was {current}"
    )]
    DuplicateFallback {
        dispatch_key: DispatchKey,
        previous: String,
        current: String,
    },
}

/// Failures while loading a [`crate::RegistryConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config toml: {source}")]
    ParseToml {
        #[source]
        source: toml::de::Error,
    },
}
