//! Declaration diagnostics raised by blocks and the legacy registrar.

use crate::library::LibraryKind;
use crate::location::SourceLocation;
use opdecl_dispatch::RegistryError;
use opdecl_schema::{DispatchKey, OperatorName, SchemaParseError};
use std::fmt;

/// Which block a diagnostic came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockContext {
    pub kind: LibraryKind,
    pub location: SourceLocation,
}

impl fmt::Display for BlockContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(Error occurred while processing {} block at {})",
            self.kind, self.location
        )
    }
}

/// Declaration-time failures.
///
/// Every block-level variant ends with the [`BlockContext`] of the block that
/// rejected the declaration. Legacy registrar variants have no block.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeclarationError {
    #[error(
        "{kind}: cannot define {kind} with the wildcard namespace _ (every {kind} defines operators for a distinct namespace!) Did you mean to use library_impl! instead?  {context}"
    )]
    WildcardNamespace {
        kind: LibraryKind,
        context: BlockContext,
    },

    /// `def` inside an implementation block.
    #[error(
        "def(\"{name}\"): Cannot define an operator inside of a {kind} block.  All def()s should be placed in the (unique) library! block for their namespace.  {context}"
    )]
    DefOutsideDefinitionBlock {
        name: OperatorName,
        kind: LibraryKind,
        context: BlockContext,
    },

    /// `fallback` outside an implementation block.
    #[error(
        "fallback(...): Cannot define an operator inside of a {kind} block.  Did you mean to call this function inside a library_impl! block?  {context}"
    )]
    FallbackOutsideImplBlock {
        kind: LibraryKind,
        context: BlockContext,
    },

    #[error(
        "def(\"{name}\"): Redundant definition of namespace ({namespace}) in both schema and the enclosing {kind} block.  Delete the namespace from your schema string.  {context}"
    )]
    RedundantSchemaNamespace {
        name: OperatorName,
        namespace: String,
        kind: LibraryKind,
        context: BlockContext,
    },

    #[error(
        "def(\"{name}\"): Invalid explicit namespace ({namespace}) in schema string.  Move this definition to the (unique) library! block for this namespace and delete the namespace from your schema string.  {context}"
    )]
    SchemaNamespaceMismatch {
        name: OperatorName,
        namespace: String,
        context: BlockContext,
    },

    #[error(
        "impl(\"{name}\", ...): Redundant definition of namespace ({namespace}) in both operator name and the enclosing {kind} block.  Delete the namespace from your operator name.  {context}"
    )]
    RedundantNameNamespace {
        name: String,
        namespace: String,
        kind: LibraryKind,
        context: BlockContext,
    },

    #[error(
        "impl(\"{name}\", ...): Invalid explicit namespace ({namespace}) in operator name.  Move this definition to {kind} block for this namespace and delete the explicit namespace from your operator name.  {context}"
    )]
    NameNamespaceMismatch {
        name: String,
        namespace: String,
        kind: LibraryKind,
        context: BlockContext,
    },

    #[error(
        "def(\"{name}\"): Full schema string was not specified, and we couldn't infer schema either.  Please explicitly provide a schema string.  {context}"
    )]
    MissingSchema {
        name: OperatorName,
        context: BlockContext,
    },

    #[error(
        "impl(\"{name}\", ...): Explicitly provided dispatch key ({kernel_key}) is inconsistent with the dispatch key of the enclosing {kind} block ({block_key}).  Please declare a separate {kind} block for this dispatch key and move your impl() there.  {context}"
    )]
    DispatchKeyConflict {
        name: String,
        kernel_key: DispatchKey,
        block_key: DispatchKey,
        kind: LibraryKind,
        context: BlockContext,
    },

    #[error(
        "fallback(...): Fallback functions which apply to only a single namespace (you specified {namespace}) are not supported.  If you intended to apply this fallback function globally, please define a separate block:\n\n    library_impl!(registry, \"_\", DispatchKey::{dispatch_key})?.fallback(...)?;\n\n{context}"
    )]
    NamespacedFallback {
        namespace: String,
        dispatch_key: DispatchKey,
        context: BlockContext,
    },

    #[error(
        "In operator registration: Tried to register an operator without specifying a schema or operator name."
    )]
    MissingSchemaOrName,

    #[error(
        "In operator registration: Tried to register operator {schema} with AliasAnalysisKind::FROM_SCHEMA, but the schema is inferred."
    )]
    InvalidAliasAnalysis { schema: String },

    #[error(
        "Cannot infer operator schema in registration of operator {name} because there is no kernel specified."
    )]
    NoKernelToInferFrom { name: OperatorName },

    #[error(
        "Cannot infer operator schema for this kind of kernel in registration of operator {name}. Please explicitly specify the operator schema or specify at least one kernel for which we can infer the schema."
    )]
    SchemaNotInferable { name: OperatorName },

    #[error(
        "In operator registration: Tried to register multiple kernels with same dispatch key {dispatch_key} for operator schema {schema}"
    )]
    DuplicateKernel {
        dispatch_key: DispatchKey,
        schema: String,
    },

    #[error(
        "In operator registration: Tried to register multiple catch-all kernels for operator schema {schema}"
    )]
    DuplicateCatchAllKernel { schema: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Schema(#[from] SchemaParseError),
}

impl DeclarationError {
    /// True for the two ways of putting an operation in the wrong kind of block.
    pub fn is_wrong_block_kind(&self) -> bool {
        matches!(
            self,
            Self::DefOutsideDefinitionBlock { .. } | Self::FallbackOutsideImplBlock { .. }
        )
    }

    pub fn is_schema_inference(&self) -> bool {
        matches!(
            self,
            Self::NoKernelToInferFrom { .. } | Self::SchemaNotInferable { .. }
        )
    }

    pub fn is_duplicate_kernel(&self) -> bool {
        matches!(
            self,
            Self::DuplicateKernel { .. } | Self::DuplicateCatchAllKernel { .. }
        )
    }

    pub fn context(&self) -> Option<&BlockContext> {
        match self {
            Self::WildcardNamespace { context, .. }
            | Self::DefOutsideDefinitionBlock { context, .. }
            | Self::FallbackOutsideImplBlock { context, .. }
            | Self::RedundantSchemaNamespace { context, .. }
            | Self::SchemaNamespaceMismatch { context, .. }
            | Self::RedundantNameNamespace { context, .. }
            | Self::NameNamespaceMismatch { context, .. }
            | Self::MissingSchema { context, .. }
            | Self::DispatchKeyConflict { context, .. }
            | Self::NamespacedFallback { context, .. } => Some(context),
            _ => None,
        }
    }
}
