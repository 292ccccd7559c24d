//! Declaration blocks.
//!
//! A [`Library`] groups declarations for one namespace (or, for
//! implementation blocks, optionally every namespace). Each successful
//! declaration leaves a [`RegistrationHandle`] in the block; dropping the
//! block revokes them newest first.

use crate::error::{BlockContext, DeclarationError};
use crate::kernel::Kernel;
use crate::location::{SourceLocation, debug_label};
use opdecl_dispatch::{OperatorRegistry, RegistrationHandle};
use opdecl_schema::{
    AliasAnalysisKind, DispatchKey, FunctionSchema, OperatorName, SchemaOrName, parse_name,
    parse_schema, parse_schema_or_name,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Namespace spelling for "no namespace".
pub const WILDCARD_NAMESPACE: &str = "_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryKind {
    /// The unique block that claims a namespace.
    Def,
    /// Kernels only; never defines.
    Impl,
    /// Additional definitions for a namespace claimed elsewhere.
    Fragment,
}

impl LibraryKind {
    pub fn as_macro(self) -> &'static str {
        match self {
            Self::Def => "library!",
            Self::Impl => "library_impl!",
            Self::Fragment => "library_fragment!",
        }
    }

    fn defines(self) -> bool {
        matches!(self, Self::Def | Self::Fragment)
    }
}

impl fmt::Display for LibraryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_macro())
    }
}

pub struct Library {
    kind: LibraryKind,
    namespace: Option<String>,
    dispatch_key: Option<DispatchKey>,
    location: SourceLocation,
    registry: Arc<dyn OperatorRegistry>,
    registrations: Vec<RegistrationHandle>,
}

impl Library {
    /// Open a block. Usually reached through [`library!`](crate::library!),
    /// [`library_fragment!`](crate::library_fragment) or
    /// [`library_impl!`](crate::library_impl).
    ///
    /// `"_"` means no namespace and `CatchAll` means no dispatch key. A
    /// definition block claims its namespace immediately.
    pub fn new(
        registry: Arc<dyn OperatorRegistry>,
        kind: LibraryKind,
        namespace: &str,
        dispatch_key: Option<DispatchKey>,
        location: SourceLocation,
    ) -> Result<Self, DeclarationError> {
        let mut library = Self {
            kind,
            namespace: (namespace != WILDCARD_NAMESPACE).then(|| namespace.to_string()),
            dispatch_key: DispatchKey::normalize(dispatch_key),
            location,
            registry,
            registrations: Vec::new(),
        };

        if kind.defines() {
            let Some(namespace) = library.namespace.clone() else {
                return Err(DeclarationError::WildcardNamespace {
                    kind,
                    context: library.context(),
                });
            };
            assert!(library.dispatch_key.is_none(), "{}", library.context());
            if kind == LibraryKind::Def {
                let handle = library
                    .registry
                    .register_library(&namespace, library.label(""))?;
                library.registrations.push(handle);
            }
        }
        Ok(library)
    }

    pub fn kind(&self) -> LibraryKind {
        self.kind
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn dispatch_key(&self) -> Option<DispatchKey> {
        self.dispatch_key
    }

    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    /// Number of live registrations owned by this block.
    pub fn registration_count(&self) -> usize {
        self.registrations.len()
    }

    pub fn context(&self) -> BlockContext {
        BlockContext {
            kind: self.kind,
            location: self.location.clone(),
        }
    }

    fn label(&self, note: &str) -> String {
        debug_label(note, &self.location, self.registry.config())
    }

    /// Define an operator from a schema string.
    pub fn def(&mut self, schema: &str) -> Result<&mut Self, DeclarationError> {
        self.define(parse_schema(schema)?)?;
        Ok(self)
    }

    /// Define an operator and register `kernel` for it. A bare name takes
    /// the kernel's inferred schema.
    pub fn def_with(
        &mut self,
        schema_or_name: &str,
        kernel: impl Into<Kernel>,
    ) -> Result<&mut Self, DeclarationError> {
        self.define_with_kernel(parse_schema_or_name(schema_or_name)?, kernel.into())?;
        Ok(self)
    }

    /// Define an operator and return its namespaced name.
    pub fn define(&mut self, mut schema: FunctionSchema) -> Result<OperatorName, DeclarationError> {
        if !self.kind.defines() {
            return Err(DeclarationError::DefOutsideDefinitionBlock {
                name: schema.operator_name().clone(),
                kind: self.kind,
                context: self.context(),
            });
        }
        let Some(namespace) = self.namespace.clone() else {
            panic!("{}", self.context());
        };
        assert!(self.dispatch_key.is_none(), "{}", self.context());

        if let Some(explicit) = schema.namespace() {
            return Err(if explicit == namespace {
                DeclarationError::RedundantSchemaNamespace {
                    name: schema.operator_name().clone(),
                    namespace,
                    kind: self.kind,
                    context: self.context(),
                }
            } else {
                DeclarationError::SchemaNamespaceMismatch {
                    name: schema.operator_name().clone(),
                    namespace: explicit.to_string(),
                    context: self.context(),
                }
            });
        }
        let stamped = schema.set_namespace_if_not_set(&namespace);
        assert!(stamped, "{}", self.context());

        let name = schema.operator_name().clone();
        let handle = self.registry.register_def(schema, self.label(""))?;
        self.registrations.push(handle);
        debug!(operator = %name, kind = %self.kind, "defined operator");
        Ok(name)
    }

    pub fn define_with_kernel(
        &mut self,
        schema_or_name: SchemaOrName,
        kernel: Kernel,
    ) -> Result<OperatorName, DeclarationError> {
        let schema = match schema_or_name {
            SchemaOrName::Schema(schema) => schema,
            SchemaOrName::Name(name) => {
                let Some(inferred) = kernel.inferred_schema() else {
                    return Err(DeclarationError::MissingSchema {
                        name,
                        context: self.context(),
                    });
                };
                let mut schema = inferred.clone_with_name(name.name, name.overload_name);
                schema.set_alias_analysis(AliasAnalysisKind::Conservative);
                schema
            }
        };
        let name = self.define(schema)?;
        let dispatch_key = kernel.key().or(self.dispatch_key);
        self.register_kernel(name.clone(), dispatch_key, kernel)?;
        Ok(name)
    }

    /// Register `kernel` for an operator defined elsewhere.
    ///
    /// The block's namespace is prepended to bare names. Blocks without a
    /// namespace take namespaced names as written.
    pub fn implement(
        &mut self,
        name: &str,
        kernel: impl Into<Kernel>,
    ) -> Result<&mut Self, DeclarationError> {
        let kernel = kernel.into();
        let mut operator = parse_name(name)?;

        let explicit = operator.namespace().map(str::to_string);
        match (explicit.as_deref(), self.namespace.as_deref()) {
            (Some(explicit), Some(namespace)) if explicit == namespace => {
                return Err(DeclarationError::RedundantNameNamespace {
                    name: name.to_string(),
                    namespace: namespace.to_string(),
                    kind: self.kind,
                    context: self.context(),
                });
            }
            (Some(explicit), Some(_)) => {
                return Err(DeclarationError::NameNamespaceMismatch {
                    name: name.to_string(),
                    namespace: explicit.to_string(),
                    kind: self.kind,
                    context: self.context(),
                });
            }
            (None, Some(namespace)) => {
                let stamped = operator.set_namespace_if_not_set(namespace);
                assert!(stamped, "{}", self.context());
            }
            (_, None) => {}
        }

        if let (Some(kernel_key), Some(block_key)) = (kernel.key(), self.dispatch_key) {
            if kernel_key != block_key {
                return Err(DeclarationError::DispatchKeyConflict {
                    name: name.to_string(),
                    kernel_key,
                    block_key,
                    kind: self.kind,
                    context: self.context(),
                });
            }
        }

        let dispatch_key = kernel.key().or(self.dispatch_key);
        self.register_kernel(operator, dispatch_key, kernel)?;
        Ok(self)
    }

    /// Register `kernel` as the fallback for the block's (or the kernel's)
    /// dispatch key. Only wildcard implementation blocks accept fallbacks.
    pub fn fallback(&mut self, kernel: impl Into<Kernel>) -> Result<&mut Self, DeclarationError> {
        let kernel = kernel.into();
        if self.kind != LibraryKind::Impl {
            return Err(DeclarationError::FallbackOutsideImplBlock {
                kind: self.kind,
                context: self.context(),
            });
        }
        let Some(dispatch_key) = kernel.key().or(self.dispatch_key) else {
            panic!("{}", self.context());
        };
        if let Some(namespace) = &self.namespace {
            return Err(DeclarationError::NamespacedFallback {
                namespace: namespace.clone(),
                dispatch_key,
                context: self.context(),
            });
        }

        let (func, _, _, note) = kernel.into_parts();
        let handle = self
            .registry
            .register_fallback(dispatch_key, func, self.label(&note))?;
        self.registrations.push(handle);
        debug!(dispatch_key = %dispatch_key, "registered fallback");
        Ok(self)
    }

    fn register_kernel(
        &mut self,
        name: OperatorName,
        dispatch_key: Option<DispatchKey>,
        kernel: Kernel,
    ) -> Result<(), DeclarationError> {
        let (func, _, schema, note) = kernel.into_parts();
        let label = self.label(&note);
        let handle = self
            .registry
            .register_impl(name, dispatch_key, func, schema, label)?;
        self.registrations.push(handle);
        Ok(())
    }
}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Library")
            .field("kind", &self.kind)
            .field("namespace", &self.namespace)
            .field("dispatch_key", &self.dispatch_key)
            .field("location", &self.location)
            .field("registrations", &self.registrations.len())
            .finish()
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        while let Some(handle) = self.registrations.pop() {
            drop(handle);
        }
    }
}
