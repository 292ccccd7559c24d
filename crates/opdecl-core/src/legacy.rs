//! Option-collecting batch registration.
//!
//! [`RegisterOperators`] predates declaration blocks: each call bundles a
//! schema (or bare name) with any number of kernels and registers the
//! definition and every kernel in one step, without namespace checks.

use crate::conflict::check_no_duplicate_kernels;
use crate::error::DeclarationError;
use crate::infer::infer_schema_from_kernels;
use crate::kernel::Kernel;
use opdecl_dispatch::{OperatorRegistry, RegistrationHandle};
use opdecl_schema::{
    AliasAnalysisKind, DispatchKey, FunctionSchema, SchemaOrName, SchemaParseError,
    parse_schema_or_name,
};
use std::sync::Arc;
use tracing::debug;

const LEGACY_DEBUG_LABEL: &str = "registered by RegisterOperators";

/// One operator registration for [`RegisterOperators::op`].
#[derive(Debug, Clone, Default)]
pub struct Options {
    schema_or_name: Option<SchemaOrName>,
    kernels: Vec<Kernel>,
    alias_analysis: Option<AliasAnalysisKind>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a schema string, or a bare operator name whose schema will be
    /// inferred from the kernels.
    pub fn schema(self, schema_or_name: &str) -> Result<Self, SchemaParseError> {
        Ok(self.schema_or_name(parse_schema_or_name(schema_or_name)?))
    }

    pub fn schema_or_name(mut self, schema_or_name: impl Into<SchemaOrName>) -> Self {
        self.schema_or_name = Some(schema_or_name.into());
        self
    }

    pub fn kernel(mut self, dispatch_key: DispatchKey, kernel: impl Into<Kernel>) -> Self {
        self.kernels.push(kernel.into().dispatch_key(dispatch_key));
        self
    }

    pub fn catch_all_kernel(mut self, kernel: impl Into<Kernel>) -> Self {
        self.kernels.push(kernel.into().dispatch_key(DispatchKey::CatchAll));
        self
    }

    pub fn alias_analysis(mut self, kind: AliasAnalysisKind) -> Self {
        self.alias_analysis = Some(kind);
        self
    }

    pub fn kernels(&self) -> &[Kernel] {
        &self.kernels
    }
}

/// Batch registrar; dropping it revokes everything it registered.
pub struct RegisterOperators {
    registry: Arc<dyn OperatorRegistry>,
    registrations: Vec<RegistrationHandle>,
}

impl RegisterOperators {
    pub fn new(registry: Arc<dyn OperatorRegistry>) -> Self {
        Self {
            registry,
            registrations: Vec::new(),
        }
    }

    pub fn registration_count(&self) -> usize {
        self.registrations.len()
    }

    /// Register one operator with its kernels.
    pub fn op(&mut self, options: Options) -> Result<&mut Self, DeclarationError> {
        let Options {
            schema_or_name,
            kernels,
            alias_analysis,
        } = options;

        let schema = match schema_or_name {
            None => return Err(DeclarationError::MissingSchemaOrName),
            Some(SchemaOrName::Schema(schema)) => {
                check_no_duplicate_kernels(&schema, &kernels)?;
                schema
            }
            Some(SchemaOrName::Name(name)) => {
                let inferred = infer_schema_from_kernels(&name, &kernels)?;
                let schema = FunctionSchema::new(
                    name.name,
                    name.overload_name,
                    inferred.arguments().to_vec(),
                    inferred.returns().to_vec(),
                    inferred.is_vararg(),
                    inferred.is_varret(),
                );
                if alias_analysis == Some(AliasAnalysisKind::FromSchema) {
                    return Err(DeclarationError::InvalidAliasAnalysis {
                        schema: schema.to_string(),
                    });
                }
                check_no_duplicate_kernels(&schema, &kernels)?;
                schema
            }
        };

        self.register_op(schema, kernels, alias_analysis)?;
        Ok(self)
    }

    /// Shorthand for an [`Options`] with one kernel keyed as the kernel
    /// itself is keyed.
    pub fn op_with(
        &mut self,
        schema_or_name: &str,
        kernel: impl Into<Kernel>,
    ) -> Result<&mut Self, DeclarationError> {
        let mut options = Options::new().schema(schema_or_name)?;
        options.kernels.push(kernel.into());
        self.op(options)
    }

    fn label(&self) -> String {
        if self.registry.config().strip_debug_labels {
            String::new()
        } else {
            LEGACY_DEBUG_LABEL.to_string()
        }
    }

    fn register_op(
        &mut self,
        mut schema: FunctionSchema,
        kernels: Vec<Kernel>,
        alias_analysis: Option<AliasAnalysisKind>,
    ) -> Result<(), DeclarationError> {
        if let Some(kind) = alias_analysis {
            schema.set_alias_analysis(kind);
        }
        let name = schema.operator_name().clone();
        let kernel_count = kernels.len();

        let handle = self.registry.register_def(schema, self.label())?;
        self.registrations.push(handle);
        for kernel in kernels {
            let (func, dispatch_key, inferred, _) = kernel.into_parts();
            let handle = self.registry.register_impl(
                name.clone(),
                dispatch_key,
                func,
                inferred,
                self.label(),
            )?;
            self.registrations.push(handle);
        }
        debug!(operator = %name, kernels = kernel_count, "registered legacy operator");
        Ok(())
    }
}

impl Drop for RegisterOperators {
    fn drop(&mut self) {
        while let Some(handle) = self.registrations.pop() {
            drop(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opdecl_dispatch::Dispatcher;
    use opdecl_schema::OperatorName;

    #[test]
    fn options_normalize_catch_all_kernels() {
        let options = Options::new()
            .kernel(DispatchKey::CatchAll, Kernel::fallthrough())
            .catch_all_kernel(Kernel::fallthrough().dispatch_key(DispatchKey::CPU))
            .kernel(DispatchKey::CUDA, Kernel::fallthrough());
        let keys: Vec<_> = options.kernels().iter().map(Kernel::key).collect();
        assert_eq!(keys, vec![None, None, Some(DispatchKey::CUDA)]);
    }

    #[test]
    fn missing_schema_or_name_is_rejected() {
        let registry = Arc::new(Dispatcher::new());
        let mut registrar = RegisterOperators::new(registry);
        let err = registrar
            .op(Options::new().catch_all_kernel(Kernel::fallthrough()))
            .err()
            .expect("registration without a name fails");
        assert_eq!(err, DeclarationError::MissingSchemaOrName);
        assert_eq!(registrar.registration_count(), 0);
    }

    #[test]
    fn op_with_keeps_kernel_key() {
        let registry = Arc::new(Dispatcher::new());
        let mut registrar = RegisterOperators::new(registry.clone());
        registrar
            .op_with(
                "legacy::relu(Tensor self) -> Tensor",
                Kernel::fallthrough().dispatch_key(DispatchKey::CPU),
            )
            .expect("registration accepted");
        let name = OperatorName::new("legacy::relu", "");
        assert!(registry.kernel(&name, Some(DispatchKey::CPU)).is_some());
        assert!(registry.kernel(&name, None).is_none());
        assert_eq!(registrar.registration_count(), 2);
    }
}
