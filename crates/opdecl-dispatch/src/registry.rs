//! The registry seam consumed by declaration code.

use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::handle::RegistrationHandle;
use crate::kernel::KernelFunction;
use opdecl_schema::{DispatchKey, FunctionSchema, OperatorName};

/// Storage for merged operator declarations.
///
/// Implementations synchronize internally: registration and revocation may
/// arrive from any thread. Every successful call returns a handle whose drop
/// removes exactly the entry it created.
pub trait OperatorRegistry: Send + Sync {
    fn config(&self) -> &RegistryConfig;

    /// Claim `namespace` exclusively for one definition block.
    fn register_library(
        &self,
        namespace: &str,
        debug: String,
    ) -> Result<RegistrationHandle, RegistryError>;

    /// Merge a fully namespaced schema into the registry.
    fn register_def(
        &self,
        schema: FunctionSchema,
        debug: String,
    ) -> Result<RegistrationHandle, RegistryError>;

    /// Attach a kernel to `(name, dispatch_key)`; `None` is the catch-all slot.
    fn register_impl(
        &self,
        name: OperatorName,
        dispatch_key: Option<DispatchKey>,
        kernel: KernelFunction,
        inferred_schema: Option<FunctionSchema>,
        debug: String,
    ) -> Result<RegistrationHandle, RegistryError>;

    /// Attach a kernel used for every operator lacking one at `dispatch_key`.
    fn register_fallback(
        &self,
        dispatch_key: DispatchKey,
        kernel: KernelFunction,
        debug: String,
    ) -> Result<RegistrationHandle, RegistryError>;
}
