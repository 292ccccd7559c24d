//! Kernel descriptors: a callable plus the registration metadata that
//! travels with it into a declaration block.

use crate::typed::IntoKernel;
use opdecl_dispatch::{KernelError, KernelFunction, Stack};
use opdecl_schema::{DispatchKey, FunctionSchema, OperatorName};

/// A kernel as handed to `def`, `implement`, `fallback` or the legacy
/// registrar.
///
/// The dispatch key is never `CatchAll`; that key is stored as `None`.
#[derive(Debug, Clone)]
pub struct Kernel {
    func: KernelFunction,
    dispatch_key: Option<DispatchKey>,
    schema: Option<FunctionSchema>,
    debug: String,
}

impl Kernel {
    pub fn new(func: KernelFunction) -> Self {
        Self {
            func,
            dispatch_key: None,
            schema: None,
            debug: String::new(),
        }
    }

    /// Wrap a stack-calling-convention closure. No schema can be inferred.
    pub fn boxed<F>(f: F) -> Self
    where
        F: Fn(&OperatorName, &mut Stack) -> Result<(), KernelError> + Send + Sync + 'static,
    {
        Self::new(KernelFunction::boxed(f))
    }

    pub fn fallthrough() -> Self {
        Self::new(KernelFunction::fallthrough())
    }

    /// Wrap a typed Rust function; its signature becomes the inferred schema.
    pub fn from_fn<Args, F>(f: F) -> Self
    where
        F: IntoKernel<Args>,
    {
        f.into_kernel()
    }

    pub(crate) fn with_inferred_schema(func: KernelFunction, schema: FunctionSchema) -> Self {
        Self {
            schema: Some(schema),
            ..Self::new(func)
        }
    }

    pub fn dispatch_key(mut self, dispatch_key: DispatchKey) -> Self {
        self.dispatch_key = DispatchKey::normalize(Some(dispatch_key));
        self
    }

    /// Note used instead of the block location in the registration's label.
    pub fn debug(mut self, note: impl Into<String>) -> Self {
        self.debug = note.into();
        self
    }

    pub fn function(&self) -> &KernelFunction {
        &self.func
    }

    pub fn key(&self) -> Option<DispatchKey> {
        self.dispatch_key
    }

    pub fn inferred_schema(&self) -> Option<&FunctionSchema> {
        self.schema.as_ref()
    }

    pub fn note(&self) -> &str {
        &self.debug
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        KernelFunction,
        Option<DispatchKey>,
        Option<FunctionSchema>,
        String,
    ) {
        (self.func, self.dispatch_key, self.schema, self.debug)
    }
}

impl From<KernelFunction> for Kernel {
    fn from(func: KernelFunction) -> Self {
        Self::new(func)
    }
}

/// Pin a kernel to one dispatch key, for use in blocks without a key.
pub fn dispatch(dispatch_key: DispatchKey, kernel: impl Into<Kernel>) -> Kernel {
    kernel.into().dispatch_key(dispatch_key)
}
