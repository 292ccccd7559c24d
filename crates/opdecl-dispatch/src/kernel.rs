//! Kernel callables as stored by the registry.
//!
//! Kernels use a boxed calling convention: arguments arrive on a [`Stack`]
//! of JSON values and results are pushed back onto it.

use opdecl_schema::OperatorName;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Argument/result stack shared by every boxed kernel.
pub type Stack = Vec<Value>;

type BoxedKernel = dyn Fn(&OperatorName, &mut Stack) -> Result<(), KernelError> + Send + Sync;

/// Failures reported by a kernel invocation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KernelError {
    #[error("{operator}: fallthrough kernels cannot be called directly")]
    Fallthrough { operator: String },

    #[error("{operator}: expected {expected} values on the stack, found {found}")]
    StackUnderflow {
        operator: String,
        expected: usize,
        found: usize,
    },

    #[error("{operator}: argument {index} is not a valid `{expected}`: {message}")]
    Argument {
        operator: String,
        index: usize,
        expected: String,
        message: String,
    },

    #[error("{operator}: {message}")]
    Failed { operator: String, message: String },
}

#[derive(Clone)]
enum Repr {
    Boxed(Arc<BoxedKernel>),
    Fallthrough,
}

/// A callable registered for an operator or as a fallback.
///
/// Cheap to clone; clones share the underlying closure.
#[derive(Clone)]
pub struct KernelFunction {
    repr: Repr,
}

impl KernelFunction {
    pub fn boxed<F>(f: F) -> Self
    where
        F: Fn(&OperatorName, &mut Stack) -> Result<(), KernelError> + Send + Sync + 'static,
    {
        Self {
            repr: Repr::Boxed(Arc::new(f)),
        }
    }

    /// A kernel that defers to whatever would run if it were not registered.
    pub fn fallthrough() -> Self {
        Self {
            repr: Repr::Fallthrough,
        }
    }

    pub fn is_fallthrough(&self) -> bool {
        matches!(self.repr, Repr::Fallthrough)
    }

    pub fn call(&self, operator: &OperatorName, stack: &mut Stack) -> Result<(), KernelError> {
        match &self.repr {
            Repr::Boxed(f) => f(operator, stack),
            Repr::Fallthrough => Err(KernelError::Fallthrough {
                operator: operator.to_string(),
            }),
        }
    }
}

impl fmt::Debug for KernelFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.repr {
            Repr::Boxed(_) => f.write_str("KernelFunction::Boxed"),
            Repr::Fallthrough => f.write_str("KernelFunction::Fallthrough"),
        }
    }
}
