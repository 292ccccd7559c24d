//! # opdecl core
//!
//! Declaration front-end for a multi-backend operator registry. Call sites
//! group declarations into namespace-scoped blocks, attach one kernel per
//! dispatch key, and the block validates everything before it reaches the
//! registry:
//!
//! ```text
//! Kernel                 ← callable + optional dispatch key + optional inferred schema
//!     │
//! infer / conflict       ← schema inference, duplicate-kernel detection
//!     │
//! Library                ← library! / library_fragment! / library_impl! blocks
//! RegisterOperators      ← option-collecting legacy registrar
//!     │
//! OperatorRegistry       ← register_* → RegistrationHandle (revoked on drop)
//! ```
//!
//! ```ignore
//! let registry = Arc::new(Dispatcher::new());
//! let mut m = library!(registry.clone(), "myops")?;
//! m.def("add(Tensor a, Tensor b) -> Tensor")?;
//!
//! let mut cpu = library_impl!(registry.clone(), "myops", DispatchKey::CPU)?;
//! cpu.implement("add", Kernel::boxed(add_cpu))?;
//! ```

pub mod conflict;
pub mod error;
pub mod infer;
pub mod kernel;
pub mod legacy;
pub mod library;
pub mod location;
pub mod typed;

pub use conflict::check_no_duplicate_kernels;
pub use error::{BlockContext, DeclarationError};
pub use infer::infer_schema_from_kernels;
pub use kernel::{Kernel, dispatch};
pub use legacy::{Options, RegisterOperators};
pub use library::{Library, LibraryKind, WILDCARD_NAMESPACE};
pub use location::{SourceLocation, debug_label};
pub use typed::{IntoKernel, KernelReturn, SchemaType};

pub use opdecl_dispatch::{
    Dispatcher, KernelFunction, OperatorRegistry, RegistrationHandle, RegistryConfig,
};
pub use opdecl_schema::{
    AliasAnalysisKind, DispatchKey, FunctionSchema, OperatorName, SchemaOrName,
};

/// Capture the current file and line as a [`SourceLocation`].
#[macro_export]
macro_rules! location {
    () => {
        $crate::SourceLocation::new(file!(), line!())
    };
}

/// Open the unique definition block for a namespace.
#[macro_export]
macro_rules! library {
    ($registry:expr, $namespace:expr $(,)?) => {
        $crate::Library::new(
            $registry,
            $crate::LibraryKind::Def,
            $namespace,
            None,
            $crate::location!(),
        )
    };
}

/// Open an additional definition block for a namespace that is claimed
/// elsewhere.
#[macro_export]
macro_rules! library_fragment {
    ($registry:expr, $namespace:expr $(,)?) => {
        $crate::Library::new(
            $registry,
            $crate::LibraryKind::Fragment,
            $namespace,
            None,
            $crate::location!(),
        )
    };
}

/// Open an implementation block, optionally pinned to one dispatch key.
/// Pass `"_"` as the namespace for a block spanning all namespaces.
#[macro_export]
macro_rules! library_impl {
    ($registry:expr, $namespace:expr $(,)?) => {
        $crate::Library::new(
            $registry,
            $crate::LibraryKind::Impl,
            $namespace,
            None,
            $crate::location!(),
        )
    };
    ($registry:expr, $namespace:expr, $dispatch_key:expr $(,)?) => {
        $crate::Library::new(
            $registry,
            $crate::LibraryKind::Impl,
            $namespace,
            Some($dispatch_key),
            $crate::location!(),
        )
    };
}
