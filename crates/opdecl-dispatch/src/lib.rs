//! # opdecl dispatch
//!
//! The registry side of operator declaration. Declaration code talks to an
//! [`OperatorRegistry`] through four operations, each of which hands back a
//! [`RegistrationHandle`] that undoes exactly that registration when dropped:
//!
//! ```text
//! register_library(ns)                 → claims a namespace exclusively
//! register_def(schema)                 → merges a schema, keyed by OperatorName
//! register_impl(name, key?, kernel)    → attaches a kernel to (operator, key)
//! register_fallback(key, kernel)       → kernel for every operator at `key`
//! ```
//!
//! [`Dispatcher`] is the in-memory implementation. It stores and revokes;
//! choosing a kernel at call time is not its concern.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod kernel;
pub mod registry;

pub use config::RegistryConfig;
pub use dispatcher::{
    Dispatcher, FallbackRow, KernelRow, NamespaceRow, OperatorRow, RegistrySnapshot,
};
pub use error::{ConfigError, RegistryError};
pub use handle::RegistrationHandle;
pub use kernel::{KernelError, KernelFunction, Stack};
pub use registry::OperatorRegistry;
