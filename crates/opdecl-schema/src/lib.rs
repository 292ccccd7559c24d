//! # opdecl schema
//!
//! The vocabulary shared by every layer of operator declaration: operator
//! names, function schemas, dispatch keys, alias-analysis policies, and the
//! parser that turns schema strings into [`FunctionSchema`] values.
//!
//! ```text
//! "myops::add.Tensor(Tensor a, Tensor b) -> Tensor"
//!   │      │    │      └─ arguments / returns   → FunctionSchema
//!   │      │    └──────── overload name
//!   │      └───────────── base name             → OperatorName
//!   └──────────────────── namespace (optional)
//! ```

pub mod alias;
pub mod dispatch_key;
pub mod error;
pub mod name;
pub mod parser;
pub mod schema;

pub use alias::AliasAnalysisKind;
pub use dispatch_key::DispatchKey;
pub use error::SchemaParseError;
pub use name::{NAMESPACE_SEPARATOR, OperatorName};
pub use parser::{parse_name, parse_schema, parse_schema_or_name};
pub use schema::{Argument, FunctionSchema, SchemaOrName};
