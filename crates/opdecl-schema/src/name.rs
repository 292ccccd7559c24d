//! Operator names and namespace stamping.
//!
//! An operator is identified by a qualified name (which may carry a
//! namespace prefix such as `myops::`) plus an overload discriminator. The
//! empty overload name denotes the default overload.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between a namespace and the operator's base name.
pub const NAMESPACE_SEPARATOR: &str = "::";

/// Identity of an operator: qualified name plus overload discriminator.
///
/// Two names are equal iff both fields match exactly; `add` and `myops::add`
/// are different operators.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorName {
    pub name: String,
    pub overload_name: String,
}

impl OperatorName {
    pub fn new(name: impl Into<String>, overload_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            overload_name: overload_name.into(),
        }
    }

    /// The namespace prefix, if the name carries one.
    pub fn namespace(&self) -> Option<&str> {
        self.name
            .find(NAMESPACE_SEPARATOR)
            .map(|idx| &self.name[..idx])
    }

    /// The name with any namespace prefix removed.
    pub fn base_name(&self) -> &str {
        match self.name.find(NAMESPACE_SEPARATOR) {
            Some(idx) => &self.name[idx + NAMESPACE_SEPARATOR.len()..],
            None => &self.name,
        }
    }

    /// Prefix `namespace` onto the name unless one is already present.
    ///
    /// Returns `false` (and leaves the name untouched) when a namespace was
    /// already set; callers must check the result.
    pub fn set_namespace_if_not_set(&mut self, namespace: &str) -> bool {
        if self.namespace().is_some() {
            return false;
        }
        self.name = format!("{namespace}{NAMESPACE_SEPARATOR}{}", self.name);
        true
    }
}

impl fmt::Display for OperatorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.overload_name.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}.{}", self.name, self.overload_name)
        }
    }
}
