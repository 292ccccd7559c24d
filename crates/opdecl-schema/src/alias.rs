//! Alias-analysis policies attached to schemas.

use crate::error::SchemaParseError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How aggressively the runtime may assume a kernel does not alias its
/// inputs and outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AliasAnalysisKind {
    InternalSpecialCase,
    /// Assume anything may alias anything.
    Conservative,
    /// Trust the alias annotations written in the schema string.
    FromSchema,
    /// No aliasing, no side effects.
    PureFunction,
}

impl AliasAnalysisKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InternalSpecialCase => "INTERNAL_SPECIAL_CASE",
            Self::Conservative => "CONSERVATIVE",
            Self::FromSchema => "FROM_SCHEMA",
            Self::PureFunction => "PURE_FUNCTION",
        }
    }
}

impl Default for AliasAnalysisKind {
    fn default() -> Self {
        Self::Conservative
    }
}

impl fmt::Display for AliasAnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AliasAnalysisKind {
    type Err = SchemaParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INTERNAL_SPECIAL_CASE" => Ok(Self::InternalSpecialCase),
            "CONSERVATIVE" => Ok(Self::Conservative),
            "FROM_SCHEMA" => Ok(Self::FromSchema),
            "PURE_FUNCTION" => Ok(Self::PureFunction),
            _ => Err(SchemaParseError::UnknownVariant {
                what: "alias analysis kind",
                value: s.to_string(),
            }),
        }
    }
}
